use crate::core::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// One ingested file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    /// Millisecond timestamp of ingestion, as a string
    pub id: String,
    /// Original file name; matches the `source` attribute of its records
    pub name: String,
    /// Number of chunks the file produced
    #[serde(rename = "chunks")]
    pub chunk_count: usize,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
    /// SHA256 of the file contents, when known
    #[serde(rename = "contentHash", default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Registry of ingested files, in ingestion order
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<DataSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sources(sources: Vec<DataSource>) -> Self {
        Self { sources }
    }

    /// Build a new source record with an id not yet used in this registry.
    ///
    /// Ids are the current millisecond timestamp; on collision the id is
    /// bumped until it is free.
    pub fn create(
        &self,
        name: &str,
        chunk_count: usize,
        content_hash: Option<String>,
    ) -> DataSource {
        let uploaded_at = Utc::now();
        let mut millis = uploaded_at.timestamp_millis();
        while self.get(&millis.to_string()).is_some() {
            millis += 1;
        }

        DataSource {
            id: millis.to_string(),
            name: name.to_string(),
            chunk_count,
            uploaded_at,
            content_hash,
        }
    }

    pub fn register(&mut self, source: DataSource) {
        self.sources.push(source);
    }

    /// Remove by id, returning the removed record
    pub fn remove(&mut self, id: &str) -> Option<DataSource> {
        let idx = self.sources.iter().position(|s| s.id == id)?;
        Some(self.sources.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Names of every live source
    pub fn names(&self) -> HashSet<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn list(&self) -> &[DataSource] {
        &self.sources
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// SHA256 of in-memory content, hex encoded
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Calculate SHA256 hash of file contents
pub fn calculate_file_hash(path: &Path) -> Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
