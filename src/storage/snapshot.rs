use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::storage::sources::{DataSource, SourceRegistry};
use crate::storage::vectors::{VectorIndex, VectorSnapshot};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads and writes the two snapshot documents.
///
/// Each write is a full rewrite through a temporary file and a rename, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    vector_store_path: PathBuf,
    sources_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(vector_store_path: PathBuf, sources_path: PathBuf) -> Self {
        Self {
            vector_store_path,
            sources_path,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.vector_store_path.clone(), config.sources_path.clone())
    }

    pub fn vector_store_path(&self) -> &Path {
        &self.vector_store_path
    }

    pub fn sources_path(&self) -> &Path {
        &self.sources_path
    }

    /// Load the vector index; a missing file is an empty index
    pub fn load_index(&self) -> Result<VectorIndex> {
        let Some(value) = read_json(&self.vector_store_path)? else {
            return Ok(VectorIndex::new());
        };

        let index = VectorIndex::restore(VectorSnapshot::from_value(&value));
        info!("Loaded {} documents from vector store", index.len());
        Ok(index)
    }

    /// Load the source registry; a missing file is an empty registry
    pub fn load_sources(&self) -> Result<SourceRegistry> {
        let Some(value) = read_json(&self.sources_path)? else {
            return Ok(SourceRegistry::new());
        };

        let sources: Vec<DataSource> = serde_json::from_value(value).map_err(|e| {
            Error::Persistence(format!(
                "Failed to decode {}: {}",
                self.sources_path.display(),
                e
            ))
        })?;

        info!("Loaded {} data sources", sources.len());
        Ok(SourceRegistry::from_sources(sources))
    }

    pub fn save_index(&self, index: &VectorIndex) -> Result<()> {
        write_atomic(&self.vector_store_path, &index.snapshot())
    }

    pub fn save_sources(&self, registry: &SourceRegistry) -> Result<()> {
        write_atomic(&self.sources_path, registry.list())
    }

    /// Persist both documents; the index is written first
    pub fn save(&self, index: &VectorIndex, registry: &SourceRegistry) -> Result<()> {
        self.save_index(index)?;
        self.save_sources(registry)?;
        debug!("Data persisted to disk");
        Ok(())
    }
}

fn read_json(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::Persistence(format!("Failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Persistence(format!("Failed to parse {}: {}", path.display(), e)))
}

fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Persistence(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let content = serde_json::to_vec(value)
        .map_err(|e| Error::Persistence(format!("Failed to serialize {}: {}", path.display(), e)))?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, content).map_err(|e| {
        Error::Persistence(format!("Failed to write {}: {}", temp_path.display(), e))
    })?;
    fs::rename(&temp_path, path).map_err(|e| {
        Error::Persistence(format!("Failed to replace {}: {}", path.display(), e))
    })?;

    Ok(())
}
