use super::error::{Error, Result};
use std::path::PathBuf;

/// Header prepended to retrieved context before it is handed to the prompt builder
pub const DEFAULT_CONTEXT_HEADER: &str = "\n\nINFORMATIONS DU MAGASIN (données actuelles):\n";

/// Tunables for embedding and retrieval
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    /// Number of hash buckets in each embedding
    pub dimension: usize,
    /// Results fetched when building prompt context
    pub top_k: usize,
    /// Hits scoring at or below this are dropped from prompt context
    pub relevance_threshold: f32,
    /// Prefix for non-empty prompt context
    pub context_header: String,
    /// Largest file accepted by `ingest_path`, in bytes
    pub max_file_size: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            dimension: 4096,
            top_k: 5,
            relevance_threshold: 0.1,
            context_header: DEFAULT_CONTEXT_HEADER.to_string(),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// Configuration for ragvault
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for ragvault data
    pub base_dir: PathBuf,
    /// Directory holding the two snapshot documents
    pub data_dir: PathBuf,
    /// Path to the vector store snapshot
    pub vector_store_path: PathBuf,
    /// Path to the data source registry snapshot
    pub sources_path: PathBuf,
    pub retrieval: RetrievalSettings,
}

impl Config {
    /// Get the default configuration directory
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
            .map(|home| home.join(".ragvault"))
    }

    /// Create a new configuration
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = match base_dir {
            Some(dir) => dir,
            None => Self::default_base_dir()?,
        };
        let data_dir = base_dir.join("rag-data");

        Ok(Self {
            vector_store_path: data_dir.join("vector-store.json"),
            sources_path: data_dir.join("sources.json"),
            data_dir,
            base_dir,
            retrieval: RetrievalSettings::default(),
        })
    }

    /// Initialize the configuration directories
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Check if the configuration is already initialized
    pub fn is_initialized(&self) -> bool {
        self.base_dir.exists() && self.data_dir.exists()
    }
}
