// Core functionality
pub mod core {
    pub mod config;
    pub mod error;
}

// Data storage
pub mod storage {
    pub mod snapshot;
    pub mod sources;
    pub mod vectors;
}

// Ingestion pipeline
pub mod indexing {
    pub mod discovery;
    pub mod extractor;
}

// Embeddings
pub mod search {
    pub mod embedder;
}

// Orchestration
pub mod service {
    pub mod engine;
}

// User interfaces
pub mod ui {
    pub mod cli;
    pub mod watch;
}

// Re-export commonly used types
pub use core::config::{Config, RetrievalSettings};
pub use core::error::{Error, Result};
pub use indexing::discovery::discover_files;
pub use indexing::extractor::{extract, Attributes, Chunk, FileKind};
pub use search::embedder::{Embedder, HashingEmbedder};
pub use service::engine::{IngestReport, QueryHit, RagEngine};
pub use storage::snapshot::SnapshotStore;
pub use storage::sources::{DataSource, SourceRegistry};
pub use storage::vectors::{SearchHit, VectorIndex, VectorRecord, VectorSnapshot};
pub use ui::cli::Cli;
pub use ui::watch::FileWatcher;
