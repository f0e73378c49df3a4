use clap::{Parser, Subcommand};

/// ragvault - retrieval engine for grounding a chat assistant
#[derive(Parser, Debug)]
#[command(name = "ragvault")]
#[command(about = "Ingest CSV, JSON and text files and answer similarity queries over them", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Custom base directory (default: ~/.ragvault)
    #[arg(long, global = true)]
    pub base_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory
    Init,
    /// Ingest a file, or every .csv/.json/.txt file under a directory
    Ingest {
        /// File or directory to ingest
        path: String,
        /// Re-ingest files whose content has not changed
        #[arg(short, long)]
        force: bool,
    },
    /// Watch a directory and keep the index in sync with it
    Watch {
        /// Directory to watch
        path: String,
    },
    /// Search indexed chunks
    Search {
        query: String,
        /// Maximum number of results to return
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },
    /// Print the prompt context that would be injected for a query
    Context { query: String },
    /// List ingested data sources
    Sources,
    /// Delete a data source and its chunks
    Delete {
        /// Data source id (see `sources`)
        id: String,
    },
    /// Show index and registry counts
    Status,
    /// Remove chunks that belong to no registered data source
    Cleanup,
    /// Remove every chunk and data source
    Purge,
}
