use crate::core::error::{Error, Result};
use crate::indexing::discovery::is_supported_file;
use crate::service::engine::RagEngine;
use crate::storage::sources::calculate_file_hash;
use notify_debouncer_full::{
    new_debouncer,
    notify::{RecursiveMode, Watcher},
    DebounceEventResult,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What one batch of file events did to the index
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub ingested: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Keeps the index in sync with a directory: new or modified files are
/// ingested, deleted files have their data source removed
pub struct FileWatcher {
    root_path: PathBuf,
    engine: Arc<RagEngine>,
}

impl FileWatcher {
    pub fn new(root_path: &Path, engine: Arc<RagEngine>) -> Result<Self> {
        if !root_path.is_dir() {
            return Err(Error::Config(format!(
                "Path is not a directory: {}",
                root_path.display()
            )));
        }

        Ok(Self {
            root_path: root_path.to_path_buf(),
            engine,
        })
    }

    /// Start watching and processing file changes; blocks until the watcher stops
    pub fn watch(&self) -> Result<()> {
        info!("Watching directory: {}", self.root_path.display());

        let (tx, rx) = mpsc::channel();

        let mut debouncer = new_debouncer(
            Duration::from_secs(2),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let paths: Vec<PathBuf> = events
                        .into_iter()
                        .flat_map(|event| event.paths.clone())
                        .collect();
                    let _ = tx.send(paths);
                }
                Err(errors) => {
                    for e in errors {
                        warn!("Watch error: {}", e);
                    }
                }
            },
        )
        .map_err(|e| Error::Config(format!("Failed to create file watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(&self.root_path, RecursiveMode::Recursive)
            .map_err(|e| Error::Config(format!("Failed to watch directory: {}", e)))?;

        // Ends when the debouncer drops its sender
        while let Ok(paths) = rx.recv() {
            let summary = self.process_paths(&paths);
            if summary != WatchSummary::default() {
                info!(
                    ingested = summary.ingested,
                    removed = summary.removed,
                    unchanged = summary.unchanged,
                    failed = summary.failed,
                    "Processed file changes"
                );
            }
        }

        Ok(())
    }

    /// Apply a batch of changed paths to the index
    pub fn process_paths(&self, paths: &[PathBuf]) -> WatchSummary {
        let mut summary = WatchSummary::default();

        // One event per path is enough; debounced batches often repeat paths
        let unique: BTreeSet<&PathBuf> = paths.iter().collect();

        for path in unique {
            let Some(name) = self.source_name(path) else {
                continue;
            };

            if !path.exists() {
                if is_supported_file(path) && self.engine.delete_by_name(&name) {
                    info!("Removed deleted file: {}", name);
                    summary.removed += 1;
                }
                // A removed directory only reports its own path
                let nested = self.engine.delete_under(&name);
                if nested > 0 {
                    info!("Removed {} files under deleted directory {}", nested, name);
                    summary.removed += nested;
                }
                continue;
            }

            if !is_supported_file(path) {
                continue;
            }

            match calculate_file_hash(path) {
                Ok(hash) if self.engine.is_unchanged(&name, &hash) => {
                    summary.unchanged += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Could not hash {}: {}", name, e);
                    summary.failed += 1;
                    continue;
                }
            }

            match self.engine.ingest_path_as(path, &name) {
                Ok(source) => {
                    info!("Indexed: {} ({} chunks)", name, source.chunk_count);
                    summary.ingested += 1;
                }
                Err(e) => {
                    warn!("Failed to index {}: {}", name, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Relative path with `/` separators; `None` for paths outside the root
    fn source_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root_path).ok()?;
        Some(
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
        )
    }
}
