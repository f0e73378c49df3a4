use crate::core::error::{Error, Result};
use crate::indexing::extractor::FileKind;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A file found under an ingestion root
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub kind: FileKind,
}

impl DiscoveredFile {
    /// Source name for this file: its relative path with `/` separators
    pub fn source_name(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Discover all ingestible files in a directory, respecting .gitignore rules
pub fn discover_files(root: &Path) -> Result<Vec<DiscoveredFile>> {
    if !root.exists() {
        return Err(Error::Config(format!(
            "Directory does not exist: {}",
            root.display()
        )));
    }

    if !root.is_dir() {
        return Err(Error::Config(format!(
            "Path is not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for result in walker {
        match result {
            Ok(entry) => {
                let path = entry.path();

                if path.is_dir() || !is_supported_file(path) {
                    continue;
                }

                let relative_path = path
                    .strip_prefix(root)
                    .map_err(|e| Error::Config(format!("Failed to get relative path: {}", e)))?
                    .to_path_buf();

                let kind = FileKind::from_name(&path.to_string_lossy());
                files.push(DiscoveredFile {
                    path: path.to_path_buf(),
                    relative_path,
                    kind,
                });
            }
            Err(err) => {
                // Some files might be inaccessible
                warn!("Failed to access file: {}", err);
            }
        }
    }

    Ok(files)
}

/// Extensions accepted for upload: `.csv`, `.json` and `.txt`
pub fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "csv" | "json" | "txt"))
        .unwrap_or(false)
}
