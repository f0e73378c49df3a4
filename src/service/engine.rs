use crate::core::config::{Config, RetrievalSettings};
use crate::core::error::{Error, Result};
use crate::indexing::discovery::discover_files;
use crate::indexing::extractor::{extract, Attributes};
use crate::search::embedder::{Embedder, HashingEmbedder};
use crate::storage::snapshot::SnapshotStore;
use crate::storage::sources::{calculate_file_hash, content_hash, DataSource, SourceRegistry};
use crate::storage::vectors::VectorIndex;
use parking_lot::RwLock;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// A query result handed to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub text: String,
    pub score: f32,
    pub attributes: Attributes,
}

/// Outcome of ingesting a directory
#[derive(Debug, Default)]
pub struct IngestReport {
    pub ingested: Vec<DataSource>,
    /// Files whose name and content hash matched a registered source
    pub skipped: usize,
    /// (source name, error message)
    pub failed: Vec<(String, String)>,
}

/// Index and registry, always mutated together
#[derive(Debug, Default)]
struct EngineState {
    index: VectorIndex,
    registry: SourceRegistry,
}

/// Retrieval engine: owns the vector index and the source registry and keeps
/// them consistent across ingest, delete and restarts.
///
/// Mutations take the write lock and are therefore serialized; queries share
/// the read lock.
pub struct RagEngine {
    state: RwLock<EngineState>,
    embedder: Box<dyn Embedder>,
    snapshots: Option<SnapshotStore>,
    settings: RetrievalSettings,
}

impl RagEngine {
    /// Open the engine for a configuration, loading any persisted snapshot
    pub fn open(config: &Config) -> Result<Self> {
        let embedder = HashingEmbedder::new(config.retrieval.dimension);
        Self::open_with_embedder(config, Box::new(embedder))
    }

    pub fn open_with_embedder(config: &Config, embedder: Box<dyn Embedder>) -> Result<Self> {
        config.init()?;
        let snapshots = SnapshotStore::from_config(config);

        // An unreadable document is logged and replaced by an empty one
        let index = snapshots.load_index().unwrap_or_else(|e| {
            error!(error = %e, "Error loading vector store");
            VectorIndex::new()
        });
        let registry = snapshots.load_sources().unwrap_or_else(|e| {
            error!(error = %e, "Error loading data sources");
            SourceRegistry::new()
        });

        let engine = Self {
            state: RwLock::new(EngineState { index, registry }),
            embedder,
            snapshots: Some(snapshots),
            settings: config.retrieval.clone(),
        };

        let orphans = engine.count_orphans();
        if orphans > 0 {
            warn!(
                orphans,
                "vector store holds records with no registered source; run cleanup to prune them"
            );
        }

        Ok(engine)
    }

    /// An engine that never touches disk
    pub fn in_memory(settings: RetrievalSettings) -> Self {
        let embedder = HashingEmbedder::new(settings.dimension);
        Self::in_memory_with_embedder(settings, Box::new(embedder))
    }

    pub fn in_memory_with_embedder(settings: RetrievalSettings, embedder: Box<dyn Embedder>) -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
            embedder,
            snapshots: None,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Ingest raw file bytes under `file_name`.
    ///
    /// All or nothing: if extraction fails, neither the index nor the registry
    /// changes. A source already registered under the same name is replaced.
    pub fn ingest(&self, bytes: &[u8], file_name: &str) -> Result<DataSource> {
        self.ingest_with_hash(bytes, file_name, None)
    }

    /// Ingest a file from disk, named after its file name
    pub fn ingest_path(&self, path: &Path) -> Result<DataSource> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Config(format!("Invalid file name: {}", path.display())))?;
        self.ingest_path_as(path, name)
    }

    /// Ingest a file from disk under an explicit source name
    pub fn ingest_path_as(&self, path: &Path, name: &str) -> Result<DataSource> {
        let size = std::fs::metadata(path)?.len();
        if size > self.settings.max_file_size {
            return Err(Error::FileTooLarge {
                name: name.to_string(),
                size,
                limit: self.settings.max_file_size,
            });
        }

        let bytes = std::fs::read(path)?;
        let hash = content_hash(&bytes);
        self.ingest_with_hash(&bytes, name, Some(hash))
    }

    fn ingest_with_hash(
        &self,
        bytes: &[u8],
        file_name: &str,
        hash: Option<String>,
    ) -> Result<DataSource> {
        info!("Processing file: {}", file_name);

        let chunks = extract(bytes, file_name)?;
        let (texts, attributes): (Vec<String>, Vec<Attributes>) = chunks
            .into_iter()
            .map(|chunk| (chunk.text, chunk.attributes))
            .unzip();

        let vectors = self.embedder.embed_batch(&texts);
        if vectors.len() != texts.len() {
            return Err(Error::LengthMismatch {
                texts: texts.len(),
                vectors: vectors.len(),
                attributes: attributes.len(),
            });
        }

        let chunk_count = texts.len();
        let mut state = self.state.write();

        // Records already tagged with this name belong to an earlier upload
        if let Some(previous) = state.registry.find_by_name(file_name).cloned() {
            state.registry.remove(&previous.id);
            info!(id = %previous.id, "Replacing previous upload of {}", file_name);
        }
        let stale = state.index.remove_source(file_name);
        if stale > 0 {
            debug!(stale, "removed stale records for {}", file_name);
        }

        state.index.insert(texts, vectors, attributes)?;

        let source = state.registry.create(file_name, chunk_count, hash);
        state.registry.register(source.clone());

        self.persist(&state);

        info!("Added {} documents to vector store", chunk_count);
        Ok(source)
    }

    /// Ingest every supported file under `root`.
    ///
    /// Sources are named by their path relative to `root`. Unless `force` is
    /// set, files whose content hash matches the registered source are skipped.
    pub fn ingest_directory(&self, root: &Path, force: bool) -> Result<IngestReport> {
        let files = discover_files(root)?;
        let mut report = IngestReport::default();

        for file in &files {
            let name = file.source_name();

            if !force {
                match calculate_file_hash(&file.path) {
                    Ok(hash) if self.is_unchanged(&name, &hash) => {
                        report.skipped += 1;
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(file = %name, error = %e, "could not hash file, ingesting anyway");
                    }
                }
            }

            match self.ingest_path_as(&file.path, &name) {
                Ok(source) => report.ingested.push(source),
                Err(e) => {
                    warn!(file = %name, error = %e, "failed to ingest");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// True when a source with this name is registered with the same content hash
    pub fn is_unchanged(&self, name: &str, hash: &str) -> bool {
        let state = self.state.read();
        state
            .registry
            .find_by_name(name)
            .and_then(|s| s.content_hash.as_deref())
            .map(|known| known == hash)
            .unwrap_or(false)
    }

    /// Remove a source and every record extracted from it
    pub fn remove_source(&self, id: &str) -> Result<DataSource> {
        let mut state = self.state.write();

        let source = state
            .registry
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let removed = state.index.remove_source(&source.name);
        if removed != source.chunk_count {
            warn!(
                expected = source.chunk_count,
                removed,
                "record count for {} did not match its registry entry",
                source.name
            );
        }

        self.persist(&state);

        info!("Deleted data source {} ({} documents)", source.name, removed);
        Ok(source)
    }

    /// Delete by id; `false` when the id is unknown
    pub fn delete(&self, id: &str) -> bool {
        match self.remove_source(id) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "delete was a no-op");
                false
            }
        }
    }

    /// Delete whichever source is registered under `name`
    pub fn delete_by_name(&self, name: &str) -> bool {
        let id = {
            let state = self.state.read();
            state.registry.find_by_name(name).map(|s| s.id.clone())
        };

        match id {
            Some(id) => self.delete(&id),
            None => false,
        }
    }

    /// Delete every source whose name lies inside the directory `prefix`;
    /// returns how many were removed
    pub fn delete_under(&self, prefix: &str) -> usize {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return 0;
        }
        let dir = format!("{}/", prefix);

        let ids: Vec<String> = {
            let state = self.state.read();
            state
                .registry
                .list()
                .iter()
                .filter(|s| s.name.starts_with(&dir))
                .map(|s| s.id.clone())
                .collect()
        };

        ids.iter().filter(|id| self.delete(id)).count()
    }

    /// Top `k` chunks for `text`
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<QueryHit>> {
        let state = self.state.read();
        if state.index.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(text);
        let hits = state.index.search(&query, k)?;

        Ok(hits
            .into_iter()
            .map(|hit| QueryHit {
                text: hit.text,
                score: hit.score,
                attributes: hit.attributes,
            })
            .collect())
    }

    /// Prompt context for `text`: the header followed by every relevant chunk,
    /// one per line, or an empty string when nothing clears the threshold
    pub fn context_for(&self, text: &str) -> String {
        let hits = match self.query(text, self.settings.top_k.max(1)) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "context search failed");
                return String::new();
            }
        };

        let relevant: Vec<&str> = hits
            .iter()
            .filter(|hit| hit.score > self.settings.relevance_threshold)
            .map(|hit| hit.text.as_str())
            .collect();

        if relevant.is_empty() {
            return String::new();
        }

        format!("{}{}", self.settings.context_header, relevant.join("\n"))
    }

    pub fn list_sources(&self) -> Vec<DataSource> {
        self.state.read().registry.list().to_vec()
    }

    pub fn get_source(&self, id: &str) -> Option<DataSource> {
        self.state.read().registry.get(id).cloned()
    }

    /// Number of indexed records
    pub fn size(&self) -> usize {
        self.state.read().index.len()
    }

    /// Records whose `source` is not a registered source name
    pub fn count_orphans(&self) -> usize {
        let state = self.state.read();
        let names = state.registry.names();
        state
            .index
            .records()
            .iter()
            .filter(|record| !record.source().is_some_and(|s| names.contains(s)))
            .count()
    }

    /// Drop every record whose `source` is not a registered source name
    pub fn prune_orphans(&self) -> usize {
        let mut state = self.state.write();
        let EngineState { index, registry } = &mut *state;

        let names = registry.names();
        let removed = index.retain(|record| record.source().is_some_and(|s| names.contains(s)));

        if removed > 0 {
            self.persist(&state);
        }

        info!("Removed {} orphaned documents, kept {}", removed, state.index.len());
        removed
    }

    /// Remove every record and every source
    pub fn purge(&self) {
        let mut state = self.state.write();
        state.index.clear();
        state.registry.clear();
        self.persist(&state);
        info!("Vector store and data sources cleared");
    }

    /// Flush both documents; failures are logged, never returned
    fn persist(&self, state: &EngineState) {
        if let Some(snapshots) = &self.snapshots {
            if let Err(e) = snapshots.save(&state.index, &state.registry) {
                error!(error = %e, "Error persisting data");
            }
        }
    }
}
