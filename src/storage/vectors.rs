use crate::core::error::{Error, Result};
use crate::indexing::extractor::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::warn;

/// One embedded chunk
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub text: String,
    pub vector: Vec<f32>,
    pub attributes: Attributes,
}

impl VectorRecord {
    /// Name of the data source this record was extracted from, if tagged
    pub fn source(&self) -> Option<&str> {
        self.attributes.get("source").and_then(Value::as_str)
    }
}

/// A scored search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub score: f32,
    pub text: String,
    pub attributes: Attributes,
    /// Position of the record in the index at search time
    pub position: usize,
}

/// On-disk form of the index: three arrays kept in lockstep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorSnapshot {
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub metadata: Vec<Attributes>,
}

impl VectorSnapshot {
    /// Lenient decode.
    ///
    /// A field that is missing or not an array becomes empty. Elements are
    /// decoded one at a time: a malformed document or embedding drops that
    /// record from all three arrays, and a malformed metadata entry becomes an
    /// empty map. Positions past the shortest array are kept for `restore` to
    /// truncate.
    pub fn from_value(value: &Value) -> Self {
        let documents = elements(value, "documents", |item| item.as_str().map(str::to_string));
        let embeddings = elements(value, "embeddings", |item| {
            serde_json::from_value::<Vec<f32>>(item.clone()).ok()
        });
        let metadata = elements(value, "metadata", |item| {
            Some(item.as_object().cloned().unwrap_or_default())
        });

        let aligned = documents.len().min(embeddings.len()).min(metadata.len());
        let mut snapshot = Self::default();
        let mut dropped = 0;

        for i in 0..documents.len().max(embeddings.len()).max(metadata.len()) {
            let document = documents.get(i).cloned().flatten();
            let embedding = embeddings.get(i).cloned().flatten();
            let meta = metadata.get(i).cloned().flatten();

            if i < aligned {
                match (document, embedding, meta) {
                    (Some(document), Some(embedding), Some(meta)) => {
                        snapshot.documents.push(document);
                        snapshot.embeddings.push(embedding);
                        snapshot.metadata.push(meta);
                    }
                    _ => dropped += 1,
                }
            } else {
                snapshot.documents.extend(document);
                snapshot.embeddings.extend(embedding);
                snapshot.metadata.extend(meta);
            }
        }

        if dropped > 0 {
            warn!(dropped, "malformed records in vector snapshot, skipping them");
        }

        snapshot
    }
}

/// Decode each element of the array at `key`; `None` marks a malformed element
fn elements<T, F>(value: &Value, key: &str, decode: F) -> Vec<Option<T>>
where
    F: Fn(&Value) -> Option<T>,
{
    match value.get(key) {
        Some(Value::Array(items)) => items.iter().map(decode).collect(),
        Some(_) => {
            warn!(field = key, "malformed field in vector snapshot, using empty");
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// In-memory vector index with brute-force cosine search.
///
/// Records live in a single ordered sequence, so text, vector and attributes
/// can never drift out of step.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    records: Vec<VectorRecord>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records in lockstep order.
    ///
    /// Nothing is inserted if the three inputs differ in length.
    pub fn insert(
        &mut self,
        texts: Vec<String>,
        vectors: Vec<Vec<f32>>,
        attributes: Vec<Attributes>,
    ) -> Result<()> {
        if texts.len() != vectors.len() || texts.len() != attributes.len() {
            return Err(Error::LengthMismatch {
                texts: texts.len(),
                vectors: vectors.len(),
                attributes: attributes.len(),
            });
        }

        self.records.reserve(texts.len());
        for ((text, vector), attributes) in texts.into_iter().zip(vectors).zip(attributes) {
            self.records.push(VectorRecord {
                text,
                vector,
                attributes,
            });
        }

        Ok(())
    }

    /// Top `k` records by cosine similarity, best first.
    ///
    /// Ties keep insertion order. NaN scores (zero-norm or mismatched vectors)
    /// sort below every real score.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidK(k));
        }

        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| (position, cosine_similarity(query, &record.vector)))
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| rank(b.1, a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| {
                let record = &self.records[position];
                SearchHit {
                    score,
                    text: record.text.clone(),
                    attributes: record.attributes.clone(),
                    position,
                }
            })
            .collect())
    }

    /// Keep only records matching `keep`; returns how many were removed
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&VectorRecord) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|record| keep(record));
        before - self.records.len()
    }

    /// Remove every record whose `source` attribute equals `name`
    pub fn remove_source(&mut self, name: &str) -> usize {
        self.retain(|record| record.source() != Some(name))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    /// Serialize into the three-array document
    pub fn snapshot(&self) -> VectorSnapshot {
        let mut snapshot = VectorSnapshot {
            documents: Vec::with_capacity(self.records.len()),
            embeddings: Vec::with_capacity(self.records.len()),
            metadata: Vec::with_capacity(self.records.len()),
        };

        for record in &self.records {
            snapshot.documents.push(record.text.clone());
            snapshot.embeddings.push(record.vector.clone());
            snapshot.metadata.push(record.attributes.clone());
        }

        snapshot
    }

    /// Rebuild from a snapshot, replacing current contents.
    ///
    /// Arrays of unequal length are truncated to the shortest.
    pub fn restore(snapshot: VectorSnapshot) -> Self {
        let VectorSnapshot {
            documents,
            embeddings,
            metadata,
        } = snapshot;

        let len = documents.len().min(embeddings.len()).min(metadata.len());
        if documents.len() != len || embeddings.len() != len || metadata.len() != len {
            warn!(
                documents = documents.len(),
                embeddings = embeddings.len(),
                metadata = metadata.len(),
                kept = len,
                "vector snapshot arrays out of step, truncating"
            );
        }

        let records = documents
            .into_iter()
            .zip(embeddings)
            .zip(metadata)
            .map(|((text, vector), attributes)| VectorRecord {
                text,
                vector,
                attributes,
            })
            .collect();

        Self { records }
    }
}

/// Descending order with NaN last
fn rank(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Cosine similarity; NaN when either norm is zero or the lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::NAN;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(source: &str) -> Attributes {
        let mut map = Attributes::new();
        map.insert("source".to_string(), json!(source));
        map
    }

    fn index_with(vectors: Vec<(&str, Vec<f32>, &str)>) -> VectorIndex {
        let mut index = VectorIndex::new();
        let (texts, rest): (Vec<String>, Vec<(Vec<f32>, Attributes)>) = vectors
            .into_iter()
            .map(|(t, v, s)| (t.to_string(), (v, attrs(s))))
            .unzip();
        let (vecs, metas) = rest.into_iter().unzip();
        index.insert(texts, vecs, metas).unwrap();
        index
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, -1.0], &[-1.0, 1.0]) < 0.0);
    }

    #[test]
    fn test_cosine_similarity_undefined() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_nan());
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 1.0]).is_nan());
    }

    #[test]
    fn test_insert_length_mismatch() {
        let mut index = VectorIndex::new();
        let result = index.insert(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1.0]],
            vec![Attributes::new(), Attributes::new()],
        );
        assert!(matches!(
            result,
            Err(Error::LengthMismatch { texts: 2, vectors: 1, attributes: 2 })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_orders_by_score() {
        let index = index_with(vec![
            ("orthogonal", vec![0.0, 1.0, 0.0], "a.txt"),
            ("exact", vec![1.0, 0.0, 0.0], "a.txt"),
            ("close", vec![0.9, 0.1, 0.0], "b.txt"),
        ]);

        let hits = index.search(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "exact");
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[1].text, "close");
        assert_eq!(hits[2].text, "orthogonal");
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let index = index_with(vec![
            ("first", vec![1.0, 0.0], "a.txt"),
            ("second", vec![1.0, 0.0], "a.txt"),
            ("third", vec![2.0, 0.0], "a.txt"),
        ]);

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_search_nan_sorts_last() {
        let index = index_with(vec![
            ("zero", vec![0.0, 0.0], "a.txt"),
            ("weak", vec![0.1, 1.0], "a.txt"),
            ("strong", vec![1.0, 0.0], "a.txt"),
        ]);

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].text, "strong");
        assert_eq!(hits[1].text, "weak");
        assert_eq!(hits[2].text, "zero");
        assert!(hits[2].score.is_nan());
    }

    #[test]
    fn test_search_k_larger_than_size() {
        let index = index_with(vec![
            ("a", vec![1.0, 0.0], "a.txt"),
            ("b", vec![0.0, 1.0], "a.txt"),
        ]);
        assert_eq!(index.search(&[1.0, 1.0], 10).unwrap().len(), 2);
        assert_eq!(index.search(&[1.0, 1.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn test_search_empty_and_invalid_k() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0], 5).unwrap().is_empty());
        assert!(matches!(index.search(&[1.0], 0), Err(Error::InvalidK(0))));
    }

    #[test]
    fn test_remove_source() {
        let mut index = index_with(vec![
            ("a1", vec![1.0, 0.0], "a.txt"),
            ("b1", vec![0.0, 1.0], "b.txt"),
            ("a2", vec![1.0, 1.0], "a.txt"),
        ]);

        assert_eq!(index.remove_source("a.txt"), 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.records()[0].text, "b1");
        assert_eq!(index.remove_source("missing.txt"), 0);
    }

    #[test]
    fn test_clear() {
        let mut index = index_with(vec![("a", vec![1.0], "a.txt")]);
        index.clear();
        assert!(index.is_empty());
        assert!(index.snapshot().documents.is_empty());
    }

    #[test]
    fn test_snapshot_restore_preserves_search() {
        let index = index_with(vec![
            ("apples", vec![0.6, 0.8, 0.0], "a.txt"),
            ("bread", vec![0.0, 0.6, 0.8], "b.txt"),
        ]);

        let restored = VectorIndex::restore(index.snapshot());
        assert_eq!(restored.len(), index.len());

        let query = [0.5, 0.5, 0.1];
        assert_eq!(index.search(&query, 5).unwrap(), restored.search(&query, 5).unwrap());
    }

    #[test]
    fn test_restore_truncates_uneven_arrays() {
        let snapshot = VectorSnapshot {
            documents: vec!["a".to_string(), "b".to_string()],
            embeddings: vec![vec![1.0]],
            metadata: vec![Attributes::new(), Attributes::new()],
        };
        let index = VectorIndex::restore(snapshot);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_snapshot_from_malformed_value() {
        let value = json!({"documents": ["a"], "embeddings": "oops"});
        let snapshot = VectorSnapshot::from_value(&value);
        assert_eq!(snapshot.documents, vec!["a".to_string()]);
        assert!(snapshot.embeddings.is_empty());
        assert!(snapshot.metadata.is_empty());

        let value = json!({"documents": ["a"], "embeddings": [[1.0]], "metadata": [null]});
        let snapshot = VectorSnapshot::from_value(&value);
        assert_eq!(snapshot.metadata, vec![Attributes::new()]);

        let snapshot = VectorSnapshot::from_value(&json!([1, 2, 3]));
        assert_eq!(snapshot, VectorSnapshot::default());
    }

    #[test]
    fn test_snapshot_skips_only_bad_records() {
        let value = json!({
            "documents": ["first", "second", 7, "fourth"],
            "embeddings": [[1.0, 0.0], [null, 1.0], [0.0, 1.0], [0.5, 0.5]],
            "metadata": [{"source": "a.txt"}, {"source": "a.txt"}, {"source": "b.txt"}, {"source": "b.txt"}]
        });

        let index = VectorIndex::restore(VectorSnapshot::from_value(&value));
        let texts: Vec<&str> = index.records().iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "fourth"]);
        assert_eq!(index.records()[1].vector, vec![0.5, 0.5]);
        assert_eq!(index.records()[1].source(), Some("b.txt"));
    }
}
