//! Corpus store with atomic snapshot replacement
//!
//! Readers take an `Arc` to the current snapshot and never observe a
//! partially-applied refresh; `replace`/`merge` build a fresh snapshot and
//! swap the reference in one write-lock acquisition.

use crate::corpus::{Chunk, CorpusSnapshot, IngestBatch, StructuredFact};
use crate::error::{CivicQaError, Result};
use ahash::{AHashMap, AHashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

const CHUNKS_FILE: &str = "chunks.json";
const FACTS_FILE: &str = "facts.json";

/// Summary counters for the status command
#[derive(Debug, Clone, serde::Serialize)]
pub struct CorpusStats {
    pub chunks: usize,
    pub chunks_with_embedding: usize,
    pub facts: usize,
    pub embedding_dimension: Option<usize>,
}

/// Shared, read-mostly corpus store
pub struct CorpusStore {
    snapshot: RwLock<Arc<CorpusSnapshot>>,
    max_chunk_chars: usize,
}

impl CorpusStore {
    /// Create an empty store
    pub fn new(max_chunk_chars: usize) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(CorpusSnapshot::default())),
            max_chunk_chars,
        }
    }

    /// Current snapshot; cheap to clone, stable for the caller's lifetime
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        self.snapshot.read().unwrap().clone()
    }

    /// Replace the entire corpus with the batch contents
    pub fn replace(&self, batch: IngestBatch) -> CorpusStats {
        let snapshot = self.build_snapshot(batch.chunks, batch.facts);
        let stats = Self::stats_of(&snapshot);
        *self.snapshot.write().unwrap() = Arc::new(snapshot);
        tracing::info!(
            chunks = stats.chunks,
            facts = stats.facts,
            "Corpus replaced"
        );
        stats
    }

    /// Merge the batch into the current corpus
    ///
    /// Incoming chunks override existing ones with the same id; incoming
    /// facts override the current fact for their (category, key).
    pub fn merge(&self, batch: IngestBatch) -> CorpusStats {
        let current = self.snapshot();

        let mut chunks: Vec<Chunk> = Vec::with_capacity(current.chunks().len() + batch.chunks.len());
        let incoming_ids: AHashSet<&str> = batch.chunks.iter().map(|c| c.id.as_str()).collect();
        chunks.extend(
            current
                .chunks()
                .iter()
                .filter(|c| !incoming_ids.contains(c.id.as_str()))
                .cloned(),
        );
        chunks.extend(batch.chunks);

        let mut facts: Vec<StructuredFact> =
            Vec::with_capacity(current.facts().len() + batch.facts.len());
        let incoming_keys: AHashSet<(String, String)> = batch
            .facts
            .iter()
            .map(|f| (f.category.to_lowercase(), f.key.to_lowercase()))
            .collect();
        facts.extend(
            current
                .facts()
                .iter()
                .filter(|f| {
                    !incoming_keys.contains(&(f.category.to_lowercase(), f.key.to_lowercase()))
                })
                .cloned(),
        );
        facts.extend(batch.facts);

        let snapshot = self.build_snapshot(chunks, facts);
        let stats = Self::stats_of(&snapshot);
        *self.snapshot.write().unwrap() = Arc::new(snapshot);
        tracing::info!(chunks = stats.chunks, facts = stats.facts, "Corpus merged");
        stats
    }

    /// Load corpus files from a directory; missing files yield an empty
    /// corpus rather than an error
    pub fn load(&self, data_dir: &Path) -> Result<CorpusStats> {
        let chunks = Self::read_json_file::<Vec<Chunk>>(&data_dir.join(CHUNKS_FILE))?;
        let facts = Self::read_json_file::<Vec<StructuredFact>>(&data_dir.join(FACTS_FILE))?;

        let stats = self.replace(IngestBatch {
            chunks: chunks.unwrap_or_default(),
            facts: facts.unwrap_or_default(),
        });
        Ok(stats)
    }

    /// Persist the current snapshot to a directory
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir).map_err(|e| CivicQaError::Io {
            source: e,
            context: format!("Failed to create data directory: {:?}", data_dir),
        })?;

        let snapshot = self.snapshot();
        Self::write_json_file(&data_dir.join(CHUNKS_FILE), snapshot.chunks())?;
        Self::write_json_file(&data_dir.join(FACTS_FILE), snapshot.facts())?;
        Ok(())
    }

    pub fn stats(&self) -> CorpusStats {
        Self::stats_of(&self.snapshot())
    }

    /// Normalize and deduplicate a record set into an immutable snapshot
    fn build_snapshot(&self, chunks: Vec<Chunk>, facts: Vec<StructuredFact>) -> CorpusSnapshot {
        let mut seen_ids: AHashSet<String> = AHashSet::new();
        let mut seen_hashes: AHashSet<String> = AHashSet::new();
        let mut dimension: Option<usize> = None;
        let mut kept: Vec<Chunk> = Vec::with_capacity(chunks.len());

        for mut chunk in chunks {
            if !seen_ids.insert(chunk.id.clone()) {
                tracing::debug!(id = %chunk.id, "Dropping chunk with duplicate id");
                continue;
            }

            if chunk.text.len() > self.max_chunk_chars {
                tracing::warn!(
                    id = %chunk.id,
                    len = chunk.text.len(),
                    "Truncating oversized chunk text"
                );
                let mut cut = self.max_chunk_chars;
                while !chunk.text.is_char_boundary(cut) {
                    cut -= 1;
                }
                chunk.text.truncate(cut);
            }

            if !seen_hashes.insert(chunk.content_hash()) {
                tracing::debug!(id = %chunk.id, "Dropping chunk with duplicate content");
                continue;
            }

            // The first embedded chunk fixes the corpus dimension; vectors
            // that disagree are dropped so the chunk stays keyword-searchable.
            if let Some(vector) = &chunk.embedding {
                match dimension {
                    None => dimension = Some(vector.len()),
                    Some(dim) if dim != vector.len() => {
                        tracing::warn!(
                            id = %chunk.id,
                            expected = dim,
                            actual = vector.len(),
                            "Dropping embedding with mismatched dimension"
                        );
                        chunk.embedding = None;
                    }
                    Some(_) => {}
                }
            }

            kept.push(chunk);
        }

        // Last write wins per (category, key)
        let mut by_key: AHashMap<(String, String), StructuredFact> = AHashMap::new();
        for fact in facts {
            by_key.insert((fact.category.to_lowercase(), fact.key.to_lowercase()), fact);
        }
        let mut kept_facts: Vec<StructuredFact> = by_key.into_values().collect();
        kept_facts.sort_by(|a, b| a.category.cmp(&b.category).then(a.key.cmp(&b.key)));

        CorpusSnapshot::new(kept, kept_facts, dimension)
    }

    fn stats_of(snapshot: &CorpusSnapshot) -> CorpusStats {
        let dimension = snapshot.embedding_dimension();
        CorpusStats {
            chunks: snapshot.chunks().len(),
            chunks_with_embedding: snapshot
                .chunks()
                .iter()
                .filter(|c| dimension.is_some_and(|d| c.has_valid_embedding(d)))
                .count(),
            facts: snapshot.facts().len(),
            embedding_dimension: dimension,
        }
    }

    fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| CivicQaError::Io {
            source: e,
            context: format!("Failed to read corpus file: {:?}", path),
        })?;
        let value = serde_json::from_str(&content).map_err(|e| CivicQaError::Json {
            source: e,
            context: format!("Failed to parse corpus file: {:?}", path),
        })?;
        Ok(Some(value))
    }

    fn write_json_file<T: serde::Serialize>(path: &Path, value: T) -> Result<()> {
        let content = serde_json::to_string_pretty(&value).map_err(|e| CivicQaError::Json {
            source: e,
            context: format!("Failed to serialize corpus file: {:?}", path),
        })?;
        std::fs::write(path, content).map_err(|e| CivicQaError::Io {
            source: e,
            context: format!("Failed to write corpus file: {:?}", path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{ChunkMetadata, FactValue};
    use chrono::Utc;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            embedding: None,
            metadata: ChunkMetadata {
                source: "Test Source".to_string(),
                source_url: None,
                category: None,
                extracted_date: None,
                confidence: 1.0,
                chunk_index: 0,
                total_chunks: 1,
            },
        }
    }

    fn fact(category: &str, key: &str, value: i64) -> StructuredFact {
        StructuredFact {
            category: category.to_string(),
            key: key.to_string(),
            value: FactValue::Integer(value),
            source: "Directory".to_string(),
            source_url: None,
            last_updated: Utc::now(),
            confidence: 1.0,
        }
    }

    #[test]
    fn replace_dedups_by_id_and_content() {
        let store = CorpusStore::new(8000);
        let stats = store.replace(IngestBatch {
            chunks: vec![
                chunk("a", "first text"),
                chunk("a", "other text"),
                chunk("b", "first text"),
                chunk("c", "unique text"),
            ],
            facts: vec![],
        });

        // "a" duplicate id dropped, "b" duplicate content dropped
        assert_eq!(stats.chunks, 2);
    }

    #[test]
    fn facts_replace_per_category_key() {
        let store = CorpusStore::new(8000);
        store.replace(IngestBatch {
            chunks: vec![],
            facts: vec![
                fact("provider_count", "total_providers", 100),
                fact("provider_count", "total_providers", 173),
            ],
        });

        let snapshot = store.snapshot();
        assert_eq!(snapshot.facts().len(), 1);
        let current = snapshot.fact_by_key("total_providers").unwrap();
        assert_eq!(current.value, FactValue::Integer(173));
    }

    #[test]
    fn mismatched_embedding_dimensions_are_dropped() {
        let store = CorpusStore::new(8000);
        let mut a = chunk("a", "alpha");
        a.embedding = Some(vec![0.1; 4]);
        let mut b = chunk("b", "beta");
        b.embedding = Some(vec![0.1; 8]);

        let stats = store.replace(IngestBatch {
            chunks: vec![a, b],
            facts: vec![],
        });

        assert_eq!(stats.embedding_dimension, Some(4));
        assert_eq!(stats.chunks_with_embedding, 1);
        assert_eq!(stats.chunks, 2);
    }

    #[test]
    fn readers_keep_old_snapshot_across_replace() {
        let store = CorpusStore::new(8000);
        store.replace(IngestBatch {
            chunks: vec![chunk("a", "old corpus")],
            facts: vec![],
        });

        let held = store.snapshot();
        store.replace(IngestBatch {
            chunks: vec![chunk("b", "new corpus")],
            facts: vec![],
        });

        assert_eq!(held.chunks()[0].id, "a");
        assert_eq!(store.snapshot().chunks()[0].id, "b");
    }

    #[test]
    fn merge_overrides_by_id_and_keeps_rest() {
        let store = CorpusStore::new(8000);
        store.replace(IngestBatch {
            chunks: vec![chunk("a", "original a"), chunk("b", "original b")],
            facts: vec![fact("provider_count", "total_providers", 100)],
        });

        store.merge(IngestBatch {
            chunks: vec![chunk("a", "updated a")],
            facts: vec![fact("provider_count", "total_providers", 173)],
        });

        let snapshot = store.snapshot();
        assert_eq!(snapshot.chunks().len(), 2);
        let a = snapshot.chunks().iter().find(|c| c.id == "a").unwrap();
        assert_eq!(a.text, "updated a");
        assert_eq!(
            snapshot.fact_by_key("total_providers").unwrap().value,
            FactValue::Integer(173)
        );
    }

    #[test]
    fn oversized_chunks_are_truncated() {
        let store = CorpusStore::new(16);
        store.replace(IngestBatch {
            chunks: vec![chunk("a", "a very long chunk text that exceeds the cap")],
            facts: vec![],
        });

        assert_eq!(store.snapshot().chunks()[0].text.len(), 16);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();

        let store = CorpusStore::new(8000);
        store.replace(IngestBatch {
            chunks: vec![chunk("a", "persisted text")],
            facts: vec![fact("provider_count", "total_providers", 173)],
        });
        store.save(temp.path()).unwrap();

        let restored = CorpusStore::new(8000);
        let stats = restored.load(temp.path()).unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.facts, 1);
    }

    #[test]
    fn load_from_empty_directory_yields_empty_corpus() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = CorpusStore::new(8000);
        let stats = store.load(temp.path()).unwrap();
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.facts, 0);
    }
}
