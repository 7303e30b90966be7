//! Corpus data model
//!
//! The retrievable units of the service: free-text `Chunk`s with optional
//! embeddings, and curated `StructuredFact`s for exact values (provider
//! counts, program statistics). Both are held in an immutable
//! `CorpusSnapshot` that the store swaps atomically on refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod store;

pub use store::{CorpusStats, CorpusStore};

/// Metadata attached to every chunk by the ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Human-readable source name
    pub source: String,

    /// URL of the source document
    #[serde(default)]
    pub source_url: Option<String>,

    /// Category/topic tag (e.g. "eligibility", "billing")
    #[serde(default)]
    pub category: Option<String>,

    /// When the source content was extracted
    #[serde(default)]
    pub extracted_date: Option<DateTime<Utc>>,

    /// Extraction confidence score
    #[serde(default = "default_confidence")]
    pub confidence: f32,

    /// Position within the parent document
    #[serde(default)]
    pub chunk_index: usize,

    /// Number of chunks in the parent document
    #[serde(default)]
    pub total_chunks: usize,
}

fn default_confidence() -> f32 {
    1.0
}

/// Atomic retrievable unit of source text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable unique identifier
    pub id: String,

    /// Cleaned content, bounded length
    pub text: String,

    /// Fixed-dimension embedding vector; `None` excludes the chunk from
    /// vector search but not from keyword search
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,

    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// BLAKE3 hash of the chunk text, used for content deduplication
    pub fn content_hash(&self) -> String {
        blake3::hash(self.text.as_bytes()).to_hex().to_string()
    }

    /// Whether this chunk participates in vector search for the given
    /// corpus dimension
    pub fn has_valid_embedding(&self, dimension: usize) -> bool {
        self.embedding
            .as_ref()
            .is_some_and(|e| e.len() == dimension)
    }
}

/// Typed value of a structured fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl std::fmt::Display for FactValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactValue::Integer(v) => write!(f, "{}", v),
            FactValue::Float(v) => write!(f, "{}", v),
            FactValue::Text(v) => write!(f, "{}", v),
            FactValue::Json(v) => write!(f, "{}", v),
        }
    }
}

/// A curated exact-value record, distinct from free-text chunks
///
/// At most one current fact exists per (category, key); ingestion replaces
/// rather than appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredFact {
    /// Fact category (e.g. "provider_count", "program_stats")
    pub category: String,

    /// Fact key within the category (e.g. "total_providers")
    pub key: String,

    pub value: FactValue,

    /// Human-readable source name
    pub source: String,

    #[serde(default)]
    pub source_url: Option<String>,

    pub last_updated: DateTime<Utc>,

    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

impl StructuredFact {
    /// Stable identifier derived from category and key
    pub fn id(&self) -> String {
        format!("fact:{}:{}", self.category, self.key)
    }

    /// Text rendering used when a fact is injected into retrieval results
    /// and prompt context
    pub fn render_text(&self) -> String {
        format!(
            "Key Fact: {}\nValue: {}\nSource: {}",
            self.key.replace('_', " "),
            self.value,
            self.source
        )
    }
}

/// A batch of records handed to the store by the external ingestion pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestBatch {
    #[serde(default)]
    pub chunks: Vec<Chunk>,

    #[serde(default)]
    pub facts: Vec<StructuredFact>,
}

/// Immutable view of the corpus at a point in time
///
/// Queries in flight keep the snapshot they started with; refreshes build a
/// new snapshot and swap the store's `Arc` wholesale.
#[derive(Debug, Default)]
pub struct CorpusSnapshot {
    chunks: Vec<Chunk>,
    facts: Vec<StructuredFact>,
    embedding_dimension: Option<usize>,
}

impl CorpusSnapshot {
    pub(crate) fn new(
        chunks: Vec<Chunk>,
        facts: Vec<StructuredFact>,
        embedding_dimension: Option<usize>,
    ) -> Self {
        Self {
            chunks,
            facts,
            embedding_dimension,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn facts(&self) -> &[StructuredFact] {
        &self.facts
    }

    /// Dimension shared by all embedded chunks, if any chunk carries a vector
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.embedding_dimension
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.facts.is_empty()
    }

    /// Facts in a given category
    pub fn facts_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a StructuredFact> {
        self.facts
            .iter()
            .filter(move |f| f.category.eq_ignore_ascii_case(category))
    }

    /// First fact matching a key, ignoring case
    pub fn fact_by_key(&self, key: &str) -> Option<&StructuredFact> {
        self.facts.iter().find(|f| f.key.eq_ignore_ascii_case(key))
    }
}
