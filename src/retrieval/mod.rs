//! Hybrid retrieval and reranking
//!
//! Combines vector similarity and keyword scoring over the corpus snapshot,
//! fuses the two candidate sets with configurable weights, short-circuits
//! structured facts to the front, and reranks the top slice with finer
//! lexical signals.

mod fusion;
mod hybrid;
mod keyword;
mod reranker;

pub use fusion::{fuse_scores, FusionConfig, FusionError};
pub use hybrid::{cosine_similarity, HybridRetriever, SearchError};
pub use keyword::{query_keywords, score_text};
pub use reranker::Reranker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::corpus::{Chunk, StructuredFact};

/// Priority score assigned to structured facts so fuzzy matches never bury
/// them
pub const FACT_PRIORITY_SCORE: f32 = f32::MAX;

/// How the final candidate set was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// Vector and keyword passes fused
    Hybrid,
    /// Vector scores only (keyword pass found nothing, or hybrid disabled)
    Vector,
    /// Keyword scores only (embedding unavailable)
    Keyword,
}

impl std::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMethod::Hybrid => write!(f, "hybrid"),
            SearchMethod::Vector => write!(f, "vector"),
            SearchMethod::Keyword => write!(f, "keyword"),
        }
    }
}

/// Whether a candidate came from free text or from the fact table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Chunk,
    Fact,
}

/// A retrieval candidate with its combined relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub source: String,
    pub source_url: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub kind: CandidateKind,
}

impl ScoredCandidate {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            id: chunk.id.clone(),
            text: chunk.text.clone(),
            score,
            source: chunk.metadata.source.clone(),
            source_url: chunk.metadata.source_url.clone(),
            updated: chunk.metadata.extracted_date,
            kind: CandidateKind::Chunk,
        }
    }

    pub fn from_fact(fact: &StructuredFact) -> Self {
        Self {
            id: fact.id(),
            text: fact.render_text(),
            score: FACT_PRIORITY_SCORE,
            source: fact.source.clone(),
            source_url: fact.source_url.clone(),
            updated: Some(fact.last_updated),
            kind: CandidateKind::Fact,
        }
    }

    pub fn is_fact(&self) -> bool {
        self.kind == CandidateKind::Fact
    }
}

/// Ordering for fused candidates: score descending, ties broken by more
/// recent update date, then by shorter text
pub(crate) fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> std::cmp::Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.updated.cmp(&a.updated))
        .then_with(|| a.text.len().cmp(&b.text.len()))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, score: f32, text_len: usize) -> ScoredCandidate {
        ScoredCandidate {
            id: id.to_string(),
            text: "x".repeat(text_len),
            score,
            source: "s".to_string(),
            source_url: None,
            updated: None,
            kind: CandidateKind::Chunk,
        }
    }

    #[test]
    fn ordering_prefers_score_then_recency_then_brevity() {
        let mut candidates = vec![
            candidate("long", 0.5, 100),
            candidate("high", 0.9, 50),
            candidate("short", 0.5, 10),
        ];
        let mut recent = candidate("recent", 0.5, 100);
        recent.updated = Some(Utc::now());
        candidates.push(recent);

        candidates.sort_by(rank_order);

        assert_eq!(candidates[0].id, "high");
        assert_eq!(candidates[1].id, "recent");
        assert_eq!(candidates[2].id, "short");
        assert_eq!(candidates[3].id, "long");
    }

    #[test]
    fn search_method_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SearchMethod::Keyword).unwrap(),
            "\"keyword\""
        );
        assert_eq!(SearchMethod::Hybrid.to_string(), "hybrid");
    }
}
