//! Hybrid retrieval combining vector similarity and keyword scoring

use std::sync::Arc;
use thiserror::Error;

use crate::cache::EmbeddingCache;
use crate::config::RetrievalConfig;
use crate::corpus::CorpusSnapshot;
use crate::embedding::Embedder;
use crate::retrieval::keyword::{query_keywords, score_text};
use crate::retrieval::{fuse_scores, rank_order, FusionConfig, ScoredCandidate, SearchMethod};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Fusion failed: {0}")]
    FusionError(String),
}

/// Cosine similarity between two vectors; 0.0 for mismatched lengths or
/// zero-norm inputs
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Hybrid retriever over a corpus snapshot
pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    embedding_cache: Arc<EmbeddingCache>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        embedding_cache: Arc<EmbeddingCache>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            embedding_cache,
            config,
        }
    }

    /// Retrieve a ranked candidate list for the query
    ///
    /// Matching structured facts are prepended with maximum priority;
    /// remaining candidates are ordered by fused score. The returned
    /// `SearchMethod` records which passes actually contributed.
    pub async fn retrieve(
        &self,
        snapshot: &CorpusSnapshot,
        query_text: &str,
        use_hybrid: bool,
    ) -> Result<(Vec<ScoredCandidate>, SearchMethod), SearchError> {
        if query_text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        let keywords = query_keywords(query_text);

        // Embedding failure degrades retrieval to keyword-only mode rather
        // than failing the query.
        let query_embedding = match self
            .embedding_cache
            .get_or_compute(query_text, self.embedder.as_ref())
            .await
        {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!("Query embedding failed, using keyword-only retrieval: {}", e);
                None
            }
        };

        let run_keyword = use_hybrid || query_embedding.is_none();

        // Two independent read-only passes over the same snapshot
        let (vector_results, keyword_results) = tokio::join!(
            self.vector_pass(snapshot, query_embedding.as_deref()),
            self.keyword_pass(snapshot, &keywords, run_keyword)
        );

        let method = if query_embedding.is_none() {
            SearchMethod::Keyword
        } else if !use_hybrid || keyword_results.is_empty() {
            SearchMethod::Vector
        } else {
            SearchMethod::Hybrid
        };

        let fusion_config =
            FusionConfig::new(self.config.vector_weight, self.config.keyword_weight)
                .map_err(|e| SearchError::FusionError(e.to_string()))?;
        let fused = fuse_scores(&vector_results, &keyword_results, &fusion_config);

        let chunks = snapshot.chunks();
        let mut candidates: Vec<ScoredCandidate> = fused
            .into_iter()
            .filter_map(|(idx, score)| {
                chunks.get(idx).map(|c| ScoredCandidate::from_chunk(c, score))
            })
            .collect();
        candidates.sort_by(rank_order);

        // Structured facts matching the query keywords take priority over
        // any fused ranking.
        let facts = fact_matches(snapshot, &keywords);
        if !facts.is_empty() {
            tracing::debug!(count = facts.len(), "Structured facts short-circuited");
        }

        let mut results = facts;
        results.extend(candidates);
        Ok((results, method))
    }

    async fn vector_pass(
        &self,
        snapshot: &CorpusSnapshot,
        query_embedding: Option<&[f32]>,
    ) -> Vec<(usize, f32)> {
        let Some(query_embedding) = query_embedding else {
            return Vec::new();
        };

        let mut scored: Vec<(usize, f32)> = snapshot
            .chunks()
            .iter()
            .enumerate()
            .filter_map(|(idx, chunk)| {
                chunk
                    .embedding
                    .as_deref()
                    .filter(|e| e.len() == query_embedding.len())
                    .map(|e| (idx, cosine_similarity(query_embedding, e)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.vector_candidates);
        scored
    }

    async fn keyword_pass(
        &self,
        snapshot: &CorpusSnapshot,
        keywords: &[String],
        enabled: bool,
    ) -> Vec<(usize, f32)> {
        if !enabled || keywords.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = snapshot
            .chunks()
            .iter()
            .enumerate()
            .filter_map(|(idx, chunk)| {
                let score = score_text(keywords, &chunk.text);
                (score > 0.0).then_some((idx, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.keyword_candidates);
        scored
    }
}

/// Facts whose key or category tokens overlap the query keywords, best
/// match first
fn fact_matches(snapshot: &CorpusSnapshot, keywords: &[String]) -> Vec<ScoredCandidate> {
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut matched: Vec<(usize, ScoredCandidate)> = snapshot
        .facts()
        .iter()
        .filter_map(|fact| {
            let fact_tokens = query_keywords(&format!(
                "{} {}",
                fact.key.replace('_', " "),
                fact.category.replace('_', " ")
            ));
            let overlap = keywords
                .iter()
                .filter(|k| fact_tokens.iter().any(|t| t == *k))
                .count();
            (overlap > 0).then(|| (overlap, ScoredCandidate::from_fact(fact)))
        })
        .collect();

    matched.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
    matched.into_iter().map(|(_, c)| c).collect()
}
