//! Answer synthesis pipeline
//!
//! Orchestrates the full query flow: query-cache lookup, classification,
//! hybrid retrieval, reranking, prompt construction, external generation,
//! and cache write-back. The synthesizer always returns a well-formed
//! response; generation failures degrade to a deterministic templated
//! answer keyed by the detected query type.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{query_fingerprint, EmbeddingCache, QueryCache};
use crate::config::{ProgramConfig, RetrievalConfig};
use crate::corpus::CorpusStore;
use crate::embedding::Embedder;
use crate::error::{CivicQaError, Result};
use crate::generation::Generator;
use crate::prompt::{PromptBuilder, PromptMetadata, QueryClassifier, QueryType, ResponseFormat};
use crate::retrieval::{HybridRetriever, Reranker, ScoredCandidate};

pub use crate::retrieval::SearchMethod;

/// A single question with its request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_text: String,

    /// Final result count; 0 falls back to the configured default
    pub num_results: usize,

    pub use_hybrid_search: bool,
    pub use_reranking: bool,
    pub use_enhanced_prompts: bool,

    /// Caller session, excluded from cache fingerprinting
    pub session_id: Option<String>,
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>, num_results: usize) -> Self {
        Self {
            query_text: query_text.into(),
            num_results,
            use_hybrid_search: true,
            use_reranking: true,
            use_enhanced_prompts: true,
            session_id: None,
        }
    }
}

/// The externally-facing response object; every field is always present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub retrieved_chunk_ids: Vec<String>,
    pub version: String,
    pub cached: bool,
    pub search_method: SearchMethod,
    pub query_type: QueryType,
    pub response_format: ResponseFormat,
    pub sources_used: Vec<String>,
    pub prompt_metadata: PromptMetadata,
}

/// End-to-end answer synthesizer
pub struct AnswerSynthesizer {
    corpus: Arc<CorpusStore>,
    retriever: HybridRetriever,
    reranker: Reranker,
    classifier: QueryClassifier,
    prompt_builder: PromptBuilder,
    generator: Option<Arc<dyn Generator>>,
    query_cache: Arc<QueryCache>,
    retrieval: RetrievalConfig,
    program: ProgramConfig,
}

impl AnswerSynthesizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        corpus: Arc<CorpusStore>,
        embedder: Arc<dyn Embedder>,
        generator: Option<Arc<dyn Generator>>,
        embedding_cache: Arc<EmbeddingCache>,
        query_cache: Arc<QueryCache>,
        retrieval: RetrievalConfig,
        program: ProgramConfig,
    ) -> Self {
        let retriever = HybridRetriever::new(embedder, embedding_cache, retrieval.clone());

        Self {
            corpus,
            retriever,
            reranker: Reranker::new(),
            classifier: QueryClassifier::new(),
            prompt_builder: PromptBuilder::new(program.clone()),
            generator,
            query_cache,
            retrieval,
            program,
        }
    }

    /// Answer a query through the full pipeline
    pub async fn answer(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let query = request.query_text.trim();
        if query.is_empty() {
            return Err(CivicQaError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        let num_results = if request.num_results == 0 {
            self.retrieval.default_results
        } else {
            request.num_results
        };

        let fingerprint = query_fingerprint(
            query,
            num_results,
            request.use_hybrid_search,
            request.use_reranking,
            request.use_enhanced_prompts,
        );

        if let Some(hit) = self.query_cache.lookup(&fingerprint) {
            tracing::debug!("Query cache hit");
            return Ok(hit);
        }

        let query_type = self.classifier.classify(query);
        let response_format = self.classifier.response_format(query, query_type);
        tracing::debug!(
            query_type = %query_type,
            response_format = %response_format,
            "Query classified"
        );

        let snapshot = self.corpus.snapshot();
        let (candidates, search_method) = self
            .retriever
            .retrieve(&snapshot, query, request.use_hybrid_search)
            .await
            .map_err(|e| CivicQaError::InvalidQuery(e.to_string()))?;

        if candidates.is_empty() {
            let response = self.insufficient_information_response(
                query,
                search_method,
                query_type,
                response_format,
            );
            self.query_cache.store(fingerprint, response.clone());
            return Ok(response);
        }

        let mut top = candidates;
        top.truncate(self.retrieval.rerank_candidates);
        let top = if request.use_reranking && top.len() > 1 {
            self.reranker.rerank(query, top, num_results)
        } else {
            top.truncate(num_results);
            top
        };

        let (prompt, prompt_metadata) = self.prompt_builder.build(
            query,
            query_type,
            response_format,
            &top,
            request.use_enhanced_prompts,
        );

        let answer = match &self.generator {
            Some(generator) => match generator.generate(&prompt).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Generation failed, using templated fallback: {}", e);
                    self.fallback_answer(query_type, &top)
                }
            },
            None => self.fallback_answer(query_type, &top),
        };

        let response = QueryResponse {
            query: query.to_string(),
            answer,
            retrieved_chunk_ids: top.iter().map(|c| c.id.clone()).collect(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cached: false,
            search_method,
            query_type,
            response_format,
            sources_used: dedup_sources(&top),
            prompt_metadata,
        };

        self.query_cache.store(fingerprint, response.clone());
        Ok(response)
    }

    /// Deterministic local answer used when generation is unavailable
    ///
    /// Provider-count questions quote a matching structured fact when one was
    /// retrieved and otherwise carry an explicit "not specified" disclaimer;
    /// everything else gets a short template keyed by the query type.
    fn fallback_answer(&self, query_type: QueryType, candidates: &[ScoredCandidate]) -> String {
        let pointer = format!(
            "Please consult the {} at {} for authoritative information on the {} program.",
            self.program.authoritative_source,
            self.program.authoritative_url,
            self.program.name
        );

        if query_type == QueryType::ProviderCount {
            if let Some(answer) = candidates
                .iter()
                .filter(|c| c.is_fact() && c.id.starts_with("fact:provider_count:"))
                .find_map(quote_fact)
            {
                return format!("{} {}", answer, pointer);
            }

            return format!(
                "The exact number of {} providers is not specified in the available \
                 information. {}",
                self.program.name, pointer
            );
        }

        let lead = match query_type {
            QueryType::Eligibility => "Eligibility details could not be generated right now.",
            QueryType::Services => "A summary of covered services could not be generated right now.",
            QueryType::Process => "Application steps could not be generated right now.",
            QueryType::Cost => "Cost and coverage details could not be generated right now.",
            QueryType::Provider => "Provider information could not be generated right now.",
            QueryType::Definition => "A definition could not be generated right now.",
            QueryType::Comparison => "A comparison could not be generated right now.",
            QueryType::ProviderCount | QueryType::General => {
                "An answer could not be generated right now."
            }
        };

        format!("{} {}", lead, pointer)
    }

    fn insufficient_information_response(
        &self,
        query: &str,
        search_method: SearchMethod,
        query_type: QueryType,
        response_format: ResponseFormat,
    ) -> QueryResponse {
        let answer = format!(
            "Insufficient information is available to answer this question. Please \
             consult the {} at {} for authoritative guidance on the {} program.",
            self.program.authoritative_source,
            self.program.authoritative_url,
            self.program.name
        );

        QueryResponse {
            query: query.to_string(),
            answer,
            retrieved_chunk_ids: Vec::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cached: false,
            search_method,
            query_type,
            response_format,
            sources_used: Vec::new(),
            prompt_metadata: PromptMetadata {
                query_type,
                response_format,
                template: "insufficient_information".to_string(),
                context_chunks: 0,
            },
        }
    }
}

/// Build "according to" phrasing from a rendered fact candidate
fn quote_fact(fact: &ScoredCandidate) -> Option<String> {
    let mut key = None;
    let mut value = None;
    for line in fact.text.lines() {
        if let Some(k) = line.strip_prefix("Key Fact: ") {
            key = Some(k);
        } else if let Some(v) = line.strip_prefix("Value: ") {
            value = Some(v);
        }
    }

    match (key, value) {
        (Some(key), Some(value)) => Some(format!(
            "According to the {}, the {} is {}.",
            fact.source, key, value
        )),
        _ => None,
    }
}

/// Distinct source names of the contributing candidates, in rank order
fn dedup_sources(candidates: &[ScoredCandidate]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for candidate in candidates {
        if !sources.contains(&candidate.source) {
            sources.push(candidate.source.clone());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::CandidateKind;

    fn program() -> ProgramConfig {
        crate::config::Config::default().program
    }

    fn synthesizer() -> AnswerSynthesizer {
        let config = crate::config::Config::default();
        AnswerSynthesizer::new(
            Arc::new(CorpusStore::new(8000)),
            Arc::new(crate::embedding::HashEmbedder::new(16)),
            None,
            Arc::new(EmbeddingCache::new(10)),
            Arc::new(QueryCache::new(10)),
            config.retrieval,
            config.program,
        )
    }

    fn fact_candidate() -> ScoredCandidate {
        ScoredCandidate {
            id: "fact:provider_count:total_providers".to_string(),
            text: "Key Fact: total providers\nValue: 173\nSource: Directory".to_string(),
            score: crate::retrieval::FACT_PRIORITY_SCORE,
            source: "Directory".to_string(),
            source_url: None,
            updated: None,
            kind: CandidateKind::Fact,
        }
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let synthesizer = synthesizer();
        let request = QueryRequest::new("   ", 5);
        assert!(matches!(
            synthesizer.answer(&request).await,
            Err(CivicQaError::InvalidQuery(_))
        ));
    }

    #[test]
    fn provider_count_fallback_quotes_a_retrieved_fact() {
        let synthesizer = synthesizer();
        let answer =
            synthesizer.fallback_answer(QueryType::ProviderCount, &[fact_candidate()]);

        assert!(answer.contains("173"));
        assert!(answer.contains("Directory"));
    }

    #[test]
    fn provider_count_fallback_without_fact_has_disclaimer() {
        let synthesizer = synthesizer();
        let answer = synthesizer.fallback_answer(QueryType::ProviderCount, &[]);

        assert!(answer.contains("not specified in the available information"));
        assert!(answer.contains(&program().authoritative_source));
    }

    #[test]
    fn fallback_answers_name_the_authoritative_source() {
        let synthesizer = synthesizer();
        for query_type in QueryType::ALL {
            let answer = synthesizer.fallback_answer(query_type, &[]);
            assert!(
                answer.contains(&program().authoritative_source),
                "missing pointer for {:?}",
                query_type
            );
        }
    }

    #[test]
    fn sources_are_deduplicated_in_rank_order() {
        let a = ScoredCandidate {
            id: "a".to_string(),
            text: String::new(),
            score: 1.0,
            source: "Manual".to_string(),
            source_url: None,
            updated: None,
            kind: CandidateKind::Chunk,
        };
        let mut b = a.clone();
        b.id = "b".to_string();
        let mut c = a.clone();
        c.id = "c".to_string();
        c.source = "Directory".to_string();

        assert_eq!(dedup_sources(&[a, b, c]), vec!["Manual", "Directory"]);
    }
}
