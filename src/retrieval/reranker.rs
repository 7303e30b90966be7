//! Deterministic lexical reranking of the top candidate slice

use regex::Regex;

use crate::retrieval::keyword::{keyword_coverage, keyword_density, query_keywords};
use crate::retrieval::ScoredCandidate;

/// Boost applied when the full query phrase appears verbatim in the text
const EXACT_PHRASE_BOOST: f32 = 5.0;
/// Scale for the fraction of query terms covered by the text
const COVERAGE_BOOST: f32 = 2.0;
/// Scale for query-term density
const DENSITY_BOOST: f32 = 2.0;
/// Boost for definitional sentences when the query asks for a definition
const DEFINITION_BOOST: f32 = 4.0;
/// Boost for overview/introductory content on definition-style queries
const OVERVIEW_BOOST: f32 = 1.5;

const OVERVIEW_TERMS: &[&str] = &[
    "overview",
    "introduction",
    "general information",
    "program overview",
];

/// Second-pass reranker using finer lexical signals than the fusion score
///
/// Deterministic for identical input order and query: scoring uses no
/// randomness and ties preserve the incoming order, so cached responses and
/// tests are reproducible.
pub struct Reranker {
    definition_patterns: Vec<Regex>,
    definition_query: Regex,
}

impl Default for Reranker {
    fn default() -> Self {
        Self::new()
    }
}

impl Reranker {
    pub fn new() -> Self {
        let definition_patterns = [
            r"\b(is|are)\s+an?\s+\w+",
            r"\bdefinition\s+of\b",
            r"\brefers?\s+to\b",
            r"\bmeans\s+that\b",
            r"\bprogram\s+that\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static reranker pattern"))
        .collect();

        Self {
            definition_patterns,
            definition_query: Regex::new(r"\b(what\s+is|definition|define|meaning)\b")
                .expect("static reranker pattern"),
        }
    }

    /// Re-score and reorder candidates, returning the top `limit`
    ///
    /// Structured facts keep their position at the front; only free-text
    /// chunks are re-scored.
    pub fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredCandidate>,
        limit: usize,
    ) -> Vec<ScoredCandidate> {
        let (facts, chunks): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(ScoredCandidate::is_fact);

        let normalized_query = normalize_phrase(query);
        let keywords = query_keywords(query);
        let wants_definition = self.definition_query.is_match(&normalized_query);

        let mut rescored: Vec<ScoredCandidate> = chunks
            .into_iter()
            .map(|mut candidate| {
                candidate.score = self.relevance_score(
                    &candidate,
                    &normalized_query,
                    &keywords,
                    wants_definition,
                );
                candidate
            })
            .collect();

        // Stable sort keeps the incoming order for equal scores
        rescored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Facts always survive the cut, even when they fill the budget
        let chunk_budget = limit.saturating_sub(facts.len());
        rescored.truncate(chunk_budget);

        let mut results = facts;
        results.extend(rescored);
        results
    }

    fn relevance_score(
        &self,
        candidate: &ScoredCandidate,
        normalized_query: &str,
        keywords: &[String],
        wants_definition: bool,
    ) -> f32 {
        let text = candidate.text.to_lowercase();
        let mut score = candidate.score;

        if !normalized_query.is_empty() && text.contains(normalized_query) {
            score += EXACT_PHRASE_BOOST;
        }

        score += keyword_coverage(keywords, &text) * COVERAGE_BOOST;
        score += keyword_density(keywords, &text) * DENSITY_BOOST;

        if wants_definition {
            if self.definition_patterns.iter().any(|p| p.is_match(&text)) {
                score += DEFINITION_BOOST;
            }
            if OVERVIEW_TERMS.iter().any(|t| text.contains(t)) {
                score += OVERVIEW_BOOST;
            }
        }

        score
    }
}

/// Lowercase, collapse whitespace, and strip trailing punctuation for
/// phrase matching
fn normalize_phrase(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['?', '.', '!'])
        .to_string()
}
