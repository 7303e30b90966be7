//! LRU cache for full query responses

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::cache::CacheStats;
use crate::synthesis::QueryResponse;

/// Fingerprint a query and the request parameters that affect its output
///
/// The query text is lowercased and whitespace-collapsed; the session id is
/// deliberately excluded so that identical questions from different sessions
/// share an entry.
pub fn query_fingerprint(
    query_text: &str,
    num_results: usize,
    use_hybrid_search: bool,
    use_reranking: bool,
    use_enhanced_prompts: bool,
) -> String {
    let normalized = query_text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let material = format!(
        "{}|{}|{}|{}|{}",
        normalized, num_results, use_hybrid_search, use_reranking, use_enhanced_prompts
    );
    blake3::hash(material.as_bytes()).to_hex().to_string()
}

struct CacheEntry {
    response: QueryResponse,
    stored_at: chrono::DateTime<chrono::Utc>,
}

struct Inner {
    entries: LruCache<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Memoizes full query-to-response pairs, keyed by fingerprint
pub struct QueryCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(
                    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
                ),
                hits: 0,
                misses: 0,
            }),
            capacity,
        }
    }

    /// Look up a fingerprint; replayed responses come back flagged
    /// `cached: true`
    pub fn lookup(&self, fingerprint: &str) -> Option<QueryResponse> {
        let mut inner = self.inner.lock().unwrap();
        match inner.entries.get(fingerprint) {
            Some(entry) => {
                let age = chrono::Utc::now() - entry.stored_at;
                tracing::debug!(age_secs = age.num_seconds(), "Replaying cached response");
                let mut response = entry.response.clone();
                response.cached = true;
                inner.hits += 1;
                Some(response)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a freshly computed response
    pub fn store(&self, fingerprint: String, response: QueryResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.put(
            fingerprint,
            CacheEntry {
                response,
                stored_at: chrono::Utc::now(),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            entries: inner.entries.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{PromptMetadata, QueryType, ResponseFormat};
    use crate::synthesis::SearchMethod;

    fn response(answer: &str) -> QueryResponse {
        QueryResponse {
            query: "what is the program".to_string(),
            answer: answer.to_string(),
            retrieved_chunk_ids: vec!["chunk-1".to_string()],
            version: "0.1.0".to_string(),
            cached: false,
            search_method: SearchMethod::Hybrid,
            query_type: QueryType::General,
            response_format: ResponseFormat::Concise,
            sources_used: vec!["Test Source".to_string()],
            prompt_metadata: PromptMetadata {
                query_type: QueryType::General,
                response_format: ResponseFormat::Concise,
                template: "general_concise".to_string(),
                context_chunks: 1,
            },
        }
    }

    #[test]
    fn fingerprint_ignores_case_and_whitespace() {
        let a = query_fingerprint("What is  EIDBI?", 5, true, true, true);
        let b = query_fingerprint("what is eidbi?", 5, true, true, true);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_varies_with_parameters() {
        let base = query_fingerprint("what is eidbi?", 5, true, true, true);
        assert_ne!(base, query_fingerprint("what is eidbi?", 3, true, true, true));
        assert_ne!(base, query_fingerprint("what is eidbi?", 5, false, true, true));
        assert_ne!(base, query_fingerprint("what is eidbi?", 5, true, false, true));
        assert_ne!(base, query_fingerprint("what is eidbi?", 5, true, true, false));
    }

    #[test]
    fn roundtrip_flips_only_the_cached_flag() {
        let cache = QueryCache::new(10);
        let fingerprint = query_fingerprint("q", 5, true, true, true);

        cache.store(fingerprint.clone(), response("the answer"));
        let replayed = cache.lookup(&fingerprint).unwrap();

        assert!(replayed.cached);
        let mut original = response("the answer");
        original.cached = true;
        assert_eq!(
            serde_json::to_string(&replayed).unwrap(),
            serde_json::to_string(&original).unwrap()
        );
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let cache = QueryCache::new(2);
        cache.store("a".to_string(), response("a"));
        cache.store("b".to_string(), response("b"));
        cache.store("c".to_string(), response("c"));

        assert!(cache.lookup("a").is_none());
        assert!(cache.lookup("b").is_some());
        assert!(cache.lookup("c").is_some());
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = QueryCache::new(2);
        cache.store("a".to_string(), response("a"));

        cache.lookup("a");
        cache.lookup("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.capacity, 2);
    }
}
