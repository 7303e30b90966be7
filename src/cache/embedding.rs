//! LRU cache for text embeddings

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::cache::CacheStats;
use crate::embedding::{EmbedError, Embedder};

struct Inner {
    entries: LruCache<String, Vec<f32>>,
    hits: u64,
    misses: u64,
}

/// Memoizes text-to-vector lookups
///
/// Keys are the exact input text with no normalization, since embeddings are
/// sensitive to the exact input. Misses call the injected embedder; its
/// errors propagate to the caller, and the fallback policy lives above this
/// layer.
pub struct EmbeddingCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl EmbeddingCache {
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

    /// Return the cached vector for `text`, computing and storing it on a
    /// miss
    pub async fn get_or_compute(
        &self,
        text: &str,
        embedder: &dyn Embedder,
    ) -> Result<Vec<f32>, EmbedError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(vector) = inner.entries.get(text) {
                let vector = vector.clone();
                inner.hits += 1;
                return Ok(vector);
            }
            inner.misses += 1;
        }

        // The lock is not held across the external call; a concurrent miss
        // on the same text recomputes an identical vector.
        let vector = embedder.embed(text).await?;

        let mut inner = self.inner.lock().unwrap();
        inner.entries.put(text.to_string(), vector.clone());
        Ok(vector)
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
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embedder that counts how often it is invoked
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32; 4])
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn repeated_lookups_call_embedder_once() {
        let cache = EmbeddingCache::new(10);
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };

        let first = cache.get_or_compute("hello", &embedder).await.unwrap();
        let second = cache.get_or_compute("hello", &embedder).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn keys_are_exact_text() {
        let cache = EmbeddingCache::new(10);
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };

        cache.get_or_compute("Hello", &embedder).await.unwrap();
        cache.get_or_compute("hello", &embedder).await.unwrap();
        cache.get_or_compute("hello ", &embedder).await.unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let cache = EmbeddingCache::new(2);
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };

        cache.get_or_compute("a", &embedder).await.unwrap();
        cache.get_or_compute("b", &embedder).await.unwrap();
        // Touch "a" so "b" becomes the eviction candidate
        cache.get_or_compute("a", &embedder).await.unwrap();
        cache.get_or_compute("c", &embedder).await.unwrap();
        cache.get_or_compute("b", &embedder).await.unwrap();

        // a, b, c misses plus the re-computation of evicted b
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = EmbeddingCache::new(10);
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };

        cache.get_or_compute("a", &embedder).await.unwrap();
        cache.clear();
        assert_eq!(cache.stats().entries, 0);

        cache.get_or_compute("a", &embedder).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }
}
