//! Response and embedding caches
//!
//! Both caches are bounded LRU structures guarded by their own mutex.
//! They are constructed once at process start and injected into the
//! synthesizer; nothing in the crate reaches for a global cache.

mod embedding;
mod query;

pub use embedding::EmbeddingCache;
pub use query::{query_fingerprint, QueryCache};

use serde::Serialize;

/// Counters exposed by the cache administration surface
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}
