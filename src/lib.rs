//! Civicqa - Program Documentation Question Answering
//!
//! A retrieval-augmented question-answering service over a fixed corpus of
//! government-program documentation. Combines embedding-based similarity
//! search with keyword search, fuses and reranks the candidates, and builds
//! query-type-aware prompts for an external generation model, with LRU
//! caching at the embedding and full-response layers.

pub mod cache;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod feedback;
pub mod generation;
pub mod prompt;
pub mod retrieval;
pub mod retry;
pub mod synthesis;

pub use error::{CivicQaError, Result};
