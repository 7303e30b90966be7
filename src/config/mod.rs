//! Configuration management for civicqa
//!
//! Handles loading, validation, and management of the service configuration:
//! corpus location, retrieval tuning, cache capacities, and the external
//! embedding/generation endpoints.

use crate::error::{CivicQaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub program: ProgramConfig,
    pub corpus: CorpusConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// The documented program this corpus covers, used in prompts and fallback
/// answers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// Short program name (e.g. "EIDBI")
    pub name: String,
    /// Expanded program name
    pub full_name: String,
    /// Name of the authoritative directory/source for exact figures
    pub authoritative_source: String,
    /// URL of the authoritative source
    pub authoritative_url: String,
}

/// Corpus storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory holding chunks.json / facts.json / feedback.jsonl
    pub data_dir: PathBuf,
    /// Maximum chunk text length kept at ingestion
    pub max_chunk_chars: usize,
}

/// Embedding collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "offline" (deterministic hash vectors) or "online" (HTTP endpoint)
    pub mode: String,
    pub model: String,
    pub endpoint: String,
    pub api_key_env: String,
    /// Vector dimension produced by the model
    pub dimension: usize,
    pub timeout_secs: u64,
}

/// Generation collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub enabled: bool,
    pub model: String,
    pub endpoint: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

/// Retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates taken from the vector pass before fusion
    pub vector_candidates: usize,
    /// Candidates taken from the keyword pass before fusion
    pub keyword_candidates: usize,
    /// Weight of the normalized vector score in fusion
    pub vector_weight: f32,
    /// Weight of the normalized keyword score in fusion
    pub keyword_weight: f32,
    /// Top slice handed to the reranker
    pub rerank_candidates: usize,
    /// Final result count when the request does not override it
    pub default_results: usize,
    pub enable_reranking: bool,
}

/// Cache capacities (entries, LRU eviction)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub embedding_capacity: usize,
    pub query_capacity: usize,
}

/// Retry policy for external embedding/generation calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CivicQaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CivicQaError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| CivicQaError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CIVICQA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("CIVICQA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "GENERATION__ENABLED" => {
                self.generation.enabled =
                    value.parse().map_err(|_| CivicQaError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as boolean", value),
                    })?;
            }
            "GENERATION__MODEL" => {
                self.generation.model = value.to_string();
            }
            "EMBEDDING__MODE" => {
                self.embedding.mode = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "CORPUS__DATA_DIR" => {
                self.corpus.data_dir = PathBuf::from(value);
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CivicQaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("civicqa").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| CivicQaError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".civicqa"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            program: ProgramConfig {
                name: "EIDBI".to_string(),
                full_name: "Early Intensive Developmental and Behavioral Intervention".to_string(),
                authoritative_source: "Minnesota DHS Provider Directory".to_string(),
                authoritative_url: "https://www.dhs.state.mn.us/".to_string(),
            },
            corpus: CorpusConfig {
                data_dir: PathBuf::from("~/.civicqa"),
                max_chunk_chars: 8000,
            },
            embedding: EmbeddingConfig {
                mode: "offline".to_string(),
                model: "text-embedding-3-small".to_string(),
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key_env: "CIVICQA_EMBEDDING_API_KEY".to_string(),
                dimension: 768,
                timeout_secs: 30,
            },
            generation: GenerationConfig {
                enabled: false,
                model: "gpt-4o-mini".to_string(),
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key_env: "CIVICQA_GENERATION_API_KEY".to_string(),
                temperature: 0.2,
                max_output_tokens: 1024,
                timeout_secs: 30,
            },
            retrieval: RetrievalConfig {
                vector_candidates: 15,
                keyword_candidates: 20,
                vector_weight: 0.7,
                keyword_weight: 0.3,
                rerank_candidates: 20,
                default_results: 8,
                enable_reranking: true,
            },
            cache: CacheConfig {
                embedding_capacity: 100,
                query_capacity: 50,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 500,
                max_delay_ms: 8000,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(parsed.retrieval.vector_candidates, 15);
        assert_eq!(parsed.cache.query_capacity, 50);
        assert_eq!(parsed.embedding.dimension, 768);
        assert_eq!(parsed.program.name, "EIDBI");
    }

    #[test]
    fn save_and_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let config = Config::default();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.default_results, 8);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Config::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(CivicQaError::ConfigNotFound { .. })));
    }
}
