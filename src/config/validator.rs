use crate::config::Config;
use crate::error::{CivicQaError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_corpus(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_generation(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_cache(config, &mut errors);
        Self::validate_retry(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CivicQaError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_corpus(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.corpus.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "corpus.data_dir",
                "Data directory path cannot be empty",
            ));
        }

        if config.corpus.max_chunk_chars == 0 {
            errors.push(ValidationError::new(
                "corpus.max_chunk_chars",
                "Maximum chunk length must be greater than 0",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let mode = &config.embedding.mode;
        if mode != "offline" && mode != "online" {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'offline' or 'online', got '{}'", mode),
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "embedding.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }

        // The endpoint only matters in online mode, where the API key must
        // resolve at startup rather than at first query.
        if mode == "online" {
            let env_var = &config.embedding.api_key_env;
            match std::env::var(env_var) {
                Ok(key) if !key.is_empty() => {}
                Ok(_) => errors.push(ValidationError::new(
                    "embedding.api_key_env",
                    format!("Environment variable {} is empty", env_var),
                )),
                Err(_) => errors.push(ValidationError::new(
                    "embedding.api_key_env",
                    format!("Environment variable {} is not set", env_var),
                )),
            }
        }
    }

    fn validate_generation(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.generation.enabled {
            let env_var = &config.generation.api_key_env;
            match std::env::var(env_var) {
                Ok(key) if !key.is_empty() => {}
                Ok(_) => errors.push(ValidationError::new(
                    "generation.api_key_env",
                    format!("Environment variable {} is empty", env_var),
                )),
                Err(_) => errors.push(ValidationError::new(
                    "generation.api_key_env",
                    format!("Environment variable {} is not set", env_var),
                )),
            }
        }

        let temp = config.generation.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "generation.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if config.generation.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "generation.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.vector_weight <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.vector_weight",
                "Vector weight must be positive",
            ));
        }

        if retrieval.keyword_weight <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.keyword_weight",
                "Keyword weight must be positive",
            ));
        }

        if retrieval.vector_candidates == 0 {
            errors.push(ValidationError::new(
                "retrieval.vector_candidates",
                "Vector candidate count must be greater than 0",
            ));
        }

        if retrieval.keyword_candidates == 0 {
            errors.push(ValidationError::new(
                "retrieval.keyword_candidates",
                "Keyword candidate count must be greater than 0",
            ));
        }

        if retrieval.default_results == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_results",
                "Default result count must be greater than 0",
            ));
        }

        if retrieval.default_results > retrieval.rerank_candidates {
            errors.push(ValidationError::new(
                "retrieval.default_results",
                format!(
                    "Default result count ({}) exceeds rerank candidate pool ({})",
                    retrieval.default_results, retrieval.rerank_candidates
                ),
            ));
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.embedding_capacity == 0 {
            errors.push(ValidationError::new(
                "cache.embedding_capacity",
                "Embedding cache capacity must be greater than 0",
            ));
        }

        if config.cache.query_capacity == 0 {
            errors.push(ValidationError::new(
                "cache.query_capacity",
                "Query cache capacity must be greater than 0",
            ));
        }
    }

    fn validate_retry(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retry.max_attempts == 0 {
            errors.push(ValidationError::new(
                "retry.max_attempts",
                "Retry attempts must be at least 1",
            ));
        }

        if config.retry.max_delay_ms < config.retry.base_delay_ms {
            errors.push(ValidationError::new(
                "retry.max_delay_ms",
                "Maximum delay must not be smaller than the base delay",
            ));
        }
    }
}
