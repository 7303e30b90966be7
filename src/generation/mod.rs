//! Generation collaborators
//!
//! The `Generator` trait abstracts prompt-to-text generation. The HTTP
//! implementation talks to an OpenAI-compatible chat completions endpoint;
//! any failure surfaces as a `GenerateError` and the synthesizer degrades to
//! a templated offline answer instead of failing the query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::retry::RetryPolicy;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Generation request failed: {0}")]
    RequestError(String),

    #[error("Generation request timed out")]
    Timeout,

    #[error("Generation endpoint returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Generation returned no content")]
    EmptyResponse,
}

impl GenerateError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerateError::Timeout | GenerateError::RequestError(_) => true,
            GenerateError::ApiError { status, .. } => *status == 429 || *status >= 500,
            GenerateError::EmptyResponse => false,
        }
    }
}

/// Trait for generation providers
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a text response for the given prompt
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;

    /// Get the model name
    fn name(&self) -> &str;
}

/// Chat completions client for an OpenAI-compatible endpoint
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl HttpGenerator {
    pub fn new(
        config: &GenerationConfig,
        api_key: String,
        retry: RetryPolicy,
    ) -> Result<Self, GenerateError> {
        if api_key.trim().is_empty() {
            return Err(GenerateError::RequestError("Missing API key".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerateError::RequestError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.endpoint.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            api_key,
            retry,
        })
    }

    async fn request_completion(&self, prompt: &str) -> Result<String, GenerateError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_output_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout
                } else {
                    GenerateError::RequestError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerateError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::RequestError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .map(|text| text.trim().to_string())
            .ok_or(GenerateError::EmptyResponse)
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.retry
            .run(
                || self.request_completion(prompt),
                GenerateError::is_retryable,
            )
            .await
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(GenerateError::Timeout.is_retryable());
        assert!(GenerateError::ApiError {
            status: 500,
            message: String::new()
        }
        .is_retryable());
        assert!(!GenerateError::ApiError {
            status: 401,
            message: String::new()
        }
        .is_retryable());
        assert!(!GenerateError::EmptyResponse.is_retryable());
    }

    #[test]
    fn rejects_missing_api_key() {
        let config = GenerationConfig {
            enabled: true,
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.example.com/v1".to_string(),
            api_key_env: "UNUSED".to_string(),
            temperature: 0.2,
            max_output_tokens: 256,
            timeout_secs: 5,
        };
        let retry = RetryPolicy::new(
            1,
            Duration::from_millis(1),
            Duration::from_millis(1),
        );
        assert!(HttpGenerator::new(&config, String::new(), retry).is_err());
    }
}
