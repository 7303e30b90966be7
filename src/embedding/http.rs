//! HTTP embedding client for OpenAI-compatible endpoints

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::embedding::{EmbedError, Embedder};
use crate::retry::RetryPolicy;

/// Embeddings client for an OpenAI-compatible `/embeddings` endpoint
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        base_url: &str,
        model: &str,
        dimension: usize,
        api_key: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, EmbedError> {
        if api_key.trim().is_empty() {
            return Err(EmbedError::InvalidInput("Missing API key".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError::RequestError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension,
            api_key,
            retry,
        })
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
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
                    EmbedError::Timeout
                } else {
                    EmbedError::RequestError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::RequestError(e.to_string()))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbedError::RequestError("Empty embedding response".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.is_empty() {
            return Err(EmbedError::InvalidInput("Empty text".to_string()));
        }

        self.retry
            .run(|| self.request_embedding(text), EmbedError::is_retryable)
            .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1))
    }

    #[test]
    fn rejects_missing_api_key() {
        let result = HttpEmbedder::new(
            "https://api.example.com/v1",
            "text-embedding-3-small",
            768,
            String::new(),
            Duration::from_secs(5),
            policy(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn endpoint_is_normalized() {
        let embedder = HttpEmbedder::new(
            "https://api.example.com/v1/",
            "text-embedding-3-small",
            768,
            "key".to_string(),
            Duration::from_secs(5),
            policy(),
        )
        .unwrap();

        assert_eq!(embedder.endpoint, "https://api.example.com/v1/embeddings");
        assert_eq!(embedder.dimension(), 768);
    }
}
