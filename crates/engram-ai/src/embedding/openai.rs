use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::provider::EmbeddingProvider;
use crate::error::{CapabilityError, Result};

const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn dimension_for_model(model: &str) -> usize {
    match model {
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        "text-embedding-ada-002" => 1536,
        _ => 1536,
    }
}

/// Embedding provider backed by the OpenAI embeddings API.
pub struct OpenAIEmbedding {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
    batch_size: usize,
    timeout_secs: u64,
}

impl OpenAIEmbedding {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_model_name(api_key, DEFAULT_MODEL)
    }

    pub fn with_model_name(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = dimension_for_model(&model);
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            dimension,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let normalized = self.normalize_text(text);
        let embeddings = self.embed_batch(&[normalized]).await?;
        embeddings.into_iter().next().ok_or(CapabilityError::Api {
            status: 200,
            message: "no embedding returned".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if self.api_key.is_empty() {
            return Err(CapabilityError::Unavailable(
                "no API key configured".to_string(),
            ));
        }

        tracing::debug!(model = %self.model, texts = texts.len(), "embedding request");
        let mut result = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let request = EmbeddingRequest {
                model: self.model.clone(),
                input: batch.to_vec(),
            };

            let response = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .timeout(Duration::from_secs(self.timeout_secs))
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(CapabilityError::from_status(status, message));
            }

            let data: EmbeddingResponse = response.json().await?;
            let mut sorted = data.data;
            sorted.sort_by_key(|item| item.index);
            result.extend(sorted.into_iter().map(|item| item.embedding));
        }

        Ok(result)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_dimension_follows_model() {
        assert_eq!(OpenAIEmbedding::new("k").dimension(), 1536);
        assert_eq!(
            OpenAIEmbedding::with_model_name("k", "text-embedding-3-large").dimension(),
            3072
        );
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_input_order() {
        let server = MockServer::start().await;
        // Return embeddings out of order; the provider must sort by index.
        let body = serde_json::json!({
            "data": [
                {"embedding": [0.0, 1.0], "index": 1},
                {"embedding": [1.0, 0.0], "index": 0}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let provider = OpenAIEmbedding::new("key").with_base_url(server.uri());
        let vectors = provider
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits() {
        let provider = OpenAIEmbedding::new("key");
        let vectors = provider.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unavailable() {
        let provider = OpenAIEmbedding::new("");
        let err = provider.embed("text").await.unwrap_err();
        assert!(matches!(err, CapabilityError::Unavailable(_)));
    }
}
