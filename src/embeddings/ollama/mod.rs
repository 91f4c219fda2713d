#[cfg(test)]
mod tests;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::embeddings::Embedder;
use crate::{RagError, Result};

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Remote embedding backend speaking the Ollama embedding protocol.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    batch_size: usize,
    client: reqwest::Client,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    model: String,
    #[serde(rename = "input")]
    inputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config.backend_url()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RagError::EmbeddingBackend(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size as usize,
            client,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response_text = self
            .send_with_retry(&serde_json::to_value(&request).map_err(|e| {
                RagError::EmbeddingBackend(format!("Failed to serialize request: {e}"))
            })?)
            .await?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::EmbeddingBackend(format!("Malformed embedding response: {e}"))
        })?;

        Ok(response.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() == 1 {
            let embedding = self.embed_single(&texts[0]).await?;
            return Ok(vec![embedding]);
        }

        let request = BatchEmbedRequest {
            model: self.model.clone(),
            inputs: texts.to_vec(),
        };

        let response_text = self
            .send_with_retry(&serde_json::to_value(&request).map_err(|e| {
                RagError::EmbeddingBackend(format!("Failed to serialize request: {e}"))
            })?)
            .await?;

        let response: BatchEmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::EmbeddingBackend(format!("Malformed batch embedding response: {e}"))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingBackend(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }

    async fn send_with_retry(&self, body: &serde_json::Value) -> Result<String> {
        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| RagError::EmbeddingBackend(format!("Failed to build URL: {e}")))?;

        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("Embedding request attempt {}/{}", attempt, self.retry_attempts);

            match self.client.post(url.clone()).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.text().await.map_err(|e| {
                            RagError::EmbeddingBackend(format!(
                                "Failed to read response body: {e}"
                            ))
                        });
                    }

                    if status.is_server_error() {
                        warn!(
                            "Embedding backend server error (status {}), attempt {}/{}",
                            status, attempt, self.retry_attempts
                        );
                        last_error = Some(RagError::EmbeddingBackend(format!(
                            "Backend returned HTTP {status}"
                        )));
                    } else {
                        warn!("Embedding backend client error (status {}), not retrying", status);
                        return Err(RagError::EmbeddingBackend(format!(
                            "Backend returned HTTP {status}"
                        )));
                    }
                }
                Err(error) if error.is_timeout() || error.is_connect() || error.is_request() => {
                    warn!(
                        "Embedding backend transport error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(RagError::EmbeddingBackend(format!(
                        "Transport error: {error}"
                    )));
                }
                Err(error) => {
                    warn!("Non-retryable embedding backend error: {}", error);
                    return Err(RagError::EmbeddingBackend(format!(
                        "Request failed: {error}"
                    )));
                }
            }

            if attempt < self.retry_attempts {
                let delay = Duration::from_millis(
                    EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000,
                );
                debug!("Waiting {:?} before retry", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RagError::EmbeddingBackend("Request failed after retries".to_string())
        }))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[inline]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_results = self.embed_batch(batch).await?;
            results.extend(batch_results);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
