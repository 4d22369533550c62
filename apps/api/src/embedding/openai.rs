//! OpenAI embeddings client: the single point of entry for embedding calls.
//!
//! Speaks the `/v1/embeddings` wire format, so any compatible endpoint can be
//! configured through `EMBEDDING_API_URL`.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{truncate_chars, EmbeddingError, EmbeddingProvider};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    /// Position of the corresponding input in the request.
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    max_chars: usize,
}

impl OpenAiEmbeddingClient {
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        dimensions: usize,
        max_chars: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
            model,
            dimensions,
            max_chars,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, texts: &'a [String]) -> EmbeddingRequest<'a> {
        let input = texts
            .iter()
            .map(|text| {
                let truncated = truncate_chars(text, self.max_chars);
                if truncated.len() < text.len() {
                    warn!(
                        "Text truncated from {} to {} chars",
                        text.chars().count(),
                        self.max_chars
                    );
                }
                truncated
            })
            .collect();

        // Only the text-embedding-3 family accepts a dimensions override.
        let dimensions = self
            .model
            .starts_with("text-embedding-3")
            .then_some(self.dimensions);

        EmbeddingRequest {
            model: &self.model,
            input,
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embedding = self
            .embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::MalformedResponse("no embedding returned".into()))?;
        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request_body = self.build_request(texts);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let embeddings = parse_response(&body, texts.len(), self.dimensions)?;

        debug!(
            "Generated {} embeddings in batch (model: {})",
            embeddings.len(),
            self.model
        );
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Decodes a response body and returns the vectors in input order.
fn parse_response(
    body: &str,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::MalformedResponse(format!("invalid JSON: {e}")))?;
    into_input_order(response.data, expected, dimensions)
}

/// Sorts provider results by their `index` tag. Every index in `0..expected`
/// must appear exactly once and every vector must have `dimensions` entries.
fn into_input_order(
    mut data: Vec<EmbeddingData>,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::MalformedResponse(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }

    data.sort_by_key(|d| d.index);

    data.into_iter()
        .enumerate()
        .map(|(position, item)| {
            if item.index != position {
                return Err(EmbeddingError::MalformedResponse(format!(
                    "missing or duplicate embedding index {position}"
                )));
            }
            if item.embedding.len() != dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimensions,
                    actual: item.embedding.len(),
                });
            }
            Ok(item.embedding)
        })
        .collect()
}
