//! Embedding Provider: turns text into fixed-length vectors.
//!
//! The provider is constructed once in `main` and injected through `AppState`
//! as `Arc<dyn EmbeddingProvider>`. Adapters make no retries and impose no
//! timeout; callers decide both.

use async_trait::async_trait;
use thiserror::Error;

pub mod openai;

/// Default character budget applied to each input before it is sent.
pub const DEFAULT_MAX_CHARS: usize = 30_000;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Expected {expected}-dimensional embeddings, provider returned {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding request timed out after {0}s")]
    TimedOut(u64),
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds many texts in one round trip. The result has one vector per input,
    /// in input order. An empty input yields an empty output without a request.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Dimensionality of every vector this provider returns.
    fn dimensions(&self) -> usize;
}

/// Cuts `text` to at most `max_chars` characters, dropping the tail.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
