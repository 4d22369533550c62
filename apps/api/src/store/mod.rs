//! Document Store: persistence seam for resumes and jobs.
//!
//! `AppState` carries an `Arc<dyn DocumentStore>`. Backends enforce the
//! embedding invariant on every write: a stored vector is either absent or has
//! exactly the configured dimensionality. Each write replaces the vector in one
//! step, so readers never see a partial one.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Candidate, Document, DocumentKind, DocumentPatch, EmbeddingUpdate, NewDocument};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryDocumentStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Embedding must have {expected} dimensions, got {actual}")]
    InvalidEmbedding { expected: usize, actual: usize },
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(
        &self,
        document: NewDocument,
        embedding: Option<Vec<f32>>,
    ) -> Result<Document, StoreError>;

    async fn get(&self, kind: DocumentKind, id: i32) -> Result<Option<Document>, StoreError>;

    /// Documents ordered by id.
    async fn list(
        &self,
        kind: DocumentKind,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError>;

    /// Applies `patch` and `embedding` together. Returns `None` if the id is unknown.
    async fn update(
        &self,
        kind: DocumentKind,
        id: i32,
        patch: DocumentPatch,
        embedding: EmbeddingUpdate,
    ) -> Result<Option<Document>, StoreError>;

    /// Replaces the stored vector and clears the stale flag.
    async fn set_embedding(
        &self,
        kind: DocumentKind,
        id: i32,
        embedding: Vec<f32>,
    ) -> Result<Option<Document>, StoreError>;

    async fn delete(&self, kind: DocumentKind, id: i32) -> Result<bool, StoreError>;

    /// Every document of `kind` with an embedding, ordered by id.
    /// Documents without one are left out, never returned with a placeholder vector.
    async fn embedded_candidates(&self, kind: DocumentKind) -> Result<Vec<Candidate>, StoreError>;

    /// Documents whose embedding is missing or stale, ordered by id.
    async fn needing_embedding(
        &self,
        kind: DocumentKind,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError>;
}

/// Rejects vectors that do not have exactly `dimensions` entries.
pub fn validate_embedding(embedding: &[f32], dimensions: usize) -> Result<(), StoreError> {
    if embedding.len() != dimensions {
        return Err(StoreError::InvalidEmbedding {
            expected: dimensions,
            actual: embedding.len(),
        });
    }
    Ok(())
}
