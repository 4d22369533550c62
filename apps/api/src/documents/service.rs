//! Document lifecycle: creation, update, deletion and embedding upkeep.
//!
//! Embedding failures are handled two ways:
//! - create/update: logged and swallowed. The document is still written,
//!   either without a vector or with its old vector flagged stale.
//! - regenerate/backfill: propagated, and the stored vector is left as it was.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::errors::AppError;
use crate::models::{
    embedding_text, Document, DocumentKind, DocumentPatch, EmbeddingUpdate, NewDocument,
};
use crate::store::DocumentStore;

/// Collaborators every lifecycle operation needs.
#[derive(Clone, Copy)]
pub struct Lifecycle<'a> {
    pub store: &'a dyn DocumentStore,
    pub embedder: &'a dyn EmbeddingProvider,
    /// Caller-side limit on each provider round trip.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    pub kind: DocumentKind,
    pub embedded: usize,
}

pub fn not_found(kind: DocumentKind, id: i32) -> AppError {
    AppError::NotFound(format!("{} {id} not found", kind.label()))
}

impl<'a> Lifecycle<'a> {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tokio::time::timeout(self.timeout, self.embedder.embed_one(text))
            .await
            .map_err(|_| EmbeddingError::TimedOut(self.timeout.as_secs()))?
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        tokio::time::timeout(self.timeout, self.embedder.embed_batch(texts))
            .await
            .map_err(|_| EmbeddingError::TimedOut(self.timeout.as_secs()))?
    }

    pub async fn get(&self, kind: DocumentKind, id: i32) -> Result<Document, AppError> {
        self.store
            .get(kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))
    }

    /// Persists a new document, embedding it on the way in when the provider is reachable.
    pub async fn create(&self, document: NewDocument) -> Result<Document, AppError> {
        let text = embedding_text(document.kind, &document.title, &document.body);

        let embedding = match self.embed_one(&text).await {
            Ok(vector) => {
                info!("Generated embedding for {}: {}", document.kind, document.title);
                Some(vector)
            }
            Err(e) => {
                // Continue without embedding; it can be regenerated later.
                error!("Failed to generate embedding: {e}");
                None
            }
        };

        Ok(self.store.insert(document, embedding).await?)
    }

    /// Applies a partial update. If the embedded text changes the vector is
    /// recomputed; when that fails the old vector is kept and flagged stale.
    pub async fn update(
        &self,
        kind: DocumentKind,
        id: i32,
        patch: DocumentPatch,
    ) -> Result<Document, AppError> {
        let current = self.get(kind, id).await?;

        let embedding = if patch.changes_embedding_text(&current) {
            let title = patch.title.as_deref().unwrap_or(&current.title);
            let body = patch.body.as_deref().unwrap_or(&current.body);
            match self.embed_one(&embedding_text(kind, title, body)).await {
                Ok(vector) => {
                    info!("Regenerated embedding for {kind} ID {id}");
                    EmbeddingUpdate::Replace(vector)
                }
                Err(e) => {
                    warn!("Failed to regenerate embedding for {kind} ID {id}, marking stale: {e}");
                    EmbeddingUpdate::MarkStale
                }
            }
        } else {
            EmbeddingUpdate::Keep
        };

        self.store
            .update(kind, id, patch, embedding)
            .await?
            .ok_or_else(|| not_found(kind, id))
    }

    pub async fn delete(&self, kind: DocumentKind, id: i32) -> Result<(), AppError> {
        if !self.store.delete(kind, id).await? {
            return Err(not_found(kind, id));
        }
        info!("Deleted {kind} {id}");
        Ok(())
    }

    /// Recomputes and overwrites the stored vector. A provider failure is
    /// returned to the caller and leaves any existing vector untouched.
    pub async fn regenerate_embedding(
        &self,
        kind: DocumentKind,
        id: i32,
    ) -> Result<Document, AppError> {
        let document = self.get(kind, id).await?;
        let vector = self.embed_one(&document.embedding_text()).await?;

        let updated = self
            .store
            .set_embedding(kind, id, vector)
            .await?
            .ok_or_else(|| not_found(kind, id))?;

        info!("Regenerated embedding for {kind} ID {id}");
        Ok(updated)
    }

    /// Embeds every document of `kind` whose vector is missing or stale,
    /// `batch_size` documents per provider call. Stops at the first failure.
    pub async fn backfill(
        &self,
        kind: DocumentKind,
        batch_size: usize,
    ) -> Result<BackfillReport, AppError> {
        let batch_size = batch_size.max(1);
        let mut embedded = 0;

        loop {
            let pending = self.store.needing_embedding(kind, batch_size as i64).await?;
            if pending.is_empty() {
                break;
            }

            let texts: Vec<String> = pending.iter().map(Document::embedding_text).collect();
            let vectors = self.embed_batch(&texts).await?;
            if vectors.len() != pending.len() {
                return Err(EmbeddingError::MalformedResponse(format!(
                    "expected {} embeddings, got {}",
                    pending.len(),
                    vectors.len()
                ))
                .into());
            }

            for (document, vector) in pending.iter().zip(vectors) {
                if self.store.set_embedding(kind, document.id, vector).await?.is_some() {
                    embedded += 1;
                }
            }

            if pending.len() < batch_size {
                break;
            }
        }

        info!("Backfilled {embedded} {kind} embeddings");
        Ok(BackfillReport { kind, embedded })
    }
}
