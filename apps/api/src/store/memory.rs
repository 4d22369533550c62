//! In-memory document store.
//!
//! Backed by `BTreeMap`s behind a `tokio::sync::RwLock`, so iteration is in id
//! order like the SQL backend. Used for `STORE_BACKEND=memory` and in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{validate_embedding, DocumentStore, StoreError};
use crate::models::{Candidate, Document, DocumentKind, DocumentPatch, EmbeddingUpdate, NewDocument};

#[derive(Debug, Default)]
struct Tables {
    next_id: i32,
    resumes: BTreeMap<i32, Document>,
    jobs: BTreeMap<i32, Document>,
}

impl Tables {
    fn table(&self, kind: DocumentKind) -> &BTreeMap<i32, Document> {
        match kind {
            DocumentKind::Resume => &self.resumes,
            DocumentKind::Job => &self.jobs,
        }
    }

    fn table_mut(&mut self, kind: DocumentKind) -> &mut BTreeMap<i32, Document> {
        match kind {
            DocumentKind::Resume => &mut self.resumes,
            DocumentKind::Job => &mut self.jobs,
        }
    }
}

#[derive(Debug)]
pub struct InMemoryDocumentStore {
    dimensions: usize,
    tables: RwLock<Tables>,
}

impl InMemoryDocumentStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            tables: RwLock::new(Tables::default()),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(
        &self,
        document: NewDocument,
        embedding: Option<Vec<f32>>,
    ) -> Result<Document, StoreError> {
        if let Some(e) = &embedding {
            validate_embedding(e, self.dimensions)?;
        }

        let mut tables = self.tables.write().await;
        tables.next_id += 1;
        let id = tables.next_id;
        let stored = Document {
            id,
            kind: document.kind,
            title: document.title,
            subtitle: document.subtitle,
            detail: document.detail,
            body: document.body,
            embedding,
            embedding_stale: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        tables.table_mut(document.kind).insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, kind: DocumentKind, id: i32) -> Result<Option<Document>, StoreError> {
        Ok(self.tables.read().await.table(kind).get(&id).cloned())
    }

    async fn list(
        &self,
        kind: DocumentKind,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .table(kind)
            .values()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        kind: DocumentKind,
        id: i32,
        patch: DocumentPatch,
        embedding: EmbeddingUpdate,
    ) -> Result<Option<Document>, StoreError> {
        if let EmbeddingUpdate::Replace(e) = &embedding {
            validate_embedding(e, self.dimensions)?;
        }

        let mut tables = self.tables.write().await;
        let Some(doc) = tables.table_mut(kind).get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            doc.title = title;
        }
        if let Some(subtitle) = patch.subtitle {
            doc.subtitle = subtitle;
        }
        if let Some(detail) = patch.detail {
            doc.detail = detail;
        }
        if let Some(body) = patch.body {
            doc.body = body;
        }
        match embedding {
            EmbeddingUpdate::Keep => {}
            EmbeddingUpdate::Replace(e) => {
                doc.embedding = Some(e);
                doc.embedding_stale = false;
            }
            EmbeddingUpdate::MarkStale => doc.embedding_stale = doc.embedding.is_some(),
        }
        doc.updated_at = Some(Utc::now());
        Ok(Some(doc.clone()))
    }

    async fn set_embedding(
        &self,
        kind: DocumentKind,
        id: i32,
        embedding: Vec<f32>,
    ) -> Result<Option<Document>, StoreError> {
        validate_embedding(&embedding, self.dimensions)?;

        let mut tables = self.tables.write().await;
        Ok(tables.table_mut(kind).get_mut(&id).map(|doc| {
            doc.embedding = Some(embedding);
            doc.embedding_stale = false;
            doc.updated_at = Some(Utc::now());
            doc.clone()
        }))
    }

    async fn delete(&self, kind: DocumentKind, id: i32) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.table_mut(kind).remove(&id).is_some())
    }

    async fn embedded_candidates(&self, kind: DocumentKind) -> Result<Vec<Candidate>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .table(kind)
            .values()
            .filter(|d| d.embedding.is_some())
            .map(Document::as_candidate)
            .collect())
    }

    async fn needing_embedding(
        &self,
        kind: DocumentKind,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .table(kind)
            .values()
            .filter(|d| d.embedding.is_none() || d.embedding_stale)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
