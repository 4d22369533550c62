use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::{validate_embedding, DocumentStore, StoreError};
use crate::models::{
    Candidate, Document, DocumentKind, DocumentPatch, DocumentRow, EmbeddingUpdate, NewDocument,
};

/// Column names of one document table, mapped onto the generic document fields.
struct TableSpec {
    table: &'static str,
    title: &'static str,
    subtitle: &'static str,
    detail: &'static str,
    body: &'static str,
}

const RESUMES: TableSpec = TableSpec {
    table: "resumes",
    title: "name",
    subtitle: "email",
    detail: "filename",
    body: "raw_text",
};

const JOBS: TableSpec = TableSpec {
    table: "jobs",
    title: "title",
    subtitle: "company",
    detail: "location",
    body: "description",
};

fn spec(kind: DocumentKind) -> &'static TableSpec {
    match kind {
        DocumentKind::Resume => &RESUMES,
        DocumentKind::Job => &JOBS,
    }
}

/// Splits a clearable patch field into "assign?" and the value to assign.
fn clearable(field: Option<Option<String>>) -> (bool, Option<String>) {
    match field {
        Some(value) => (true, value),
        None => (false, None),
    }
}

impl TableSpec {
    /// SELECT list producing a `DocumentRow`.
    fn columns(&self) -> String {
        format!(
            "id, {} AS title, {} AS subtitle, {} AS detail, {} AS body, \
             embedding, embedding_stale, created_at, updated_at",
            self.title, self.subtitle, self.detail, self.body
        )
    }
}

/// PostgreSQL-backed store over the `resumes` and `jobs` tables.
/// Embeddings live in a nullable `REAL[]` column.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    dimensions: usize,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, dimensions: usize) -> Self {
        Self { pool, dimensions }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(
        &self,
        document: NewDocument,
        embedding: Option<Vec<f32>>,
    ) -> Result<Document, StoreError> {
        if let Some(e) = &embedding {
            validate_embedding(e, self.dimensions)?;
        }
        let t = spec(document.kind);

        let sql = format!(
            "INSERT INTO {} ({}, {}, {}, {}, embedding) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            t.table,
            t.title,
            t.subtitle,
            t.detail,
            t.body,
            t.columns()
        );
        let row: DocumentRow = sqlx::query_as(&sql)
            .bind(&document.title)
            .bind(&document.subtitle)
            .bind(&document.detail)
            .bind(&document.body)
            .bind(embedding)
            .fetch_one(&self.pool)
            .await?;

        info!("Inserted {} {}", document.kind, row.id);
        Ok(Document::from_row(document.kind, row))
    }

    async fn get(&self, kind: DocumentKind, id: i32) -> Result<Option<Document>, StoreError> {
        let t = spec(kind);
        let sql = format!("SELECT {} FROM {} WHERE id = $1", t.columns(), t.table);
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Document::from_row(kind, r)))
    }

    async fn list(
        &self,
        kind: DocumentKind,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError> {
        let t = spec(kind);
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id OFFSET $1 LIMIT $2",
            t.columns(),
            t.table
        );
        let rows: Vec<DocumentRow> = sqlx::query_as(&sql)
            .bind(skip)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Document::from_row(kind, r))
            .collect())
    }

    async fn update(
        &self,
        kind: DocumentKind,
        id: i32,
        patch: DocumentPatch,
        embedding: EmbeddingUpdate,
    ) -> Result<Option<Document>, StoreError> {
        let (replace, new_embedding, mark_stale) = match embedding {
            EmbeddingUpdate::Keep => (false, None, false),
            EmbeddingUpdate::Replace(e) => {
                validate_embedding(&e, self.dimensions)?;
                (true, Some(e), false)
            }
            EmbeddingUpdate::MarkStale => (false, None, true),
        };
        let (set_subtitle, subtitle) = clearable(patch.subtitle);
        let (set_detail, detail) = clearable(patch.detail);
        let t = spec(kind);

        // Single statement: the vector and its stale flag change together.
        let sql = format!(
            r#"
            UPDATE {table} SET
                {title} = COALESCE($2, {title}),
                {subtitle} = CASE WHEN $9 THEN $3::varchar ELSE {subtitle} END,
                {detail} = CASE WHEN $10 THEN $4::varchar ELSE {detail} END,
                {body} = COALESCE($5, {body}),
                embedding = CASE WHEN $6 THEN $7::real[] ELSE embedding END,
                embedding_stale = CASE
                    WHEN $6 THEN FALSE
                    WHEN $8 THEN embedding IS NOT NULL
                    ELSE embedding_stale
                END,
                updated_at = now()
            WHERE id = $1
            RETURNING {columns}
            "#,
            table = t.table,
            title = t.title,
            subtitle = t.subtitle,
            detail = t.detail,
            body = t.body,
            columns = t.columns(),
        );
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(patch.title)
            .bind(subtitle)
            .bind(detail)
            .bind(patch.body)
            .bind(replace)
            .bind(new_embedding)
            .bind(mark_stale)
            .bind(set_subtitle)
            .bind(set_detail)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Document::from_row(kind, r)))
    }

    async fn set_embedding(
        &self,
        kind: DocumentKind,
        id: i32,
        embedding: Vec<f32>,
    ) -> Result<Option<Document>, StoreError> {
        validate_embedding(&embedding, self.dimensions)?;
        let t = spec(kind);
        let sql = format!(
            "UPDATE {} SET embedding = $2, embedding_stale = FALSE, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            t.table,
            t.columns()
        );
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(embedding)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Document::from_row(kind, r)))
    }

    async fn delete(&self, kind: DocumentKind, id: i32) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", spec(kind).table);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn embedded_candidates(&self, kind: DocumentKind) -> Result<Vec<Candidate>, StoreError> {
        let t = spec(kind);
        let sql = format!(
            "SELECT id, {}, {}, embedding FROM {} WHERE embedding IS NOT NULL ORDER BY id",
            t.title, t.subtitle, t.table
        );
        let rows: Vec<(i32, String, Option<String>, Vec<f32>)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(id, title, subtitle, embedding)| Candidate {
                id,
                title,
                subtitle,
                embedding: Some(embedding),
            })
            .collect())
    }

    async fn needing_embedding(
        &self,
        kind: DocumentKind,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError> {
        let t = spec(kind);
        let sql = format!(
            "SELECT {} FROM {} WHERE embedding IS NULL OR embedding_stale ORDER BY id LIMIT $1",
            t.columns(),
            t.table
        );
        let rows: Vec<DocumentRow> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Document::from_row(kind, r))
            .collect())
    }
}
