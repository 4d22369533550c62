use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The two document pools. Each kind is matched against the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    Job,
}

impl DocumentKind {
    /// The pool a document of this kind is ranked against.
    pub fn opposite(self) -> Self {
        match self {
            DocumentKind::Resume => DocumentKind::Job,
            DocumentKind::Job => DocumentKind::Resume,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::Job => "job",
        }
    }

    /// Human label used in error messages ("Resume 4 not found").
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Resume => "Resume",
            DocumentKind::Job => "Job",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable embedding state of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Ready,
    /// No vector stored; the document cannot be used as a match query.
    Missing,
    /// A vector is stored but was computed from text that has since changed.
    Stale,
}

/// Row shape shared by the `resumes` and `jobs` tables once their columns are
/// aliased to the generic names.
///
/// resumes: name → title, email → subtitle, filename → detail, raw_text → body.
/// jobs: title, company → subtitle, location → detail, description → body.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: i32,
    pub title: String,
    pub subtitle: Option<String>,
    pub detail: Option<String>,
    pub body: String,
    pub embedding: Option<Vec<f32>>,
    pub embedding_stale: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: i32,
    pub kind: DocumentKind,
    pub title: String,
    pub subtitle: Option<String>,
    pub detail: Option<String>,
    pub body: String,
    pub embedding: Option<Vec<f32>>,
    pub embedding_stale: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn from_row(kind: DocumentKind, row: DocumentRow) -> Self {
        Self {
            id: row.id,
            kind,
            title: row.title,
            subtitle: row.subtitle,
            detail: row.detail,
            body: row.body,
            embedding: row.embedding,
            embedding_stale: row.embedding_stale,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn embedding_status(&self) -> EmbeddingStatus {
        match (&self.embedding, self.embedding_stale) {
            (None, _) => EmbeddingStatus::Missing,
            (Some(_), true) => EmbeddingStatus::Stale,
            (Some(_), false) => EmbeddingStatus::Ready,
        }
    }

    pub fn embedding_text(&self) -> String {
        embedding_text(self.kind, &self.title, &self.body)
    }

    pub fn as_candidate(&self) -> Candidate {
        Candidate {
            id: self.id,
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            embedding: self.embedding.clone(),
        }
    }
}

/// Text sent to the embedding provider for a document.
/// Jobs embed their title above the description; resumes embed the raw text only.
pub fn embedding_text(kind: DocumentKind, title: &str, body: &str) -> String {
    match kind {
        DocumentKind::Resume => body.to_string(),
        DocumentKind::Job => format!("{title}\n\n{body}"),
    }
}

/// Fields for a new document. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub kind: DocumentKind,
    pub title: String,
    pub subtitle: Option<String>,
    pub detail: Option<String>,
    pub body: String,
}

/// Partial update; `None` leaves the field unchanged.
///
/// The optional columns take a nested option: `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub subtitle: Option<Option<String>>,
    pub detail: Option<Option<String>>,
    pub body: Option<String>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.subtitle.is_none()
            && self.detail.is_none()
            && self.body.is_none()
    }

    /// Whether applying this patch changes the text the embedding is computed from.
    pub fn changes_embedding_text(&self, current: &Document) -> bool {
        let body_changed = self.body.as_ref().is_some_and(|b| *b != current.body);
        let title_changed = self.title.as_ref().is_some_and(|t| *t != current.title);
        match current.kind {
            DocumentKind::Resume => body_changed,
            DocumentKind::Job => body_changed || title_changed,
        }
    }
}

/// What an update does to the stored embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingUpdate {
    Keep,
    Replace(Vec<f32>),
    /// Keep the stored vector but flag it as computed from outdated text.
    MarkStale,
}

/// A member of a candidate pool, as handed to the matching engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: i32,
    pub title: String,
    pub subtitle: Option<String>,
    pub embedding: Option<Vec<f32>>,
}
