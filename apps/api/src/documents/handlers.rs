use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::documents::pdf::extract_text_from_pdf;
use crate::documents::service::BackfillReport;
use crate::embedding::truncate_chars;
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::models::{Document, DocumentKind, DocumentPatch, EmbeddingStatus, NewDocument};
use crate::state::AppState;

const PREVIEW_CHARS: usize = 500;
const MAX_FIELD_CHARS: usize = 255;
const MIN_DESCRIPTION_CHARS: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Shared request/response helpers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

impl Pagination {
    fn validate(&self) -> Result<(), AppError> {
        if self.skip < 0 || self.limit < 0 {
            return Err(AppError::Validation(
                "skip and limit must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// First 500 characters, with "..." appended when the text was cut.
fn preview(text: &str) -> String {
    let cut = truncate_chars(text, PREVIEW_CHARS);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn check_length(field: &str, value: &str, min: usize, max: Option<usize>) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min {
        return Err(AppError::Validation(format!(
            "{field} must be at least {min} characters"
        )));
    }
    if let Some(max) = max.filter(|max| len > *max) {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), AppError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        });
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(format!("'{email}' is not a valid email address")));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Resumes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub has_embedding: bool,
    pub embedding_status: EmbeddingStatus,
}

impl From<&Document> for ResumeResponse {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id,
            name: d.title.clone(),
            email: d.subtitle.clone(),
            filename: d.detail.clone(),
            created_at: d.created_at,
            has_embedding: d.has_embedding(),
            embedding_status: d.embedding_status(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResumeDetail {
    #[serde(flatten)]
    pub resume: ResumeResponse,
    pub text_preview: String,
}

#[derive(Debug, Serialize)]
pub struct ResumeUploadResponse {
    pub message: String,
    pub resume: ResumeResponse,
}

#[derive(Debug, Deserialize)]
pub struct CreateResumeRequest {
    pub name: String,
    pub email: Option<String>,
    pub filename: Option<String>,
    pub raw_text: String,
}

fn validate_resume(name: &str, email: Option<&str>) -> Result<(), AppError> {
    check_length("name", name, 1, Some(MAX_FIELD_CHARS))?;
    if let Some(email) = email {
        check_email(email)?;
    }
    Ok(())
}

/// POST /api/v1/resumes/upload
/// Multipart form: `file` (PDF), `name`, optional `email`.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ResumeUploadResponse>), AppError> {
    let mut multipart = multipart?;
    let mut file: Option<(String, Bytes)> = None;
    let mut name = None;
    let mut email = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                file = Some((filename, data));
            }
            "name" | "email" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid {field_name} field: {e}")))?;
                if field_name == "name" {
                    name = Some(value);
                } else if !value.is_empty() {
                    email = Some(value);
                }
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    let name = name.ok_or_else(|| AppError::Validation("Missing 'name' field".to_string()))?;

    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::Validation("Only PDF files are supported".to_string()));
    }
    validate_resume(&name, email.as_deref())?;

    let raw_text = extract_text_from_pdf(data)
        .await
        .map_err(|e| AppError::PdfExtraction(e.to_string()))?;

    let resume = state
        .lifecycle()
        .create(NewDocument {
            kind: DocumentKind::Resume,
            title: name,
            subtitle: email,
            detail: Some(filename),
            body: raw_text,
        })
        .await?;

    info!("Uploaded resume {} ({:?})", resume.id, resume.detail);
    Ok((
        StatusCode::CREATED,
        Json(ResumeUploadResponse {
            message: "Resume uploaded and processed successfully".to_string(),
            resume: ResumeResponse::from(&resume),
        }),
    ))
}

/// POST /api/v1/resumes
/// Creates a resume from already-extracted text.
pub async fn handle_create_resume(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateResumeRequest>,
) -> Result<(StatusCode, Json<ResumeResponse>), AppError> {
    validate_resume(&req.name, req.email.as_deref())?;
    if req.raw_text.trim().is_empty() {
        return Err(AppError::Validation("raw_text must not be empty".to_string()));
    }

    let resume = state
        .lifecycle()
        .create(NewDocument {
            kind: DocumentKind::Resume,
            title: req.name,
            subtitle: req.email,
            detail: req.filename,
            body: req.raw_text,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ResumeResponse::from(&resume))))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    AppQuery(page): AppQuery<Pagination>,
) -> Result<Json<Vec<ResumeResponse>>, AppError> {
    page.validate()?;
    let resumes = state
        .store
        .list(DocumentKind::Resume, page.skip, page.limit)
        .await?;
    Ok(Json(resumes.iter().map(ResumeResponse::from).collect()))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<Json<ResumeDetail>, AppError> {
    let resume = state.lifecycle().get(DocumentKind::Resume, id).await?;
    Ok(Json(ResumeDetail {
        resume: ResumeResponse::from(&resume),
        text_preview: preview(&resume.body),
    }))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    state.lifecycle().delete(DocumentKind::Resume, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/resumes/:id/regenerate-embedding
pub async fn handle_regenerate_resume_embedding(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<Json<ResumeResponse>, AppError> {
    let resume = state
        .lifecycle()
        .regenerate_embedding(DocumentKind::Resume, id)
        .await?;
    Ok(Json(ResumeResponse::from(&resume)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Jobs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: i32,
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub has_embedding: bool,
    pub embedding_status: EmbeddingStatus,
}

impl From<&Document> for JobResponse {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id,
            title: d.title.clone(),
            company: d.subtitle.clone(),
            location: d.detail.clone(),
            description: d.body.clone(),
            created_at: d.created_at,
            has_embedding: d.has_embedding(),
            embedding_status: d.embedding_status(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: JobResponse,
    pub description_preview: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: String,
}

/// `company` and `location` accept an explicit `null`, which clears the column.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub location: Option<Option<String>>,
    pub description: Option<String>,
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn validate_job_fields(
    title: Option<&str>,
    company: Option<&str>,
    location: Option<&str>,
    description: Option<&str>,
) -> Result<(), AppError> {
    if let Some(title) = title {
        check_length("title", title, 1, Some(MAX_FIELD_CHARS))?;
    }
    if let Some(company) = company {
        check_length("company", company, 0, Some(MAX_FIELD_CHARS))?;
    }
    if let Some(location) = location {
        check_length("location", location, 0, Some(MAX_FIELD_CHARS))?;
    }
    if let Some(description) = description {
        check_length("description", description, MIN_DESCRIPTION_CHARS, None)?;
    }
    Ok(())
}

impl CreateJobRequest {
    fn validate(&self) -> Result<(), AppError> {
        validate_job_fields(
            Some(&self.title),
            self.company.as_deref(),
            self.location.as_deref(),
            Some(&self.description),
        )
    }
}

impl UpdateJobRequest {
    fn into_patch(self) -> Result<DocumentPatch, AppError> {
        validate_job_fields(
            self.title.as_deref(),
            self.company.as_ref().and_then(|c| c.as_deref()),
            self.location.as_ref().and_then(|l| l.as_deref()),
            self.description.as_deref(),
        )?;
        Ok(DocumentPatch {
            title: self.title,
            subtitle: self.company,
            detail: self.location,
            body: self.description,
        })
    }
}

/// POST /api/v1/jobs
/// The title and description are embedded for matching on the way in.
pub async fn handle_create_job(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobResponse>), AppError> {
    req.validate()?;
    let job = state
        .lifecycle()
        .create(NewDocument {
            kind: DocumentKind::Job,
            title: req.title,
            subtitle: req.company,
            detail: req.location,
            body: req.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(JobResponse::from(&job))))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    AppQuery(page): AppQuery<Pagination>,
) -> Result<Json<Vec<JobResponse>>, AppError> {
    page.validate()?;
    let jobs = state
        .store
        .list(DocumentKind::Job, page.skip, page.limit)
        .await?;
    Ok(Json(jobs.iter().map(JobResponse::from).collect()))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<Json<JobDetail>, AppError> {
    let job = state.lifecycle().get(DocumentKind::Job, id).await?;
    Ok(Json(JobDetail {
        job: JobResponse::from(&job),
        description_preview: preview(&job.body),
    }))
}

/// PATCH /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(req): AppJson<UpdateJobRequest>,
) -> Result<Json<JobResponse>, AppError> {
    let patch = req.into_patch()?;
    let lifecycle = state.lifecycle();
    let job = if patch.is_empty() {
        lifecycle.get(DocumentKind::Job, id).await?
    } else {
        lifecycle.update(DocumentKind::Job, id, patch).await?
    };
    Ok(Json(JobResponse::from(&job)))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    state.lifecycle().delete(DocumentKind::Job, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/jobs/:id/regenerate-embedding
pub async fn handle_regenerate_job_embedding(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<Json<JobResponse>, AppError> {
    let job = state
        .lifecycle()
        .regenerate_embedding(DocumentKind::Job, id)
        .await?;
    Ok(Json(JobResponse::from(&job)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding maintenance
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BackfillQuery {
    pub kind: DocumentKind,
}

/// POST /api/v1/embeddings/backfill?kind=resume|job
/// Embeds every document of `kind` whose vector is missing or stale.
pub async fn handle_backfill(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<BackfillQuery>,
) -> Result<Json<BackfillReport>, AppError> {
    let report = state
        .lifecycle()
        .backfill(query.kind, state.config.backfill_batch_size)
        .await?;
    Ok(Json(report))
}
