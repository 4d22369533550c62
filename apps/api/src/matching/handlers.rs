use std::num::NonZeroUsize;

use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::extract::{AppPath, AppQuery};
use crate::matching::engine::{MatchParams, ScoredMatch};
use crate::matching::service::match_query_to_pool;
use crate::models::DocumentKind;
use crate::state::AppState;

const MAX_TOP_K: usize = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Query parameters
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: f64,
}

fn default_top_k() -> usize {
    10
}

impl MatchQuery {
    pub fn into_params(self) -> Result<MatchParams, AppError> {
        let top_k = NonZeroUsize::new(self.top_k)
            .filter(|k| k.get() <= MAX_TOP_K)
            .ok_or_else(|| {
                AppError::Validation(format!("top_k must be between 1 and {MAX_TOP_K}"))
            })?;
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(AppError::Validation(
                "min_score must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(MatchParams {
            top_k,
            min_score: self.min_score,
        })
    }
}

/// Similarity rounded to four decimal places for display.
fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct JobMatch {
    pub job_id: i32,
    pub job_title: String,
    pub company: Option<String>,
    pub similarity_score: f64,
    pub match_percentage: u8,
}

#[derive(Debug, Serialize)]
pub struct ResumeMatchResponse {
    pub resume_id: i32,
    pub resume_name: String,
    pub total_jobs_compared: usize,
    pub matches: Vec<JobMatch>,
}

#[derive(Debug, Serialize)]
pub struct CandidateMatch {
    pub resume_id: i32,
    pub name: String,
    pub email: Option<String>,
    pub similarity_score: f64,
    pub match_percentage: u8,
}

#[derive(Debug, Serialize)]
pub struct JobCandidatesResponse {
    pub job_id: i32,
    pub job_title: String,
    pub total_resumes_compared: usize,
    pub total_candidates: usize,
    pub candidates: Vec<CandidateMatch>,
}

impl From<ScoredMatch> for JobMatch {
    fn from(m: ScoredMatch) -> Self {
        Self {
            job_id: m.id,
            job_title: m.title,
            company: m.subtitle,
            similarity_score: round_score(m.similarity_score),
            match_percentage: m.match_percentage,
        }
    }
}

impl From<ScoredMatch> for CandidateMatch {
    fn from(m: ScoredMatch) -> Self {
        Self {
            resume_id: m.id,
            name: m.title,
            email: m.subtitle,
            similarity_score: round_score(m.similarity_score),
            match_percentage: m.match_percentage,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/matches/resume/:id
/// Jobs ranked by similarity to the resume.
pub async fn handle_resume_matches(
    State(state): State<AppState>,
    AppPath(resume_id): AppPath<i32>,
    AppQuery(query): AppQuery<MatchQuery>,
) -> Result<Json<ResumeMatchResponse>, AppError> {
    let params = query.into_params()?;
    let report =
        match_query_to_pool(state.store.clone(), DocumentKind::Resume, resume_id, params).await?;

    Ok(Json(ResumeMatchResponse {
        resume_id,
        resume_name: report.query.title,
        total_jobs_compared: report.total_compared,
        matches: report.matches.into_iter().map(JobMatch::from).collect(),
    }))
}

/// GET /api/v1/matches/job/:id/candidates
/// Resumes ranked by similarity to the job posting.
pub async fn handle_job_candidates(
    State(state): State<AppState>,
    AppPath(job_id): AppPath<i32>,
    AppQuery(query): AppQuery<MatchQuery>,
) -> Result<Json<JobCandidatesResponse>, AppError> {
    let params = query.into_params()?;
    let report = match_query_to_pool(state.store.clone(), DocumentKind::Job, job_id, params).await?;

    let candidates: Vec<CandidateMatch> =
        report.matches.into_iter().map(CandidateMatch::from).collect();

    Ok(Json(JobCandidatesResponse {
        job_id,
        job_title: report.query.title,
        total_resumes_compared: report.total_compared,
        total_candidates: candidates.len(),
        candidates,
    }))
}
