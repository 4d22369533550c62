//! Matching Engine: ranks a candidate pool against one query embedding.
//!
//! Algorithm (single pass, stateless per call):
//! 1. Reject a query without an embedding (`MatchError::NoEmbedding`).
//! 2. Score every candidate that carries an embedding; the rest are skipped and
//!    not counted in `total_compared`.
//! 3. Keep scores `>= min_score`.
//! 4. Stable sort descending, so equal scores keep pool order.
//! 5. Truncate to `top_k` and attach `match_percentage`.
//!
//! The scan is a full O(n) pass plus an O(n log n) sort. An index-backed scan
//! can replace `score_pool` as long as ties, the inclusive threshold and the
//! truncation rule stay as they are.

use std::num::NonZeroUsize;

use thiserror::Error;
use tracing::debug;

use crate::matching::similarity::{cosine_similarity, match_percentage};
use crate::models::{Candidate, DocumentKind};

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("{} {id} has no embedding. Please regenerate it.", .kind.label())]
    NoEmbedding { kind: DocumentKind, id: i32 },

    #[error("candidate {candidate_id} has {actual} dimensions, query has {expected}")]
    DimensionMismatch {
        candidate_id: i32,
        expected: usize,
        actual: usize,
    },
}

/// Identifies the query document so failures can name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRef {
    pub kind: DocumentKind,
    pub id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub top_k: NonZeroUsize,
    /// Inclusive lower bound on similarity.
    pub min_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub id: i32,
    pub title: String,
    pub subtitle: Option<String>,
    pub similarity_score: f64,
    pub match_percentage: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Candidates that had an embedding and were scored, before filtering and truncation.
    pub total_compared: usize,
    pub matches: Vec<ScoredMatch>,
}

pub fn find_matches(
    query: QueryRef,
    query_embedding: Option<&[f32]>,
    pool: &[Candidate],
    params: MatchParams,
) -> Result<MatchOutcome, MatchError> {
    let query_embedding = query_embedding.ok_or(MatchError::NoEmbedding {
        kind: query.kind,
        id: query.id,
    })?;

    let (total_compared, mut scored) = score_pool(query_embedding, pool)?;

    scored.retain(|(_, score)| *score >= params.min_score);
    // `sort_by` is stable: equal scores keep their pool order.
    scored.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    scored.truncate(params.top_k.get());

    let matches: Vec<ScoredMatch> = scored
        .into_iter()
        .map(|(candidate, score)| ScoredMatch {
            id: candidate.id,
            title: candidate.title.clone(),
            subtitle: candidate.subtitle.clone(),
            similarity_score: score,
            match_percentage: match_percentage(score),
        })
        .collect();

    debug!(
        "Matched {} {}: {} compared, {} returned",
        query.kind,
        query.id,
        total_compared,
        matches.len()
    );

    Ok(MatchOutcome {
        total_compared,
        matches,
    })
}

/// Scores every candidate with an embedding, in pool order.
fn score_pool<'a>(
    query: &[f32],
    pool: &'a [Candidate],
) -> Result<(usize, Vec<(&'a Candidate, f64)>), MatchError> {
    let mut scored = Vec::with_capacity(pool.len());
    for candidate in pool {
        let Some(embedding) = candidate.embedding.as_deref() else {
            continue;
        };
        let score =
            cosine_similarity(query, embedding).map_err(|e| MatchError::DimensionMismatch {
                candidate_id: candidate.id,
                expected: e.left,
                actual: e.right,
            })?;
        scored.push((candidate, score));
    }
    Ok((scored.len(), scored))
}
