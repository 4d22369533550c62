use std::sync::Arc;

use tracing::info;

use crate::documents::service::not_found;
use crate::errors::AppError;
use crate::matching::engine::{find_matches, MatchParams, QueryRef, ScoredMatch};
use crate::models::{Document, DocumentKind};
use crate::store::DocumentStore;

/// Result of ranking one stored document against the opposite pool.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub query: Document,
    pub total_compared: usize,
    pub matches: Vec<ScoredMatch>,
}

/// Loads the query document and every embedded document of the opposite kind,
/// then ranks them. Scoring runs on the blocking pool since it is a CPU-bound scan.
pub async fn match_query_to_pool(
    store: Arc<dyn DocumentStore>,
    kind: DocumentKind,
    id: i32,
    params: MatchParams,
) -> Result<MatchReport, AppError> {
    let query = store.get(kind, id).await?.ok_or_else(|| not_found(kind, id))?;
    let pool = store.embedded_candidates(kind.opposite()).await?;

    let query_ref = QueryRef { kind, id };
    let embedding = query.embedding.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        find_matches(query_ref, embedding.as_deref(), &pool, params)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Matching task failed: {e}")))??;

    info!(
        "Found {} matches for {kind} {id} ({} compared)",
        outcome.matches.len(),
        outcome.total_compared
    );

    Ok(MatchReport {
        query,
        total_compared: outcome.total_compared,
        matches: outcome.matches,
    })
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::models::NewDocument;
    use crate::store::InMemoryDocumentStore;

    fn params(top_k: usize, min_score: f64) -> MatchParams {
        MatchParams {
            top_k: NonZeroUsize::new(top_k).unwrap(),
            min_score,
        }
    }

    fn doc(kind: DocumentKind, title: &str) -> NewDocument {
        NewDocument {
            kind,
            title: title.to_string(),
            subtitle: None,
            detail: None,
            body: format!("{title} body text"),
        }
    }

    async fn seeded() -> (Arc<dyn DocumentStore>, i32) {
        let store = InMemoryDocumentStore::new(2);
        let resume = store
            .insert(doc(DocumentKind::Resume, "Ada"), Some(vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(doc(DocumentKind::Job, "Aligned"), Some(vec![2.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(doc(DocumentKind::Job, "Unembedded"), None)
            .await
            .unwrap();
        store
            .insert(doc(DocumentKind::Job, "Diagonal"), Some(vec![1.0, 1.0]))
            .await
            .unwrap();
        store
            .insert(doc(DocumentKind::Job, "Orthogonal"), Some(vec![0.0, 1.0]))
            .await
            .unwrap();
        (Arc::new(store), resume.id)
    }

    #[tokio::test]
    async fn test_resume_ranked_against_jobs() {
        let (store, resume_id) = seeded().await;
        let report = match_query_to_pool(store, DocumentKind::Resume, resume_id, params(10, 0.0))
            .await
            .unwrap();

        assert_eq!(report.query.title, "Ada");
        assert_eq!(report.total_compared, 3);
        let titles: Vec<_> = report.matches.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Aligned", "Diagonal", "Orthogonal"]);
        assert_eq!(report.matches[0].match_percentage, 100);
        assert_eq!(report.matches[1].match_percentage, 71);
    }

    #[tokio::test]
    async fn test_threshold_and_top_k() {
        let (store, resume_id) = seeded().await;
        let report = match_query_to_pool(store, DocumentKind::Resume, resume_id, params(1, 0.5))
            .await
            .unwrap();
        assert_eq!(report.total_compared, 3);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].title, "Aligned");
    }

    #[tokio::test]
    async fn test_job_query_without_embedding() {
        let (store, _) = seeded().await;
        let unembedded = store
            .list(DocumentKind::Job, 0, 10)
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.title == "Unembedded")
            .unwrap();

        let err = match_query_to_pool(store, DocumentKind::Job, unembedded.id, params(10, 0.0))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, AppError::NoEmbedding(msg) if msg.contains("regenerate")),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn test_unknown_query_is_not_found() {
        let (store, _) = seeded().await;
        let err = match_query_to_pool(store, DocumentKind::Resume, 404, params(10, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_opposite_pool() {
        let store = InMemoryDocumentStore::new(2);
        let job = store
            .insert(doc(DocumentKind::Job, "Lonely"), Some(vec![1.0, 0.0]))
            .await
            .unwrap();
        let report = match_query_to_pool(Arc::new(store), DocumentKind::Job, job.id, params(5, 0.0))
            .await
            .unwrap();
        assert_eq!(report.total_compared, 0);
        assert!(report.matches.is_empty());
    }
}
