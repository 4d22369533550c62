pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::documents::handlers as documents;
use crate::matching::handlers as matches;
use crate::state::AppState;

/// Upper bound on request bodies, sized for resume PDFs.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        // Resumes
        .route(
            "/api/v1/resumes",
            get(documents::handle_list_resumes).post(documents::handle_create_resume),
        )
        .route(
            "/api/v1/resumes/upload",
            post(documents::handle_upload_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(documents::handle_get_resume).delete(documents::handle_delete_resume),
        )
        .route(
            "/api/v1/resumes/:id/regenerate-embedding",
            post(documents::handle_regenerate_resume_embedding),
        )
        // Jobs
        .route(
            "/api/v1/jobs",
            get(documents::handle_list_jobs).post(documents::handle_create_job),
        )
        .route(
            "/api/v1/jobs/:id",
            get(documents::handle_get_job)
                .patch(documents::handle_update_job)
                .delete(documents::handle_delete_job),
        )
        .route(
            "/api/v1/jobs/:id/regenerate-embedding",
            post(documents::handle_regenerate_job_embedding),
        )
        // Matches
        .route(
            "/api/v1/matches/resume/:id",
            get(matches::handle_resume_matches),
        )
        .route(
            "/api/v1/matches/job/:id/candidates",
            get(matches::handle_job_candidates),
        )
        // Embedding maintenance
        .route(
            "/api/v1/embeddings/backfill",
            post(documents::handle_backfill),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::embedding::testing::StubEmbedder;
    use crate::store::InMemoryDocumentStore;

    const DIMS: usize = 8;

    fn test_app() -> (Router, Arc<StubEmbedder>) {
        let config = Config::from_lookup(|key: &str| match key {
            "STORE_BACKEND" => Some("memory".to_string()),
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "EMBEDDING_DIMENSIONS" => Some(DIMS.to_string()),
            "BACKFILL_BATCH_SIZE" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();
        let embedder = Arc::new(StubEmbedder::new(DIMS));
        let state = AppState {
            store: Arc::new(InMemoryDocumentStore::new(DIMS)),
            embedder: embedder.clone(),
            config,
        };
        (build_router(state), embedder)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_job(app: &Router, title: &str, description: &str) -> i64 {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/jobs",
            Some(json!({ "title": title, "company": "Acme", "description": description })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    async fn create_resume(app: &Router, name: &str, raw_text: &str) -> i64 {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/resumes",
            Some(json!({ "name": name, "email": "ada@example.com", "raw_text": raw_text })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    fn multipart_upload(filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            b"--BOUNDARY\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAda Lovelace\r\n",
        );
        let disposition =
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"");
        body.extend_from_slice(
            format!(
                "--BOUNDARY\r\n{disposition}\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n--BOUNDARY--\r\n");

        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/resumes/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["health"], "/health");
    }

    #[tokio::test]
    async fn test_resume_matches_end_to_end() {
        let (app, _) = test_app();
        let resume_id = create_resume(&app, "Ada", "Rust services and PostgreSQL").await;
        create_job(&app, "Backend Engineer", "Rust services and PostgreSQL").await;
        create_job(&app, "Florist", "Arrange flowers for weddings").await;

        let uri = format!("/api/v1/matches/resume/{resume_id}?top_k=5");
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["resume_name"], "Ada");
        assert_eq!(body["total_jobs_compared"], 2);

        let matches = body["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 2);
        let first = matches[0]["similarity_score"].as_f64().unwrap();
        let second = matches[1]["similarity_score"].as_f64().unwrap();
        assert!(first >= second);
        assert_eq!(matches[0]["company"], "Acme");
        assert!(matches[0]["match_percentage"].as_u64().unwrap() <= 100);
    }

    #[tokio::test]
    async fn test_job_candidates_shape() {
        let (app, _) = test_app();
        create_resume(&app, "Ada", "Analytical engines").await;
        let job_id = create_job(&app, "Mathematician", "Analytical engines and notes").await;

        let uri = format!("/api/v1/matches/job/{job_id}/candidates?min_score=0.0");
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["job_title"], "Mathematician");
        assert_eq!(body["total_resumes_compared"], 1);
        assert_eq!(body["total_candidates"], 1);
        assert_eq!(body["candidates"][0]["name"], "Ada");
        assert_eq!(body["candidates"][0]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn test_match_errors_are_distinct() {
        let (app, embedder) = test_app();

        let (status, body) = send(&app, Method::GET, "/api/v1/matches/resume/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        embedder.set_failing(true);
        let resume_id = create_resume(&app, "Ada", "Analytical engines").await;
        embedder.set_failing(false);

        let uri = format!("/api/v1/matches/resume/{resume_id}");
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "NO_EMBEDDING");

        let uri = format!("/api/v1/matches/resume/{resume_id}?top_k=0");
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_regenerate_then_match() {
        let (app, embedder) = test_app();
        embedder.set_failing(true);
        let resume_id = create_resume(&app, "Ada", "Analytical engines").await;

        let uri = format!("/api/v1/resumes/{resume_id}/regenerate-embedding");
        let (status, body) = send(&app, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "EMBEDDING_ERROR");

        embedder.set_failing(false);
        let (status, body) = send(&app, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["has_embedding"], true);
        assert_eq!(body["embedding_status"], "ready");

        let uri = format!("/api/v1/matches/resume/{resume_id}");
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_jobs_compared"], 0);
    }

    #[tokio::test]
    async fn test_job_crud() {
        let (app, embedder) = test_app();
        let job_id = create_job(&app, "Engineer", "Build fast things").await;

        let uri = format!("/api/v1/jobs/{job_id}");
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description_preview"], "Build fast things");
        assert_eq!(body["embedding_status"], "ready");

        embedder.set_failing(true);
        let (status, body) = send(
            &app,
            Method::PATCH,
            &uri,
            Some(json!({ "description": "Maintain slow things" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], "Maintain slow things");
        assert_eq!(body["has_embedding"], true);
        assert_eq!(body["embedding_status"], "stale");

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_job_validation_rejected() {
        let (app, embedder) = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/jobs",
            Some(json!({ "title": "Engineer", "description": "short" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_patch_null_clears_company_without_reembedding() {
        let (app, embedder) = test_app();
        let job_id = create_job(&app, "Engineer", "Build fast things").await;
        let calls = embedder.calls();

        let uri = format!("/api/v1/jobs/{job_id}");
        let patch = Some(json!({ "company": null }));
        let (status, body) = send(&app, Method::PATCH, &uri, patch).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["company"], Value::Null);
        assert_eq!(body["title"], "Engineer");
        assert_eq!(body["embedding_status"], "ready");
        assert_eq!(embedder.calls(), calls);

        let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["company"], Value::Null);
    }

    #[tokio::test]
    async fn test_malformed_requests_use_error_envelope() {
        let (app, embedder) = test_app();
        let resume_id = create_resume(&app, "Ada", "Analytical engines").await;

        let uri = format!("/api/v1/matches/resume/{resume_id}?top_k=abc");
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send(&app, Method::GET, "/api/v1/jobs/not-a-number", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let calls = embedder.calls();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/jobs",
            Some(json!({ "title": "Engineer" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"].as_str().unwrap().contains("description"));
        assert_eq!(embedder.calls(), calls);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/resumes/upload")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_list_and_resume_detail() {
        let (app, _) = test_app();
        let long_text = "x".repeat(600);
        let id = create_resume(&app, "Ada", &long_text).await;
        create_resume(&app, "Grace", "Compilers").await;

        let uri = "/api/v1/resumes?skip=1&limit=10";
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let listed = body.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["name"], "Grace");

        let (status, body) = send(&app, Method::GET, &format!("/api/v1/resumes/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let preview = body["text_preview"].as_str().unwrap();
        assert_eq!(preview.len(), 503);
        assert!(preview.ends_with("..."));
    }

    #[tokio::test]
    async fn test_backfill_endpoint() {
        let (app, embedder) = test_app();
        embedder.set_failing(true);
        for i in 0..3 {
            create_job(&app, &format!("Job {i}"), "Describe the work here").await;
        }
        embedder.set_failing(false);

        let uri = "/api/v1/embeddings/backfill?kind=job";
        let (status, body) = send(&app, Method::POST, uri, None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["kind"], "job");
        assert_eq!(body["embedded"], 3);

        let (_, body) = send(&app, Method::GET, "/api/v1/jobs", None).await;
        assert!(body
            .as_array()
            .unwrap()
            .iter()
            .all(|j| j["embedding_status"] == "ready"));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf_filename() {
        let (app, _) = test_app();
        let response = app
            .clone()
            .oneshot(multipart_upload("resume.docx", b"hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["message"], "Only PDF files are supported");
    }

    #[tokio::test]
    async fn test_upload_rejects_unreadable_pdf() {
        let (app, _) = test_app();
        let response = app
            .clone()
            .oneshot(multipart_upload("resume.pdf", b"not really a pdf"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "PDF_EXTRACTION_ERROR");
    }
}
