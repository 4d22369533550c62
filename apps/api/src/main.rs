mod config;
mod db;
mod documents;
mod embedding;
mod errors;
mod extract;
mod matching;
mod models;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::embedding::openai::OpenAiEmbeddingClient;
use crate::embedding::EmbeddingProvider;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{DocumentStore, InMemoryDocumentStore, PgDocumentStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Matcher API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn DocumentStore> = match &config.store {
        StoreBackend::Postgres { database_url } => {
            let db = create_pool(database_url).await?;
            Arc::new(PgDocumentStore::new(db, config.embedding_dimensions))
        }
        StoreBackend::Memory => {
            info!("Using in-memory document store; data is lost on restart");
            Arc::new(InMemoryDocumentStore::new(config.embedding_dimensions))
        }
    };

    let embedder = OpenAiEmbeddingClient::new(
        config.embedding_api_url.clone(),
        config.openai_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_dimensions,
        config.embedding_max_chars,
    );
    info!(
        "Embedding client initialized (model: {}, {} dimensions)",
        embedder.model(),
        embedder.dimensions()
    );

    let state = AppState {
        store,
        embedder: Arc::new(embedder),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
