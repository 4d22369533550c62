use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::documents::service::Lifecycle;
use crate::embedding::EmbeddingProvider;
use crate::store::DocumentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Resume and job persistence. Postgres in production, in-memory for dev and tests.
    pub store: Arc<dyn DocumentStore>,
    /// Embedding provider adapter. Constructed once at startup.
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub config: Config,
}

impl AppState {
    /// Document lifecycle operations bound to this state's store and provider.
    pub fn lifecycle(&self) -> Lifecycle<'_> {
        Lifecycle {
            store: self.store.as_ref(),
            embedder: self.embedder.as_ref(),
            timeout: Duration::from_secs(self.config.embedding_timeout_secs),
        }
    }
}
