//! HTTP API module - liveness and background removal endpoints

mod remove_bg;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::segment::Segmenter;
use crate::storage::StorageBackend;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub segmenter: Arc<dyn Segmenter>,
    pub storage: Arc<StorageBackend>,
}

/// Build the API router
///
/// When the local backend stores under a path-style public base, that path
/// also serves the stored files.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .merge(remove_bg::router());

    if let Some(local) = state.storage.local() {
        let base = local.public_base();
        if base.starts_with('/') && base.len() > 1 {
            info!("Serving {} at {}", local.dir().display(), base);
            router = router.nest_service(base, ServeDir::new(local.dir()));
        }
    }

    router
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Background Removal API is running!"
}

/// Health check endpoint
async fn healthz() -> &'static str {
    "ok"
}
