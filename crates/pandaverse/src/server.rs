use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use pandaverse_types::ModelCatalog;
use tower_http::timeout::TimeoutLayer;

use crate::catalog::model_catalog;
use crate::handlers;
use crate::llm::ChatRouter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub router: ChatRouter,
    pub catalog: Arc<ModelCatalog>,
}

impl AppState {
    pub fn new(router: ChatRouter) -> Self {
        let catalog = Arc::new(model_catalog(router.sentinel()));
        Self { router, catalog }
    }
}

pub fn build_app(state: AppState, request_timeout_secs: u64) -> Router {
    let api = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/models", get(handlers::list_models))
        .with_state(state);

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/version", get(handlers::version))
        .nest("/api", api)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_secs),
        ))
}
