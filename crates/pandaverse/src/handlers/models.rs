use axum::Json;
use axum::extract::State;
use pandaverse_types::ModelCatalog;

use crate::server::AppState;

/// GET /api/models
pub async fn list_models(State(state): State<AppState>) -> Json<ModelCatalog> {
    Json(state.catalog.as_ref().clone())
}
