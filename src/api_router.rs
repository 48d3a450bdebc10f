//! Combines the per-entity routers into a unified API router.
use axum::{routing::get, Json, Router};
use std::sync::Arc;

use crate::shared::state::AppState;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::tasks::configure_tasks_routes())
        .merge(crate::users::configure_users_routes())
        .merge(crate::projects::configure_projects_routes())
        .merge(crate::tags::configure_tags_routes())
        .merge(crate::comments::configure_comments_routes())
        .route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
