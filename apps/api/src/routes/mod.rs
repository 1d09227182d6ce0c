pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::preview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/previews", post(handlers::handle_create_preview))
        .route(
            "/api/v1/previews/:id",
            get(handlers::handle_get_preview).delete(handlers::handle_delete_preview),
        )
        .route(
            "/api/v1/previews/:id/document",
            put(handlers::handle_update_document),
        )
        .route("/api/v1/previews/:id/resize", post(handlers::handle_resize))
        .route("/api/v1/previews/:id/reset", post(handlers::handle_reset))
        .with_state(state)
}
