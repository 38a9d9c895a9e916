//! Route modules for Docgen Server

pub mod health;
pub mod merge;
pub mod parse_json;
pub mod templates;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/health", health::router())
        .nest("/api", merge::router())
        .nest("/api/parse-json", parse_json::router())
        .nest("/api/templates", templates::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
