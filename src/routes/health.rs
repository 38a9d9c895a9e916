//! Health check endpoints
//!
//! Reports `degraded` when the template directory cannot be listed; every
//! merge would fail with a missing template in that state.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub templates: TemplateHealth,
}

#[derive(Debug, Serialize)]
pub struct TemplateHealth {
    pub readable: bool,
    pub count: usize,
    pub default_template_present: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let default_template = &state.config().templates.default_template;

    let templates = match state.templates().list().await {
        Ok(templates) => TemplateHealth {
            readable: true,
            count: templates.len(),
            default_template_present: templates.iter().any(|t| &t.name == default_template),
        },
        Err(e) => {
            tracing::warn!(
                dir = %state.templates().dir().display(),
                error = %e,
                "Template directory is not readable"
            );
            TemplateHealth {
                readable: false,
                count: 0,
                default_template_present: false,
            }
        }
    };

    Json(HealthResponse {
        status: if templates.readable { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        service: "docgen-server",
        templates,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}
