//! Template listing route
//!
//! Feeds the template picker of the client form.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::templates::TemplateInfo;

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<TemplateInfo>,
    pub default_template: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_templates))
}

/// GET /api/templates
async fn list_templates(State(state): State<AppState>) -> Result<Json<TemplateListResponse>> {
    let templates = state.templates().list().await.map_err(|e| {
        AppError::Internal(format!(
            "Failed to list templates in {}: {}",
            state.templates().dir().display(),
            e
        ))
    })?;

    Ok(Json(TemplateListResponse {
        templates,
        default_template: state.config().templates.default_template.clone(),
    }))
}
