//! Merge Routes
//!
//! Endpoints:
//! - POST /api/generate-docx - Merge `{ data, template }` into a DOCX
//! - POST /api/generate-pdf - Merge `{ data, template }` into a PDF
//! - POST /api/merge - Merge a raw payload into the default template (DOCX)

use axum::{body::Bytes, extract::State, routing::post, Router};
use serde::Deserialize;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{AppError, Result, INVALID_DATA, MISSING_FIELDS};
use crate::merge::{MergeRequest, MergeResult, OutputFormat};
use crate::state::AppState;

/// Message returned when `/api/merge` receives no payload
pub const MISSING_DATA: &str = "Invalid input: data is required";

/// Body of the generate endpoints
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub template: Option<String>,
}

/// Create the merge router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate-docx", post(generate_docx))
        .route("/generate-pdf", post(generate_pdf))
        .route("/merge", post(merge_default_template))
}

/// POST /api/generate-docx
async fn generate_docx(State(state): State<AppState>, body: Bytes) -> Result<MergeResult> {
    let request = validate_generate_request(&body, OutputFormat::Docx)?;
    run_merge(&state, request).await
}

/// POST /api/generate-pdf
async fn generate_pdf(State(state): State<AppState>, body: Bytes) -> Result<MergeResult> {
    let request = validate_generate_request(&body, OutputFormat::Pdf)?;
    run_merge(&state, request).await
}

/// POST /api/merge
///
/// Legacy single-template variant: the whole body is the merge payload and
/// the configured default template is always used.
async fn merge_default_template(State(state): State<AppState>, body: Bytes) -> Result<MergeResult> {
    let merge_data = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Null) | Err(_) => return Err(AppError::InvalidInput(MISSING_DATA)),
        Ok(value) => value,
    };

    let request = MergeRequest {
        template_name: state.config().templates.default_template.clone(),
        merge_data,
        format: OutputFormat::Docx,
    };
    run_merge(&state, request).await
}

/// Validate a generate body without touching the template store.
///
/// `data` may be a JSON value or a string holding JSON. `null`, `false`, `0`
/// and the empty string count as missing.
pub fn validate_generate_request(body: &[u8], format: OutputFormat) -> Result<MergeRequest> {
    let GenerateRequest { data, template } = serde_json::from_slice(body).unwrap_or_default();

    let template_name = match template {
        Some(name) if !name.trim().is_empty() => name,
        _ => return Err(AppError::InvalidInput(MISSING_FIELDS)),
    };

    let merge_data = match data {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {
            return Err(AppError::InvalidInput(MISSING_FIELDS))
        }
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => {
            return Err(AppError::InvalidInput(MISSING_FIELDS))
        }
        Some(Value::String(text)) if text.trim().is_empty() => {
            return Err(AppError::InvalidInput(MISSING_FIELDS))
        }
        Some(Value::String(text)) => {
            serde_json::from_str(&text).map_err(|_| AppError::InvalidInput(INVALID_DATA))?
        }
        Some(value) => value,
    };

    Ok(MergeRequest {
        template_name,
        merge_data,
        format,
    })
}

/// Open the template, then hand it to the merge service.
///
/// The template is opened before anything is sent to PDF Services, so a bad
/// name never costs an upload.
async fn run_merge(state: &AppState, request: MergeRequest) -> Result<MergeResult> {
    let span = tracing::info_span!(
        "merge",
        request_id = %Uuid::new_v4(),
        template = %request.template_name,
        format = %request.format,
    );

    async move {
        let template = state
            .templates()
            .open(&request.template_name)
            .await
            .map_err(|source| AppError::TemplateNotFound {
                name: request.template_name.clone(),
                source,
            })?;

        state
            .merge()
            .merge(template, &request)
            .await
            .map_err(|source| AppError::Merge {
                format: request.format,
                source,
            })
    }
    .instrument(span)
    .await
}
