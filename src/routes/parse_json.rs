//! JSON validation endpoint
//!
//! POST /api/parse-json takes `{ "jsonString": "..." }` and echoes the parsed
//! value back. Stateless; not part of the merge flow.

use axum::{body::Bytes, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseJsonRequest {
    #[serde(default)]
    json_string: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(parse_json))
}

/// POST /api/parse-json
async fn parse_json(body: Bytes) -> (StatusCode, Json<Value>) {
    match parse_json_string(&body) {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(message) => {
            tracing::debug!(error = message, "Rejected JSON string");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
        }
    }
}

fn parse_json_string(body: &[u8]) -> Result<Value, &'static str> {
    let request: ParseJsonRequest = serde_json::from_slice(body).map_err(|_| "Invalid JSON string")?;

    match request.json_string {
        Some(text) if !text.is_empty() => serde_json::from_str(&text).map_err(|_| "Invalid JSON string"),
        _ => Err("Invalid input: JSON string is required"),
    }
}
