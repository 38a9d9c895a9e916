//! Error types for the Docgen server
//!
//! Validation failures are reported to the caller verbatim. Anything that goes
//! wrong while talking to PDF Services is logged with its category and
//! collapses to a single opaque 500.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::merge::{MergeError, OutputFormat};
use crate::templates::TemplateError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

pub const MISSING_FIELDS: &str = "Invalid input: data and template are required";
pub const INVALID_DATA: &str = "Invalid input: data must be valid JSON";
pub const TEMPLATE_NOT_FOUND: &str = "Template file not found or unreadable";

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("Template file not found or unreadable: {name}")]
    TemplateNotFound {
        name: String,
        #[source]
        source: TemplateError,
    },

    #[error("Failed to merge {format} files: {source}")]
    Merge {
        format: OutputFormat,
        #[source]
        source: MergeError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::TemplateNotFound { .. } => StatusCode::BAD_REQUEST,
            AppError::Merge { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::InvalidInput(msg) => (*msg).to_string(),
            AppError::TemplateNotFound { name, source } => {
                tracing::warn!(template = %name, error = %source, "Template file not found or unreadable");
                TEMPLATE_NOT_FOUND.to_string()
            }
            AppError::Merge { format, source } => {
                tracing::error!(
                    format = %format,
                    category = source.category().as_str(),
                    error = %source,
                    "Merge failed"
                );
                format!("Failed to merge {} files", format)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
        };

        (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], message).into_response()
    }
}
