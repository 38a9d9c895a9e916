//! Merge Types
//!
//! Types shared by the PDF Services client, the merge service and the
//! response streamer.

use std::fmt;
use std::time::Duration;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

/// Media type of Word documents (templates and DOCX output)
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Media type of PDF output
pub const PDF_MIME: &str = "application/pdf";

/// Document format produced by a merge job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Docx,
    Pdf,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Docx, OutputFormat::Pdf];

    /// Content type of the merged document
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Docx => DOCX_MIME,
            Self::Pdf => PDF_MIME,
        }
    }

    /// File extension, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }

    /// Value of `outputFormat` in a document generation request
    pub fn api_name(self) -> &'static str {
        self.extension()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docx => f.write_str("DOCX"),
            Self::Pdf => f.write_str("PDF"),
        }
    }
}

/// Validated merge request: a template in the store plus the merge payload
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub template_name: String,
    pub merge_data: serde_json::Value,
    pub format: OutputFormat,
}

/// Asset uploaded to PDF Services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle {
    pub asset_id: String,
}

/// Document generation job submitted to PDF Services
#[derive(Debug, Clone)]
pub struct DocumentMergeJob {
    pub input: AssetHandle,
    pub merge_data: serde_json::Value,
    pub output_format: OutputFormat,
}

/// URL to poll for the status of a submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingHandle(pub String);

/// Result asset of a finished job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultAsset {
    pub asset_id: Option<String>,
    pub download_uri: String,
}

/// Status of a submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    InProgress,
    Done(ResultAsset),
    Failed(String),
}

/// Merged document ready to be sent to the caller
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub bytes: Bytes,
    pub format: OutputFormat,
    pub filename: String,
}

/// Category an error is logged under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credentials rejected or token exchange failed
    Auth,
    /// Quota or rate limit exhausted
    Usage,
    /// PDF Services answered with an error
    Api,
    /// Anything else
    Unclassified,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Usage => "usage",
            Self::Api => "api",
            Self::Unclassified => "unclassified",
        }
    }
}

/// Merge error types
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Usage limit reached: {0}")]
    Usage(String),

    #[error("PDF Services returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Merge job failed: {0}")]
    JobFailed(String),

    #[error("Merge job did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Merged document exceeds {limit} bytes")]
    OutputTooLarge { limit: usize },

    #[error("{0}")]
    Unclassified(String),
}

impl MergeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(_) => ErrorCategory::Auth,
            Self::Usage(_) => ErrorCategory::Usage,
            Self::Api { .. } | Self::JobFailed(_) => ErrorCategory::Api,
            Self::Timeout(_) | Self::OutputTooLarge { .. } | Self::Unclassified(_) => {
                ErrorCategory::Unclassified
            }
        }
    }

    /// Classify a non-success HTTP status from PDF Services
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Auth(message),
            429 => Self::Usage(message),
            _ => Self::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for MergeError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::from_status(status.as_u16(), e.to_string()),
            None => Self::Unclassified(e.to_string()),
        }
    }
}

impl From<std::io::Error> for MergeError {
    fn from(e: std::io::Error) -> Self {
        Self::Unclassified(format!("I/O error: {}", e))
    }
}
