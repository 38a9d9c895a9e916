//! Client transport
//!
//! How the merge form reaches the server.

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header;
use serde::Deserialize;

use super::download::filename_from_disposition;
use super::ClientError;
use crate::templates::TemplateInfo;

/// Raw answer of a merge endpoint
#[derive(Debug, Clone)]
pub struct MergeResponse {
    pub status: u16,
    /// Name suggested by `Content-Disposition`
    pub filename: Option<String>,
    pub body: Bytes,
}

impl MergeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Templates offered by the server
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateList {
    pub templates: Vec<TemplateInfo>,
    pub default_template: String,
}

#[async_trait]
pub trait MergeTransport: Send + Sync {
    /// POST a JSON body to `path`
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<MergeResponse, ClientError>;

    /// Fetch the template list
    async fn list_templates(&self) -> Result<TemplateList, ClientError>;
}

/// Transport over HTTP
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl MergeTransport for HttpTransport {
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<MergeResponse, ClientError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let filename = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition);
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(MergeResponse { status, filename, body })
    }

    async fn list_templates(&self) -> Result<TemplateList, ClientError> {
        let response = self
            .client
            .get(self.url("/api/templates"))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}
