//! Client Module
//!
//! The merge form as seen from the user's side: pick a template, provide JSON
//! data, download the merged DOCX and/or PDF.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docgen_server::client::{DirectorySink, HttpTransport, MergeForm};
//! use docgen_server::merge::OutputFormat;
//!
//! let form = MergeForm::new(
//!     Arc::new(HttpTransport::new("http://localhost:3000")),
//!     Arc::new(DirectorySink::new("downloads")),
//! );
//! form.set_template("receiptTemplate.docx");
//! form.attach_file("invoice.json").await?;
//!
//! let (docx, pdf) = tokio::join!(
//!     form.submit(OutputFormat::Docx),
//!     form.submit(OutputFormat::Pdf),
//! );
//! ```

mod download;
mod form;
mod transport;

pub use download::{
    fallback_filename, filename_from_disposition, trigger_download, DirectorySink, DownloadSink, Notification,
};
pub use form::{endpoint, FlowPhase, FormState, FormValues, MergeForm, MIN_JSON_LENGTH};
pub use transport::{HttpTransport, MergeResponse, MergeTransport, TemplateList};

use crate::merge::OutputFormat;

/// Reasons the form refuses to submit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("A template must be selected")]
    MissingTemplate,

    #[error("Sample JSON data is required")]
    MissingJson,

    #[error("Sample JSON data is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Client error types
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("A {0} download is already in progress")]
    Busy(OutputFormat),

    #[error("Nothing to reset, or a download is in progress")]
    ResetUnavailable,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::config::{Config, MergeConfig, PdfServicesConfig, ServerConfig, TemplateConfig};
    use crate::merge::MockProvider;
    use crate::state::AppState;

    /// Serve the real router, backed by the in-memory provider, on a local port
    async fn spawn_server(dir: &TempDir) -> String {
        let config = Config {
            server: ServerConfig::default(),
            templates: TemplateConfig {
                dir: dir.path().to_path_buf(),
                default_template: "receiptTemplate.docx".to_string(),
            },
            pdf_services: PdfServicesConfig {
                base_url: "http://localhost:0".to_string(),
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                organization_id: "org".to_string(),
                http_timeout: Duration::from_secs(1),
            },
            merge: MergeConfig::default(),
        };
        let provider = Arc::new(MockProvider::new(vec![&b"merged "[..], &b"document"[..]]));
        let app = crate::routes::app(AppState::with_provider(config, provider));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_form_against_server() {
        let templates = TempDir::new().unwrap();
        std::fs::write(templates.path().join("receiptTemplate.docx"), b"PK").unwrap();
        let downloads = TempDir::new().unwrap();
        let base_url = spawn_server(&templates).await;

        let transport = Arc::new(HttpTransport::new(&base_url));
        let list = transport.list_templates().await.unwrap();
        assert_eq!(list.default_template, "receiptTemplate.docx");
        assert_eq!(list.templates.len(), 1);

        let form = MergeForm::new(transport, Arc::new(DirectorySink::new(downloads.path())));
        form.set_template("receiptTemplate.docx");
        form.set_json_text(r#"{ "author": "A", "tax": 5 }"#);

        let (docx, pdf) = tokio::join!(form.submit(OutputFormat::Docx), form.submit(OutputFormat::Pdf));
        let (docx, pdf) = (docx.unwrap(), pdf.unwrap());
        assert!(docx.is_success(), "{}", docx);
        assert!(pdf.is_success(), "{}", pdf);

        let mut saved: Vec<_> = std::fs::read_dir(downloads.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        saved.sort();
        assert_eq!(saved.len(), 2);
        for path in &saved {
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("mergedOutput_"), "{}", name);
            assert_eq!(std::fs::read(path).unwrap(), b"merged document");
        }

        form.set_template("missing.docx");
        let notification = form.submit(OutputFormat::Pdf).await.unwrap();
        assert_eq!(notification, Notification::merge_failed());
    }
}
