//! Merge Module
//!
//! Document generation through Adobe PDF Services.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docgen_server::merge::{AdobePdfServices, MergeRequest, MergeService, OutputFormat};
//!
//! let provider = AdobePdfServices::new(config.pdf_services.clone())?;
//! let service = MergeService::new(Arc::new(provider), config.merge.clone());
//!
//! let template = store.open("receiptTemplate.docx").await?;
//! let result = service.merge(template, &MergeRequest {
//!     template_name: "receiptTemplate.docx".into(),
//!     merge_data: serde_json::json!({ "author": "Gary Lee" }),
//!     format: OutputFormat::Pdf,
//! }).await?;
//! ```

mod provider;
mod service;
mod stream;
mod types;

pub use provider::{AdobePdfServices, ContentStream, PdfServicesApi};
pub use service::MergeService;
pub use stream::{collect_stream, compact_timestamp, output_filename};
pub use types::{
    AssetHandle, DocumentMergeJob, ErrorCategory, JobStatus, MergeError, MergeRequest, MergeResult, OutputFormat,
    PollingHandle, ResultAsset, DOCX_MIME, PDF_MIME,
};

#[cfg(test)]
pub(crate) use provider::MockProvider;
