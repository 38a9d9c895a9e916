//! Merge Service
//!
//! Drives one document generation job through PDF Services:
//! upload the template, submit the job, poll until it resolves, then
//! buffer the result.

use std::sync::Arc;

use tokio::time::Instant;

use super::provider::PdfServicesApi;
use super::stream::collect_stream;
use super::types::{
    DocumentMergeJob, JobStatus, MergeError, MergeRequest, MergeResult, PollingHandle, ResultAsset, DOCX_MIME,
};
use crate::config::MergeConfig;
use crate::templates::TemplateFile;

/// Merge service shared by all merge endpoints
#[derive(Clone)]
pub struct MergeService {
    provider: Arc<dyn PdfServicesApi>,
    config: MergeConfig,
}

impl MergeService {
    pub fn new(provider: Arc<dyn PdfServicesApi>, config: MergeConfig) -> Self {
        Self { provider, config }
    }

    /// Merge `request.merge_data` into an already opened template.
    ///
    /// The template handle is consumed; it is closed once uploaded, or when
    /// the upload fails.
    pub async fn merge(&self, mut template: TemplateFile, request: &MergeRequest) -> Result<MergeResult, MergeError> {
        let input = self.provider.upload(&mut template, DOCX_MIME).await;
        drop(template);
        let input = input?;

        let job = DocumentMergeJob {
            input,
            merge_data: request.merge_data.clone(),
            output_format: request.format,
        };
        let polling = self.provider.submit(&job).await?;
        let asset = self.get_job_result(&polling).await?;

        let content = self.provider.get_content(&asset).await?;
        let bytes = collect_stream(content, self.config.max_output_bytes).await?;

        tracing::info!(
            template = %request.template_name,
            format = %request.format,
            size = bytes.len(),
            "Merged document"
        );

        Ok(MergeResult::new(bytes, request.format))
    }

    /// Poll a job until it is done, fails, or the poll timeout elapses
    pub async fn get_job_result(&self, polling: &PollingHandle) -> Result<ResultAsset, MergeError> {
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            polls += 1;
            match self.provider.job_status(polling).await? {
                JobStatus::Done(asset) => {
                    tracing::debug!(polls, elapsed_ms = started.elapsed().as_millis() as u64, "Job done");
                    return Ok(asset);
                }
                JobStatus::Failed(reason) => return Err(MergeError::JobFailed(reason)),
                JobStatus::InProgress => {}
            }

            if started.elapsed() + self.config.poll_interval > self.config.poll_timeout {
                return Err(MergeError::Timeout(self.config.poll_timeout));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
