//! Merge form
//!
//! Holds what the user typed (template, JSON data, attached data file) and
//! runs one download flow per output format. Each flow goes
//! `Idle -> Validating -> Submitting -> Succeeded | Failed -> Idle` and has its
//! own busy flag, so a DOCX download in flight never blocks a PDF one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use super::download::{fallback_filename, trigger_download, DownloadSink, Notification};
use super::transport::MergeTransport;
use super::{ClientError, ValidationError};
use crate::merge::OutputFormat;

/// Shortest JSON text accepted by the form
pub const MIN_JSON_LENGTH: usize = 10;

/// Endpoint used for each output format
pub fn endpoint(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Docx => "/api/generate-docx",
        OutputFormat::Pdf => "/api/generate-pdf",
    }
}

/// Raw form fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub template: String,
    pub json_text: String,
    pub attached_file: Option<PathBuf>,
}

/// Validated snapshot of the form, sent as the request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormValues {
    pub data: Value,
    pub template: String,
}

impl FormState {
    pub fn is_empty(&self) -> bool {
        self.template.trim().is_empty() && self.json_text.trim().is_empty() && self.attached_file.is_none()
    }

    pub fn validate(&self) -> Result<FormValues, ValidationError> {
        let template = self.template.trim();
        if template.is_empty() {
            return Err(ValidationError::MissingTemplate);
        }

        let text = self.json_text.trim();
        if text.chars().count() < MIN_JSON_LENGTH {
            return Err(ValidationError::MissingJson);
        }
        let data = serde_json::from_str(text).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;

        Ok(FormValues {
            data,
            template: template.to_string(),
        })
    }
}

/// Phase of one download flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

impl FlowPhase {
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Validating | Self::Submitting)
    }
}

fn slot(format: OutputFormat) -> usize {
    match format {
        OutputFormat::Docx => 0,
        OutputFormat::Pdf => 1,
    }
}

/// Merge form shared by the two download flows
pub struct MergeForm {
    state: Mutex<FormState>,
    phases: Mutex<[FlowPhase; 2]>,
    transport: Arc<dyn MergeTransport>,
    sink: Arc<dyn DownloadSink>,
}

/// Resets the flow to `Idle` however the flow ends
struct FlowGuard<'a> {
    form: &'a MergeForm,
    format: OutputFormat,
}

impl FlowGuard<'_> {
    fn enter(&self, phase: FlowPhase) {
        self.form.phases.lock()[slot(self.format)] = phase;
        tracing::debug!(format = %self.format, ?phase, "Flow phase");
    }
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        self.form.phases.lock()[slot(self.format)] = FlowPhase::Idle;
    }
}

impl MergeForm {
    pub fn new(transport: Arc<dyn MergeTransport>, sink: Arc<dyn DownloadSink>) -> Self {
        Self {
            state: Mutex::new(FormState::default()),
            phases: Mutex::new([FlowPhase::Idle; 2]),
            transport,
            sink,
        }
    }

    /// Current form fields
    pub fn snapshot(&self) -> FormState {
        self.state.lock().clone()
    }

    pub fn set_template(&self, template: impl Into<String>) {
        self.state.lock().template = template.into();
    }

    pub fn set_json_text(&self, text: impl Into<String>) {
        self.state.lock().json_text = text.into();
    }

    /// Attach a JSON data file; its content replaces the JSON text
    pub async fn attach_file(&self, path: impl AsRef<Path>) -> Result<(), ClientError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;

        let mut state = self.state.lock();
        state.json_text = text;
        state.attached_file = Some(path.to_path_buf());
        Ok(())
    }

    pub fn phase(&self, format: OutputFormat) -> FlowPhase {
        self.phases.lock()[slot(format)]
    }

    fn any_busy(&self) -> bool {
        self.phases.lock().iter().any(|phase| phase.is_busy())
    }

    /// Whether the download action for `format` is enabled
    pub fn can_submit(&self, format: OutputFormat) -> bool {
        !self.phase(format).is_busy() && self.state.lock().validate().is_ok()
    }

    /// Whether the reset action is enabled
    pub fn can_reset(&self) -> bool {
        !self.any_busy() && !self.state.lock().is_empty()
    }

    /// Clear every field, including the attached file
    pub fn reset(&self) -> Result<(), ClientError> {
        if !self.can_reset() {
            return Err(ClientError::ResetUnavailable);
        }
        *self.state.lock() = FormState::default();
        Ok(())
    }

    /// Run the download flow for `format`.
    ///
    /// An invalid form or a flow already in flight is refused before anything
    /// is sent. Once the request is sent, every outcome is reported as a
    /// notification.
    pub async fn submit(&self, format: OutputFormat) -> Result<Notification, ClientError> {
        {
            let mut phases = self.phases.lock();
            if phases[slot(format)].is_busy() {
                return Err(ClientError::Busy(format));
            }
            phases[slot(format)] = FlowPhase::Validating;
        }
        let guard = FlowGuard { form: self, format };

        let values = self.state.lock().validate()?;

        guard.enter(FlowPhase::Submitting);
        let body = serde_json::to_value(&values).map_err(|e| ClientError::Transport(e.to_string()))?;
        let outcome = self.transport.post_json(endpoint(format), &body).await;

        let notification = match outcome {
            Ok(response) if response.is_success() => {
                let filename = response
                    .filename
                    .clone()
                    .unwrap_or_else(|| fallback_filename(&values.template, format, Utc::now()));
                match trigger_download(self.sink.as_ref(), &response.body, &filename).await {
                    Ok(_) => Notification::downloaded(&filename),
                    Err(e) => Notification::error(e),
                }
            }
            Ok(response) => {
                tracing::warn!(
                    format = %format,
                    status = response.status,
                    body = %String::from_utf8_lossy(&response.body),
                    "Merge request failed"
                );
                Notification::merge_failed()
            }
            Err(e) => Notification::error(e),
        };

        guard.enter(if notification.is_success() {
            FlowPhase::Succeeded
        } else {
            FlowPhase::Failed
        });

        Ok(notification)
    }
}
