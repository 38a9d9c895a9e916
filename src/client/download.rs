//! Downloads and notifications
//!
//! `trigger_download` hands a merged document to a [`DownloadSink`]; the
//! outcome of each flow is reported as a [`Notification`].

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::merge::{compact_timestamp, OutputFormat};

/// Destination for downloaded documents
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Store `bytes` under `filename` and return where it ended up
    async fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Writes downloads into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// Hand a downloaded document to the sink.
///
/// Only the final component of `filename` is used, so a server-provided name
/// cannot point outside the sink.
pub async fn trigger_download(sink: &dyn DownloadSink, bytes: &[u8], filename: &str) -> io::Result<PathBuf> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid file name: {:?}", filename)))?;

    let path = sink.save(name, bytes).await?;
    tracing::info!(path = %path.display(), size = bytes.len(), "Downloaded merged document");
    Ok(path)
}

/// Download name used when the server does not suggest one:
/// `MergedOutput_<template>_<date>_<timestamp>.<ext>`
pub fn fallback_filename(template: &str, format: OutputFormat, now: DateTime<Utc>) -> String {
    let stem = Path::new(template)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.split_whitespace().collect::<String>())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "Template".to_string());

    format!(
        "MergedOutput_{}_{}_{}.{}",
        stem,
        now.format("%Y-%m-%d"),
        compact_timestamp(now),
        format.extension()
    )
}

/// Extract `filename="..."` from a `Content-Disposition` header value
pub fn filename_from_disposition(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        let name = part.strip_prefix("filename=")?;
        let name = name.trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// Toast-style outcome of a download flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success { title: String, description: String },
    Error { title: String, description: String },
}

impl Notification {
    pub fn downloaded(filename: &str) -> Self {
        Self::Success {
            title: "File downloaded successfully!".to_string(),
            description: format!("Your file has been downloaded as {}.", filename),
        }
    }

    pub fn merge_failed() -> Self {
        Self::Error {
            title: "Error".to_string(),
            description: "Failed to merge files.".to_string(),
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::Error {
            title: "Error".to_string(),
            description: format!("An error occurred: {}", message),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Success { description, .. } | Self::Error { description, .. } => description,
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { title, description } | Self::Error { title, description } => {
                write!(f, "{} {}", title, description)
            }
        }
    }
}

/// Sink that keeps downloads in memory
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub files: parking_lot::Mutex<Vec<(String, Vec<u8>)>>,
}

#[cfg(test)]
#[async_trait]
impl DownloadSink for MemorySink {
    async fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        self.files.lock().push((filename.to_string(), bytes.to_vec()));
        Ok(PathBuf::from(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_trigger_download_strips_directories() {
        let sink = MemorySink::default();

        trigger_download(&sink, b"%PDF", "../../etc/mergedOutput_1.pdf").await.unwrap();
        assert_eq!(sink.files.lock()[0].0, "mergedOutput_1.pdf");
        assert_eq!(sink.files.lock()[0].1, b"%PDF");

        assert!(trigger_download(&sink, b"%PDF", "..").await.is_err());
        assert!(trigger_download(&sink, b"%PDF", "").await.is_err());
    }

    #[tokio::test]
    async fn test_directory_sink() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path().join("downloads"));

        let path = trigger_download(&sink, b"docx", "out.docx").await.unwrap();
        assert_eq!(path, dir.path().join("downloads").join("out.docx"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"docx");
    }

    // Saving must not park the runtime thread: a single-threaded runtime
    // keeps driving other tasks while a large download is written.
    #[tokio::test]
    async fn test_directory_sink_yields_to_other_tasks() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path());
        let ticks = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let ticker = tokio::spawn({
            let ticks = ticks.clone();
            async move {
                loop {
                    ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            }
        });

        let payload = vec![7u8; 8 * 1024 * 1024];
        let path = trigger_download(&sink, &payload, "large.pdf").await.unwrap();
        ticker.abort();

        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) > 0);
        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), payload.len() as u64);
    }

    #[test]
    fn test_fallback_filename() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

        assert_eq!(
            fallback_filename("receipt Template.docx", OutputFormat::Pdf, now),
            "MergedOutput_receiptTemplate_2024-01-15_20240115T103000000Z.pdf"
        );
        assert_eq!(
            fallback_filename("", OutputFormat::Docx, now),
            "MergedOutput_Template_2024-01-15_20240115T103000000Z.docx"
        );
    }

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"mergedOutput_1.pdf\""),
            Some("mergedOutput_1.pdf".to_string())
        );
        assert_eq!(filename_from_disposition("attachment"), None);
        assert_eq!(filename_from_disposition("attachment; filename=\"\""), None);
    }
}
