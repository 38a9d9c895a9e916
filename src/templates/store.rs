//! Template Store
//!
//! Read-only directory of DOCX templates addressed by file name.
//! Every opened template is tracked until its handle is dropped.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

/// Template lookup errors
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Invalid template name: {0:?}")]
    InvalidName(String),

    #[error("Template is not a regular file: {0}")]
    NotAFile(String),

    #[error("Failed to open template {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Template entry returned by [`TemplateStore::list`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateInfo {
    pub name: String,
    pub size: u64,
}

/// Directory of templates
#[derive(Clone, Debug)]
pub struct TemplateStore {
    dir: PathBuf,
    open_handles: Arc<AtomicUsize>,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of template handles currently open
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Resolve a template name to a path inside the store.
    ///
    /// Only plain file names are accepted, so a name can never address
    /// anything outside the template directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, TemplateError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) if file == name && !name.contains('\\') => {
                Ok(self.dir.join(file))
            }
            _ => Err(TemplateError::InvalidName(name.to_string())),
        }
    }

    /// Open a template for reading.
    ///
    /// Fails when the name is not a plain file name, the file does not exist,
    /// or it cannot be opened.
    pub async fn open(&self, name: &str) -> Result<TemplateFile, TemplateError> {
        let path = self.resolve(name)?;
        let io_err = |source| TemplateError::Io {
            name: name.to_string(),
            source,
        };

        let file = File::open(&path).await.map_err(io_err)?;
        let metadata = file.metadata().await.map_err(io_err)?;
        if !metadata.is_file() {
            return Err(TemplateError::NotAFile(name.to_string()));
        }

        self.open_handles.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(template = %name, size = metadata.len(), "Opened template");

        Ok(TemplateFile {
            name: name.to_string(),
            size: metadata.len(),
            file,
            open_handles: self.open_handles.clone(),
        })
    }

    /// List the DOCX templates in the store, sorted by name
    pub async fn list(&self) -> io::Result<Vec<TemplateInfo>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut templates = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_lowercase().ends_with(".docx") || name.starts_with("~$") {
                continue;
            }
            templates.push(TemplateInfo {
                name,
                size: metadata.len(),
            });
        }

        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }
}

/// Open template file.
///
/// Closing happens on drop, on every path out of the handler that owns it.
#[derive(Debug)]
pub struct TemplateFile {
    name: String,
    size: u64,
    file: File,
    open_handles: Arc<AtomicUsize>,
}

impl TemplateFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl AsyncRead for TemplateFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl Drop for TemplateFile {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(template = %self.name, "Released template");
    }
}
