//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::merge::{AdobePdfServices, MergeError, MergeService, PdfServicesApi};
use crate::templates::TemplateStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    templates: TemplateStore,
    merge: MergeService,
}

impl AppState {
    /// Create application state backed by Adobe PDF Services
    pub fn new(config: Config) -> Result<Self, MergeError> {
        let provider = AdobePdfServices::new(config.pdf_services.clone())?;
        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Create application state with an explicit PDF Services implementation
    pub fn with_provider(config: Config, provider: Arc<dyn PdfServicesApi>) -> Self {
        let templates = TemplateStore::new(config.templates.dir.clone());
        let merge = MergeService::new(provider, config.merge.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                templates,
                merge,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the template store
    pub fn templates(&self) -> &TemplateStore {
        &self.inner.templates
    }

    /// Get the merge service
    pub fn merge(&self) -> &MergeService {
        &self.inner.merge
    }
}
