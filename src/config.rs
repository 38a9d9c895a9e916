//! Configuration management for Docgen Server

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default Adobe PDF Services endpoint (US region)
pub const DEFAULT_PDF_SERVICES_URL: &str = "https://pdf-services.adobe.io";

/// Template used by the legacy single-template endpoint
pub const DEFAULT_TEMPLATE: &str = "receiptTemplate.docx";

/// Default cap on a merged document: 50MB
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 50 * 1024 * 1024;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub templates: TemplateConfig,
    pub pdf_services: PdfServicesConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    /// Directory holding the DOCX templates
    pub dir: PathBuf,
    /// Template merged by `/api/merge`
    pub default_template: String,
}

#[derive(Clone, Deserialize)]
pub struct PdfServicesConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub organization_id: String,
    /// Per-request timeout for calls to PDF Services
    pub http_timeout: Duration,
}

// Keep the secret out of logs.
impl std::fmt::Debug for PdfServicesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfServicesConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("organization_id", &self.organization_id)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    /// Delay between two job status polls
    pub poll_interval: Duration,
    /// Give up on a job that has not resolved after this long
    pub poll_timeout: Duration,
    /// Largest merged document accepted from PDF Services
    pub max_output_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("public/sampletemplates"),
            default_template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            poll_timeout: Duration::from_secs(120),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// The three PDF Services credentials are required; everything else
    /// falls back to a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let merge_defaults = MergeConfig::default();
        let template_defaults = TemplateConfig::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 3000)?,
            },
            templates: TemplateConfig {
                dir: env::var("TEMPLATE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(template_defaults.dir),
                default_template: env::var("DEFAULT_TEMPLATE")
                    .unwrap_or(template_defaults.default_template),
            },
            pdf_services: PdfServicesConfig {
                base_url: env::var("PDF_SERVICES_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_PDF_SERVICES_URL.to_string()),
                client_id: required_var("PDF_SERVICES_CLIENT_ID")?,
                client_secret: required_var("PDF_SERVICES_CLIENT_SECRET")?,
                organization_id: required_var("PDF_SERVICES_ORGANIZATION_ID")?,
                http_timeout: Duration::from_secs(parse_var("PDF_SERVICES_HTTP_TIMEOUT_SECS", 60)?),
            },
            merge: MergeConfig {
                poll_interval: Duration::from_millis(parse_var(
                    "PDF_SERVICES_POLL_INTERVAL_MS",
                    merge_defaults.poll_interval.as_millis() as u64,
                )?),
                poll_timeout: Duration::from_secs(parse_var(
                    "PDF_SERVICES_POLL_TIMEOUT_SECS",
                    merge_defaults.poll_timeout.as_secs(),
                )?),
                max_output_bytes: parse_var("MERGE_MAX_OUTPUT_BYTES", merge_defaults.max_output_bytes)?,
            },
        })
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
