//! PDF Services Providers
//!
//! Defines the capability trait the merge service drives, and the Adobe PDF
//! Services REST implementation of it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;

use super::types::{AssetHandle, DocumentMergeJob, JobStatus, MergeError, PollingHandle, ResultAsset};
use crate::config::PdfServicesConfig;

/// Content of a result asset, chunk by chunk
pub type ContentStream = BoxStream<'static, Result<Bytes, MergeError>>;

/// Tokens are refreshed this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Document generation backend
#[async_trait]
pub trait PdfServicesApi: Send + Sync {
    /// Upload an input asset and return its handle
    async fn upload(
        &self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        media_type: &str,
    ) -> Result<AssetHandle, MergeError>;

    /// Submit a merge job and return the URL to poll
    async fn submit(&self, job: &DocumentMergeJob) -> Result<PollingHandle, MergeError>;

    /// Poll a submitted job once
    async fn job_status(&self, polling: &PollingHandle) -> Result<JobStatus, MergeError>;

    /// Open the content of a result asset
    async fn get_content(&self, asset: &ResultAsset) -> Result<ContentStream, MergeError>;
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Adobe PDF Services REST client
pub struct AdobePdfServices {
    client: Client,
    config: PdfServicesConfig,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUriResponse {
    upload_uri: String,
    #[serde(rename = "assetID")]
    asset_id: String,
}

#[derive(Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    asset: Option<PollAsset>,
    #[serde(default)]
    error: Option<PollError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollAsset {
    #[serde(default, rename = "assetID")]
    asset_id: Option<String>,
    download_uri: String,
}

#[derive(Deserialize)]
struct PollError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AdobePdfServices {
    pub fn new(config: PdfServicesConfig) -> Result<Self, MergeError> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Get a bearer token, exchanging the client credentials when needed
    async fn access_token(&self) -> Result<String, MergeError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(self.url("token"))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MergeError::Auth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(MergeError::Auth(format!("Token exchange returned {}: {}", status, body)));
        }
        let response = check_status(response).await?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MergeError::Auth(format!("Failed to parse token response: {}", e)))?;

        tracing::debug!(expires_in = token.expires_in, "Obtained PDF Services access token");

        let value = token.access_token.clone();
        *cached = Some(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    async fn authorized(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, MergeError> {
        let token = self.access_token().await?;
        Ok(builder
            .bearer_auth(token)
            .header("X-API-Key", &self.config.client_id)
            .header("x-gw-ims-org-id", &self.config.organization_id))
    }
}

#[async_trait]
impl PdfServicesApi for AdobePdfServices {
    async fn upload(
        &self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        media_type: &str,
    ) -> Result<AssetHandle, MergeError> {
        let request = self
            .authorized(self.client.post(self.url("assets")))
            .await?
            .json(&serde_json::json!({ "mediaType": media_type }));
        let response = check_status(request.send().await?).await?;
        let target: UploadUriResponse = response.json().await?;

        let mut content = Vec::new();
        source.read_to_end(&mut content).await?;
        let size = content.len();

        let response = self
            .client
            .put(&target.upload_uri)
            .header(header::CONTENT_TYPE, media_type)
            .body(content)
            .send()
            .await?;
        check_status(response).await?;

        tracing::debug!(asset_id = %target.asset_id, size, "Uploaded asset");
        Ok(AssetHandle {
            asset_id: target.asset_id,
        })
    }

    async fn submit(&self, job: &DocumentMergeJob) -> Result<PollingHandle, MergeError> {
        let request = self
            .authorized(self.client.post(self.url("operation/documentgeneration")))
            .await?
            .json(&serde_json::json!({
                "assetID": job.input.asset_id,
                "outputFormat": job.output_format.api_name(),
                "jsonDataForMerge": job.merge_data,
            }));
        let response = check_status(request.send().await?).await?;

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| MergeError::Unclassified("Job submission returned no location".to_string()))?;

        tracing::debug!(polling_url = %location, "Submitted document generation job");
        Ok(PollingHandle(location.to_string()))
    }

    async fn job_status(&self, polling: &PollingHandle) -> Result<JobStatus, MergeError> {
        let request = self.authorized(self.client.get(&polling.0)).await?;
        let response = check_status(request.send().await?).await?;
        let poll: PollResponse = response.json().await?;

        match poll.status.as_str() {
            "done" => {
                let asset = poll
                    .asset
                    .ok_or_else(|| MergeError::Unclassified("Finished job has no asset".to_string()))?;
                Ok(JobStatus::Done(ResultAsset {
                    asset_id: asset.asset_id,
                    download_uri: asset.download_uri,
                }))
            }
            "failed" => {
                let reason = poll
                    .error
                    .map(|e| {
                        format!(
                            "{}: {}",
                            e.code.unwrap_or_else(|| "UNKNOWN".to_string()),
                            e.message.unwrap_or_default()
                        )
                    })
                    .unwrap_or_else(|| "no error details".to_string());
                Ok(JobStatus::Failed(reason))
            }
            _ => Ok(JobStatus::InProgress),
        }
    }

    async fn get_content(&self, asset: &ResultAsset) -> Result<ContentStream, MergeError> {
        let response = check_status(self.client.get(&asset.download_uri).send().await?).await?;
        Ok(response.bytes_stream().map(|chunk| chunk.map_err(MergeError::from)).boxed())
    }
}

/// Turn a non-success response into a classified error
async fn check_status(response: Response) -> Result<Response, MergeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MergeError::from_status(status.as_u16(), body))
}

/// In-memory provider for testing
#[cfg(test)]
pub struct MockProvider {
    /// Chunks returned by `get_content`
    pub output: Vec<&'static [u8]>,
    /// Polls answered with `InProgress` before the job is done
    pub pending_polls: usize,
    /// Error returned by `submit`
    pub fail_submit: Option<fn() -> MergeError>,
    /// Reason reported by a job that fails once the pending polls are used up
    pub job_failure: Option<&'static str>,
    pub uploads: std::sync::atomic::AtomicUsize,
    pub submits: std::sync::atomic::AtomicUsize,
    pub polls: std::sync::atomic::AtomicUsize,
    pub uploaded: parking_lot::Mutex<Vec<Vec<u8>>>,
    pub jobs: parking_lot::Mutex<Vec<DocumentMergeJob>>,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(output: Vec<&'static [u8]>) -> Self {
        Self {
            output,
            pending_polls: 0,
            fail_submit: None,
            job_failure: None,
            uploads: Default::default(),
            submits: Default::default(),
            polls: Default::default(),
            uploaded: Default::default(),
            jobs: Default::default(),
        }
    }

    pub fn failing(fail: fn() -> MergeError) -> Self {
        Self {
            fail_submit: Some(fail),
            ..Self::new(vec![])
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        use std::sync::atomic::Ordering::SeqCst;
        self.uploads.load(SeqCst) + self.submits.load(SeqCst) + self.polls.load(SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl PdfServicesApi for MockProvider {
    async fn upload(
        &self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        _media_type: &str,
    ) -> Result<AssetHandle, MergeError> {
        let n = self.uploads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut content = Vec::new();
        source.read_to_end(&mut content).await?;
        self.uploaded.lock().push(content);
        Ok(AssetHandle {
            asset_id: format!("asset-{}", n),
        })
    }

    async fn submit(&self, job: &DocumentMergeJob) -> Result<PollingHandle, MergeError> {
        self.submits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(fail) = self.fail_submit {
            return Err(fail());
        }
        self.jobs.lock().push(job.clone());
        Ok(PollingHandle(format!("mock://jobs/{}", job.input.asset_id)))
    }

    async fn job_status(&self, _polling: &PollingHandle) -> Result<JobStatus, MergeError> {
        let n = self.polls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n < self.pending_polls {
            return Ok(JobStatus::InProgress);
        }
        if let Some(reason) = self.job_failure {
            return Ok(JobStatus::Failed(reason.to_string()));
        }
        Ok(JobStatus::Done(ResultAsset {
            asset_id: Some("result".to_string()),
            download_uri: "mock://result".to_string(),
        }))
    }

    async fn get_content(&self, _asset: &ResultAsset) -> Result<ContentStream, MergeError> {
        let chunks: Vec<Result<Bytes, MergeError>> = self
            .output
            .iter()
            .map(|chunk| Ok(Bytes::from_static(*chunk)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{header as http_header, HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response as HttpResponse};
    use axum::routing::{get, post, put};
    use axum::{Form, Json, Router};
    use serde_json::{json, Value};

    use crate::merge::{collect_stream, ErrorCategory, MergeService, OutputFormat, DOCX_MIME};

    const CLIENT_ID: &str = "client";
    const CLIENT_SECRET: &str = "secret";
    const ORG_ID: &str = "org@AdobeOrg";

    /// PDF Services stand-in served on a local port
    struct FakeApi {
        base_url: String,
        /// Status answered by `/assets` when not 200
        assets_status: StatusCode,
        /// "done" or "failed", reported from the second poll on
        outcome: &'static str,
        tokens: AtomicUsize,
        polls: AtomicUsize,
        uploaded: parking_lot::Mutex<Vec<u8>>,
        jobs: parking_lot::Mutex<Vec<Value>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        let value_of = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
        value_of("authorization") == Some("Bearer fake-token")
            && value_of("x-api-key") == Some(CLIENT_ID)
            && value_of("x-gw-ims-org-id") == Some(ORG_ID)
    }

    async fn token(State(api): State<Arc<FakeApi>>, Form(form): Form<HashMap<String, String>>) -> HttpResponse {
        let valid = form.get("client_id").map(String::as_str) == Some(CLIENT_ID)
            && form.get("client_secret").map(String::as_str) == Some(CLIENT_SECRET);
        if !valid {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid_client" }))).into_response();
        }
        api.tokens.fetch_add(1, Ordering::SeqCst);
        Json(json!({ "access_token": "fake-token", "token_type": "bearer", "expires_in": 86399 })).into_response()
    }

    async fn assets(State(api): State<Arc<FakeApi>>, headers: HeaderMap, Json(body): Json<Value>) -> HttpResponse {
        if !authorized(&headers) {
            return StatusCode::FORBIDDEN.into_response();
        }
        if api.assets_status != StatusCode::OK {
            return (api.assets_status, "rejected").into_response();
        }
        if body["mediaType"] != DOCX_MIME {
            return StatusCode::BAD_REQUEST.into_response();
        }
        Json(json!({ "uploadUri": format!("{}/upload", api.base_url), "assetID": "asset-1" })).into_response()
    }

    async fn upload(State(api): State<Arc<FakeApi>>, body: Bytes) -> StatusCode {
        *api.uploaded.lock() = body.to_vec();
        StatusCode::OK
    }

    async fn generate(State(api): State<Arc<FakeApi>>, headers: HeaderMap, Json(job): Json<Value>) -> HttpResponse {
        if !authorized(&headers) {
            return StatusCode::FORBIDDEN.into_response();
        }
        api.jobs.lock().push(job);
        (
            StatusCode::CREATED,
            [(http_header::LOCATION, format!("{}/status", api.base_url))],
        )
            .into_response()
    }

    async fn status(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> HttpResponse {
        if !authorized(&headers) {
            return StatusCode::FORBIDDEN.into_response();
        }
        let body = match (api.polls.fetch_add(1, Ordering::SeqCst), api.outcome) {
            (0, _) => json!({ "status": "in progress" }),
            (_, "failed") => json!({
                "status": "failed",
                "error": { "code": "BAD_TEMPLATE", "message": "Tags are malformed" }
            }),
            _ => json!({
                "status": "done",
                "asset": {
                    "assetID": "out-1",
                    "downloadUri": format!("{}/download", api.base_url)
                }
            }),
        };
        Json(body).into_response()
    }

    async fn download() -> &'static [u8] {
        b"%PDF-fake"
    }

    async fn spawn_fake(
        assets_status: StatusCode,
        outcome: &'static str,
        secret: &str,
    ) -> (Arc<FakeApi>, AdobePdfServices) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let api = Arc::new(FakeApi {
            base_url: base_url.clone(),
            assets_status,
            outcome,
            tokens: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            uploaded: Default::default(),
            jobs: Default::default(),
        });
        let app = Router::new()
            .route("/token", post(token))
            .route("/assets", post(assets))
            .route("/upload", put(upload))
            .route("/operation/documentgeneration", post(generate))
            .route("/status", get(status))
            .route("/download", get(download))
            .with_state(api.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = AdobePdfServices::new(PdfServicesConfig {
            base_url,
            client_id: CLIENT_ID.to_string(),
            client_secret: secret.to_string(),
            organization_id: ORG_ID.to_string(),
            http_timeout: Duration::from_secs(5),
        })
        .unwrap();
        (api, client)
    }

    fn job(input: AssetHandle) -> DocumentMergeJob {
        DocumentMergeJob {
            input,
            merge_data: json!({ "author": "Gary Lee" }),
            output_format: OutputFormat::Pdf,
        }
    }

    #[tokio::test]
    async fn test_adobe_client_generates_document() {
        let (api, client) = spawn_fake(StatusCode::OK, "done", CLIENT_SECRET).await;

        let mut template: &[u8] = b"PKtemplate";
        let input = client.upload(&mut template, DOCX_MIME).await.unwrap();
        assert_eq!(input.asset_id, "asset-1");
        assert_eq!(*api.uploaded.lock(), b"PKtemplate");

        let polling = client.submit(&job(input)).await.unwrap();
        assert_eq!(polling.0, format!("{}/status", api.base_url));
        assert_eq!(
            api.jobs.lock()[0],
            json!({
                "assetID": "asset-1",
                "outputFormat": "pdf",
                "jsonDataForMerge": { "author": "Gary Lee" }
            })
        );

        assert_eq!(client.job_status(&polling).await.unwrap(), JobStatus::InProgress);
        let asset = match client.job_status(&polling).await.unwrap() {
            JobStatus::Done(asset) => asset,
            other => panic!("unexpected status {:?}", other),
        };
        assert_eq!(asset.asset_id.as_deref(), Some("out-1"));

        let content = client.get_content(&asset).await.unwrap();
        let bytes = collect_stream(content, 1024).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-fake");

        // One token exchange serves every authorized call.
        assert_eq!(api.tokens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_adobe_client_failed_job() {
        let (api, client) = spawn_fake(StatusCode::OK, "failed", CLIENT_SECRET).await;

        let mut template: &[u8] = b"PKtemplate";
        let input = client.upload(&mut template, DOCX_MIME).await.unwrap();
        let polling = client.submit(&job(input)).await.unwrap();

        let service = MergeService::new(
            Arc::new(client),
            crate::config::MergeConfig {
                poll_interval: Duration::from_millis(5),
                poll_timeout: Duration::from_secs(5),
                max_output_bytes: 1024,
            },
        );
        let err = service.get_job_result(&polling).await.unwrap_err();

        match &err {
            MergeError::JobFailed(reason) => assert_eq!(reason, "BAD_TEMPLATE: Tags are malformed"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.category(), ErrorCategory::Api);
        assert_eq!(api.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_adobe_client_error_categories() {
        let (_api, client) = spawn_fake(StatusCode::OK, "done", "wrong-secret").await;
        let mut template: &[u8] = b"PK";
        let err = client.upload(&mut template, DOCX_MIME).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Auth);

        let (_api, client) = spawn_fake(StatusCode::TOO_MANY_REQUESTS, "done", CLIENT_SECRET).await;
        let mut template: &[u8] = b"PK";
        let err = client.upload(&mut template, DOCX_MIME).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Usage);

        let (_api, client) = spawn_fake(StatusCode::SERVICE_UNAVAILABLE, "done", CLIENT_SECRET).await;
        let mut template: &[u8] = b"PK";
        let err = client.upload(&mut template, DOCX_MIME).await.unwrap_err();
        assert!(matches!(err, MergeError::Api { status: 503, .. }));
    }
}
