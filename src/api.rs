//! HTTP request issuer: upload, process and scrape-quota calls.

use std::path::Path;

use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{redirect, Client, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ModelField};
use crate::error::{EnrichError, UploadError};
use crate::protocol::{ErrorBody, ProcessingRequest, RawUploadResponse, ScrapeQuota, UploadResult};
use crate::validate::check_upload_file;

/// Where the browser was sent when a session expired and no `Location` was given.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    /// Build a client that does not follow redirects, so an expired session
    /// (302 to the login page) can be recognised.
    pub fn new(config: ClientConfig) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.session_cookie.as_deref() {
            match HeaderValue::from_str(cookie) {
                Ok(value) => {
                    headers.insert(COOKIE, value);
                }
                Err(e) => warn!(error = %e, "session cookie is not a valid header value, ignoring"),
            }
        }
        // reqwest::Client::builder() only fails when the TLS backend cannot
        // initialise; fall back to the default client instead of panicking.
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Upload one CSV file.
    ///
    /// # Returns
    /// - `Ok(UploadResult)`: 2xx with `file_path`, `row_count` and `columns`.
    /// - `Err(UploadError::NotCsv | MissingFile)`: rejected locally, no request sent.
    /// - `Err(UploadError::SessionExpired)`: the server redirected to login.
    /// - `Err(UploadError::Rejected)`: non-success status or `{error}` body.
    /// - `Err(UploadError::Malformed)`: a required field is missing.
    pub async fn upload(&self, path: &Path) -> Result<UploadResult, UploadError> {
        check_upload_file(path, self.config.require_csv_extension)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::MissingFile(format!("{}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.csv")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/csv")
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        let url = self.config.endpoint("/upload");
        info!(url = %url, file = %path.display(), "uploading file");
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_redirection() {
            return Err(UploadError::SessionExpired { location: location_of(&resp) });
        }

        let body = resp.bytes().await.map_err(|e| UploadError::Transport(e.to_string()))?;
        let raw: RawUploadResponse = match serde_json::from_slice(&body) {
            Ok(raw) => raw,
            Err(e) if status.is_success() => {
                return Err(UploadError::Malformed(format!("body is not JSON: {e}")));
            }
            Err(_) => {
                return Err(UploadError::Rejected {
                    status: status.as_u16(),
                    message: String::from_utf8_lossy(&body).trim().to_string(),
                });
            }
        };

        if let Some(message) = raw.error.clone() {
            return Err(UploadError::Rejected { status: status.as_u16(), message });
        }
        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: format!("HTTP {status}"),
            });
        }

        raw.into_result()
            .map_err(|field| UploadError::Malformed(format!("missing field '{field}'")))
    }

    /// Request/response variant of processing: the body of a successful
    /// reply is the result CSV.
    pub async fn process(
        &self,
        request: &ProcessingRequest,
        model_field: ModelField,
    ) -> Result<String, EnrichError> {
        let url = self.config.endpoint("/process");
        info!(url = %url, model = %request.model, "submitting processing request");
        let resp = self
            .client
            .post(&url)
            .json(&request.to_payload(model_field))
            .send()
            .await
            .map_err(|e| EnrichError::Submission(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if status.is_redirection() {
            return Err(EnrichError::Submission(format!(
                "session expired, log in again at {}",
                location_of(&resp)
            )));
        }
        let text = resp
            .text()
            .await
            .map_err(|e| EnrichError::Submission(format!("reading response failed: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("HTTP {status} from {url}"));
            return Err(EnrichError::Submission(message));
        }
        if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
            return Err(EnrichError::Submission(body.error));
        }
        debug!(bytes = text.len(), "process response received");
        Ok(text)
    }

    /// Current scrape quota, or `None` when the user is not authenticated.
    pub async fn scrape_quota(&self) -> Result<Option<ScrapeQuota>, EnrichError> {
        let url = self.config.endpoint("/get_scrape_count");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EnrichError::Connection(format!("{url}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status.is_redirection() {
            debug!(status = status.as_u16(), "quota unavailable, hiding display");
            return Ok(None);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %url, "quota request failed");
            return Err(EnrichError::Connection(format!("HTTP {status} from {url}")));
        }
        resp.json::<ScrapeQuota>()
            .await
            .map(Some)
            .map_err(|e| EnrichError::Connection(format!("invalid quota body: {e}")))
    }
}

fn location_of(resp: &Response) -> String {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_LOGIN_PATH)
        .to_string()
}
