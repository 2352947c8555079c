use crate::common::response::ErrorBody;
use crate::infrastructure::library::VideoId;
use crate::modules::jobs::dto::JobStatusResponse;
use crate::modules::jobs::model::JobCategory;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRequest {
    Scan { full_scan: bool },
    Thumbnails,
    Cleanup,
    Transcode(VideoId),
}

impl StartRequest {
    pub fn category(&self) -> JobCategory {
        match self {
            StartRequest::Scan { .. } => JobCategory::Scan,
            StartRequest::Thumbnails => JobCategory::Thumbnails,
            StartRequest::Cleanup => JobCategory::Cleanup,
            StartRequest::Transcode(_) => JobCategory::Transcode,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiClientError {
    /// Another job of the category holds the slot.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Validation failure or server error; not worth retrying as-is.
    #[error("rejected with {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ApiClientError {
    fn from(e: reqwest::Error) -> Self {
        ApiClientError::Transport(e.to_string())
    }
}

/// The two calls the caller side makes against the job backend.
#[async_trait]
pub trait JobsApi: Send + Sync {
    async fn start(&self, request: StartRequest) -> Result<(), ApiClientError>;

    async fn status(&self, category: JobCategory) -> Result<JobStatusResponse, ApiClientError>;
}

#[derive(Clone, Debug)]
pub struct HttpJobsApi {
    http: Client,
    base: Url,
}

impl HttpJobsApi {
    pub fn new(server_url: &str) -> anyhow::Result<Self> {
        let mut base = Url::parse(server_url)
            .with_context(|| format!("Invalid server URL '{server_url}'"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("library-jobs/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiClientError> {
        self.base
            .join(path)
            .map_err(|e| ApiClientError::Transport(format!("bad endpoint {path}: {e}")))
    }

    fn start_path(request: &StartRequest) -> String {
        match request {
            StartRequest::Scan { .. } => "api/v1/jobs/scan/start".to_string(),
            StartRequest::Thumbnails => "api/v1/jobs/thumbnails/start".to_string(),
            StartRequest::Cleanup => "api/v1/jobs/cleanup/start".to_string(),
            StartRequest::Transcode(id) => format!("api/v1/video/{id}/transcode/start"),
        }
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    }
}

#[async_trait]
impl JobsApi for HttpJobsApi {
    async fn start(&self, request: StartRequest) -> Result<(), ApiClientError> {
        let url = self.endpoint(&Self::start_path(&request))?;
        let builder = self.http.post(url);
        let builder = match request {
            StartRequest::Scan { full_scan } => builder.json(&json!({ "full_scan": full_scan })),
            _ => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        debug!(category = %request.category(), %status, "Start request answered");

        if status.is_success() {
            return Ok(());
        }
        let message = error_message(response).await;
        if status == StatusCode::CONFLICT {
            Err(ApiClientError::Conflict(message))
        } else {
            Err(ApiClientError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn status(&self, category: JobCategory) -> Result<JobStatusResponse, ApiClientError> {
        let url = self.endpoint(&format!("api/v1/jobs/{category}/status"))?;
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(ApiClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<JobStatusResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::jobs::model::JobState;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn start_maps_status_codes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/jobs/scan/start"))
            .and(body_json(json!({"full_scan": true})))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/jobs/cleanup/start"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({"error": "A cleanup job is already in progress."})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/video/5/transcode/start"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Video 5 not found."})))
            .mount(&server)
            .await;

        let api = HttpJobsApi::new(&server.uri()).unwrap();

        assert_eq!(api.start(StartRequest::Scan { full_scan: true }).await, Ok(()));
        assert_eq!(
            api.start(StartRequest::Cleanup).await,
            Err(ApiClientError::Conflict("A cleanup job is already in progress.".to_string()))
        );
        assert_eq!(
            api.start(StartRequest::Transcode(5)).await,
            Err(ApiClientError::Rejected {
                status: 404,
                message: "Video 5 not found.".to_string()
            })
        );
    }

    #[tokio::test]
    async fn status_decodes_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/jobs/transcode/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "transcoding",
                "message": "Starting optimization for: a.mkv",
                "progress": 0,
                "total": 0,
                "subjectId": 4
            })))
            .mount(&server)
            .await;

        let api = HttpJobsApi::new(&server.uri()).unwrap();
        let status = api.status(JobCategory::Transcode).await.unwrap();
        assert_eq!(status.state(), JobState::Running);
        assert_eq!(status.subject_id, Some(4));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        // nothing listens on the discard port
        let api = HttpJobsApi::new("http://127.0.0.1:9").unwrap();
        let err = api.status(JobCategory::Scan).await.unwrap_err();
        assert!(matches!(err, ApiClientError::Transport(_)));
    }
}
