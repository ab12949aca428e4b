//! HTTP client for the processing/query backend.
//!
//! Implements [`VideoQueryService`] against the backend's JSON interface:
//! `GET /status/{id}`, `POST /process`, `POST /ask`. The backend is treated
//! as an opaque collaborator; this module only maps wire shapes to domain
//! types and HTTP failures to [`TubechatError`] variants.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tubechat_core::{
    RemoteState, Result, TubechatError, VideoId, VideoQueryService, VideoStatus,
};

use crate::config::BackendConfig;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the remote processing/query backend.
#[derive(Debug, Clone)]
pub struct BackendApiClient {
    client: Client,
    base_url: String,
}

impl BackendApiClient {
    /// Creates a client for the given base address.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client with an explicit per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, base_url }
    }

    /// Creates a client from a loaded [`BackendConfig`].
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps a non-2xx response to an error, consuming the body as detail.
    async fn error_for(response: reqwest::Response) -> TubechatError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error body".to_string());
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.detail,
            Err(_) => body.chars().take(200).collect(),
        };
        TubechatError::server(status, message)
    }
}

#[async_trait]
impl VideoQueryService for BackendApiClient {
    async fn status(&self, id: &VideoId) -> Result<VideoStatus> {
        let url = self.endpoint(&format!("/status/{}", id));
        tracing::debug!(video_id = %id, "checking backend status");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| TubechatError::transport(format!("Status request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let parsed: StatusResponse = response.json().await.map_err(|err| {
            TubechatError::transport(format!("Failed to parse status response: {err}"))
        })?;

        Ok(parsed.into_status())
    }

    async fn begin_processing(&self, video_url: &str) -> Result<VideoId> {
        let url = self.endpoint("/process");
        tracing::info!(video_url, "requesting backend processing");

        let response = self
            .client
            .post(&url)
            .json(&ProcessRequest { video_url })
            .send()
            .await
            .map_err(|err| TubechatError::transport(format!("Process request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let parsed: ProcessResponse = response.json().await.map_err(|err| {
            TubechatError::transport(format!("Failed to parse process response: {err}"))
        })?;

        VideoId::new(parsed.video_id)
            .ok_or_else(|| TubechatError::transport("Backend returned an empty video id"))
    }

    async fn ask(&self, id: &VideoId, question: &str) -> Result<String> {
        let url = self.endpoint("/ask");
        tracing::debug!(video_id = %id, "sending question to backend");

        let response = self
            .client
            .post(&url)
            .json(&AskRequest {
                video_id: id.as_str(),
                question,
            })
            .send()
            .await
            .map_err(|err| TubechatError::transport(format!("Ask request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let parsed: AskResponse = response.json().await.map_err(|err| {
            TubechatError::transport(format!("Failed to parse ask response: {err}"))
        })?;

        Ok(parsed.answer)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    video_url: &'a str,
}

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    video_id: &'a str,
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    status: Option<String>,
    /// Some backend builds send a boolean flag, others a nullable string.
    #[serde(default)]
    has_error: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

impl StatusResponse {
    fn into_status(self) -> VideoStatus {
        let state = match self.status.as_deref() {
            Some("ready") => RemoteState::Ready,
            Some("processing") => RemoteState::Processing,
            Some(other) => RemoteState::Other(other.to_string()),
            None => RemoteState::Other("unknown".to_string()),
        };
        let failed = self.has_error.unwrap_or(false)
            || self.error.as_deref().is_some_and(|e| !e.is_empty());
        VideoStatus {
            known: self.ok,
            state,
            failed,
            detail: self.error,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}
