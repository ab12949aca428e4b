//! Remote service contract.
//!
//! The backend that ingests videos and answers questions is an external
//! collaborator behind this trait. The application layer only ever talks to
//! `dyn VideoQueryService`, which keeps the controller testable without a
//! running backend.

use crate::error::Result;
use crate::video::VideoId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Processing state as reported by the backend status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteState {
    /// The video is processed and ready for questions.
    Ready,
    /// Ingestion is still running.
    Processing,
    /// Any other status string the backend may report (e.g. `not_found`).
    Other(String),
}

/// One status snapshot for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStatus {
    /// Whether the backend knows this video at all (`ok` on the wire).
    pub known: bool,
    /// Reported processing state.
    pub state: RemoteState,
    /// Explicit failure flag: processing ran and failed.
    pub failed: bool,
    /// Optional human-readable detail accompanying a failure.
    pub detail: Option<String>,
}

impl VideoStatus {
    /// Snapshot for a video the backend has never seen.
    pub fn unknown() -> Self {
        Self {
            known: false,
            state: RemoteState::Other("not_found".to_string()),
            failed: false,
            detail: None,
        }
    }

    pub fn ready() -> Self {
        Self {
            known: true,
            state: RemoteState::Ready,
            failed: false,
            detail: None,
        }
    }

    pub fn processing() -> Self {
        Self {
            known: true,
            state: RemoteState::Processing,
            failed: false,
            detail: None,
        }
    }

    /// Snapshot for a processing run that failed server-side.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            known: true,
            state: RemoteState::Processing,
            failed: true,
            detail: Some(detail.into()),
        }
    }
}

/// Access to the remote processing/query backend.
///
/// All three operations are one round-trip each; retry policy lives with the
/// caller (the poll loop retries status checks, one-shot calls do not retry).
#[async_trait]
pub trait VideoQueryService: Send + Sync {
    /// Fetches the current processing status for a video.
    async fn status(&self, id: &VideoId) -> Result<VideoStatus>;

    /// Asks the backend to start processing the video behind `video_url`.
    ///
    /// Returns the identifier the backend derived for the video, which is
    /// authoritative and may differ from the client-derived one.
    async fn begin_processing(&self, video_url: &str) -> Result<VideoId>;

    /// Asks one question about a processed video and returns the answer text.
    async fn ask(&self, id: &VideoId, question: &str) -> Result<String>;
}
