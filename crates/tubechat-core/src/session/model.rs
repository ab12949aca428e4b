//! Session domain model.

use serde::{Deserialize, Serialize};

use crate::session::message::ChatMessage;
use crate::session::phase::Phase;
use crate::video::VideoId;

/// One activation of the chat surface against one page.
///
/// This is the "pure" model the controller operates on. The backend is the
/// durable store of truth; a `Session` only captures the client's current
/// belief and the local transcript, and dies with the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Identifier of record. `None` when the page URL yielded no identifier
    /// (the session is then `Errored` and stays that way).
    pub video_id: Option<VideoId>,
    /// The page URL this session was activated for.
    pub source_url: String,
    /// Best-effort page title; absence is tolerated everywhere.
    pub title: Option<String>,
    /// Current phase; transitions are driven exclusively by resolver
    /// responses, poll responses, and one-shot call outcomes.
    pub phase: Phase,
    /// Reason for the most recent failure, if any.
    pub last_error: Option<String>,
    /// Append-only transcript.
    pub messages: Vec<ChatMessage>,
}

impl Session {
    /// Creates a session for a page with a derivable identifier.
    pub fn new(video_id: VideoId, source_url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            video_id: Some(video_id),
            source_url: source_url.into(),
            title,
            phase: Phase::Uninitialized,
            last_error: None,
            messages: Vec::new(),
        }
    }

    /// Creates a session for a page that did not yield an identifier.
    pub fn without_identifier(
        source_url: impl Into<String>,
        title: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            video_id: None,
            source_url: source_url.into(),
            title,
            phase: Phase::Errored,
            last_error: Some(reason.into()),
            messages: Vec::new(),
        }
    }
}
