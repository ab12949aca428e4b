//! Video identity.
//!
//! A [`VideoId`] is the canonical token the backend uses to name one video.
//! It is derived client-side from the page URL; the backend may re-derive it
//! server-side and its answer wins (see the application layer).

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Canonical identifier of one video within the backend.
///
/// Opaque to the client: never parsed, only compared and forwarded. An
/// identifier is never empty; "no identifier" is `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Wraps a raw identifier string. Returns `None` for empty input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty() { None } else { Some(Self(raw)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the video identifier from a page URL.
///
/// Two shapes are recognized, matching what the backend accepts:
/// - short links: `https://youtu.be/<id>` (first path segment)
/// - canonical watch pages: `https://www.youtube.com/watch?v=<id>` with any
///   other query parameters in any order
///
/// Anything else, including malformed input, yields `None`. Pure function,
/// no network access.
pub fn extract_video_id(url: &str) -> Option<VideoId> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    if host == "youtu.be" {
        let first_segment = parsed.path_segments()?.next()?;
        return VideoId::new(first_segment);
    }

    if host == "youtube.com" || host.ends_with(".youtube.com") {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .and_then(|(_, value)| VideoId::new(value.into_owned()));
    }

    None
}
