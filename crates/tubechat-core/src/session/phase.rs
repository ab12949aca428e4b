//! Session phase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The client's current belief about a session's remote processing state.
///
/// Every consumer matches exhaustively on this enum; there is no implicit
/// "string state" anywhere in the codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// The backend does not know the video yet; the user may start
    /// processing. Also the retry state after a failed processing run.
    Uninitialized,
    /// Processing is running server-side; a poll loop is watching it.
    Processing,
    /// The video is processed; questions can be asked.
    Ready,
    /// The session cannot proceed (no identifier, or backend unreachable
    /// during activation). The reason lives in `Session::last_error`.
    Errored,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Processing => "processing",
            Phase::Ready => "ready",
            Phase::Errored => "errored",
        };
        f.write_str(label)
    }
}
