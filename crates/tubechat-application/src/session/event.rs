//! Events streamed from the controller to the surface.

use tubechat_core::{ChatMessage, Phase};

/// One observable change to the current session.
///
/// The surface renders these as they arrive (status badge updates, chat
/// bubbles); it never reaches back into the controller's state to repaint.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session moved to a new phase.
    PhaseChanged(Phase),
    /// A message was appended to the transcript.
    Message(ChatMessage),
}
