//! Domain layer for Tubechat.
//!
//! Pure types and contracts shared by every other crate: the video
//! identifier and its extraction rules, the session model, the remote
//! backend trait, and the shared error type. Nothing in here performs I/O.

pub mod error;
pub mod service;
pub mod session;
pub mod video;

// Re-export common error type
pub use error::{Result, TubechatError};
pub use service::{RemoteState, VideoQueryService, VideoStatus};
pub use session::{ChatMessage, MessageRole, Phase, Session};
pub use video::{VideoId, extract_video_id};
