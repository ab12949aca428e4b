//! Application layer for Tubechat.
//!
//! Hosts the session controller that mediates between a user-facing surface
//! and the backend: activation and status resolution, the
//! begin-processing request, the poll loop that watches server-side
//! processing, and the ask/answer exchange.

pub mod session;

pub use session::{PageContext, PollConfig, PollHandle, SessionController, SessionEvent};
