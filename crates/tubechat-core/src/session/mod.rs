//! Session domain module.
//!
//! - `model`: the session itself (`Session`)
//! - `message`: transcript types (`MessageRole`, `ChatMessage`)
//! - `phase`: session state (`Phase`)

mod message;
mod model;
mod phase;

pub use message::{ChatMessage, MessageRole};
pub use model::Session;
pub use phase::Phase;
