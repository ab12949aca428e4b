//! Session control.
//!
//! - `controller`: the session lifecycle owner (`SessionController`)
//! - `poll`: the cancellable status poll loop (`PollConfig`, `PollHandle`)
//! - `event`: changes streamed to the surface (`SessionEvent`)

mod controller;
mod event;
mod poll;

pub use controller::{PageContext, SessionController};
pub use event::SessionEvent;
pub use poll::{PollConfig, PollHandle};
