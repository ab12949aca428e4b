//! Error types for the Tubechat application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Tubechat application.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum TubechatError {
    /// Network-level failure: connection refused, timeout, DNS, or a body
    /// that could not be read or parsed as JSON.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success HTTP status.
    #[error("Backend error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TubechatError {
    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Server error
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Convenience result type using [`TubechatError`].
pub type Result<T> = std::result::Result<T, TubechatError>;
