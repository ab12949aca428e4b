//! Backend access layer for Tubechat.
//!
//! Talks HTTP/JSON to the remote processing/query backend and loads the
//! connection configuration. Everything above this crate depends only on the
//! [`tubechat_core::VideoQueryService`] trait.

pub mod backend_api;
pub mod config;

pub use backend_api::BackendApiClient;
pub use config::{BackendConfig, ENV_BASE_URL, load_backend_config, load_backend_config_from};
