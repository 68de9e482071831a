//! The `error` module defines the error type used across `topichub`.
//!
//! Errors only ever describe a single connection or the startup path. A
//! failure on one peer's socket is logged and turned into a disconnect for
//! that peer; it is never propagated to other connections.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;
