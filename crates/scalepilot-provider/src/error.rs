//! Provider error types.

use std::time::Duration;

use scalepilot_core::InstanceStatus;
use thiserror::Error;

use crate::api::PowerAction;

/// Result type alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors returned by a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("timed out after {timeout:?} waiting for {action} on server {server_id}")]
    Timeout {
        server_id: String,
        action: PowerAction,
        timeout: Duration,
    },

    #[error("server {server_id} entered state {status} during {action}")]
    UnexpectedState {
        server_id: String,
        action: PowerAction,
        status: InstanceStatus,
    },

    #[error("no zone on the request and no default zone configured")]
    NoZone,

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}
