//! Per-job error taxonomy.
//!
//! A [`FetchError`] is never propagated out of a batch. Workers fold it into
//! the job's result, and the batch keeps going.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Classification of a per-job failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection error or timeout
    Network,
    /// The remote side answered, but not with success
    Application,
    /// The provider could not allocate or open what it needed
    ResourceExhausted,
    /// The batch was cancelled before or during the job
    Cancelled,
    /// The provider panicked
    Internal,
}

/// Error produced by a single job's I/O
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The job did not finish within its timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success application status
    #[error("Unexpected status {code}")]
    Status {
        /// Status code returned by the remote side
        code: u16,
    },

    /// The response payload could not be read
    #[error("Body read error: {0}")]
    Body(String),

    /// The response payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The provider ran out of a resource it needed for the call
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The batch was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// The provider panicked while executing the job
    #[error("Provider panicked: {0}")]
    Panicked(String),
}

impl FetchError {
    /// Stable code for reports and logs
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "CONNECTION_ERROR",
            FetchError::Timeout(_) => "TIMEOUT",
            FetchError::Status { .. } => "HTTP_STATUS",
            FetchError::Body(_) => "BODY_ERROR",
            FetchError::Decode(_) => "DECODE_ERROR",
            FetchError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            FetchError::Cancelled => "CANCELLED",
            FetchError::Panicked(_) => "PANICKED",
        }
    }

    /// Map the error onto the failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transport(_) | FetchError::Timeout(_) => FailureKind::Network,
            FetchError::Status { .. } | FetchError::Body(_) | FetchError::Decode(_) => {
                FailureKind::Application
            }
            FetchError::ResourceExhausted(_) => FailureKind::ResourceExhausted,
            FetchError::Cancelled => FailureKind::Cancelled,
            FetchError::Panicked(_) => FailureKind::Internal,
        }
    }

    /// Build a [`FetchError::Panicked`] from a caught panic payload
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        FetchError::Panicked(message)
    }
}
