//! Shape of an orchestration endpoint response.
//!
//! Every call returns either an error carrying a human-readable message or a
//! success payload. For allocate calls the payload is the new identifier; for
//! `info` calls it is the entity document.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RpcResponse {
    Error { message: String },
    Success { payload: String },
}

impl RpcResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn success(payload: impl Into<String>) -> Self {
        Self::Success {
            payload: payload.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Error message, if the call failed.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            Self::Success { .. } => None,
        }
    }

    /// Success payload, if the call succeeded.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Error { .. } => None,
        }
    }

    /// Interpret the payload of an allocate call as a numeric identifier.
    pub fn parse_id(&self) -> Result<u64, FetchError> {
        match self {
            Self::Success { payload } => payload.trim().parse::<u64>().map_err(|_| {
                FetchError::Protocol(format!("expected numeric identifier, got '{payload}'"))
            }),
            Self::Error { message } => Err(FetchError::Rpc(message.clone())),
        }
    }

    pub fn into_result(self) -> Result<String, FetchError> {
        match self {
            Self::Success { payload } => Ok(payload),
            Self::Error { message } => Err(FetchError::Rpc(message)),
        }
    }
}
