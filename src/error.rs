use serde_json::Value;
use strum_macros::Display;
use thiserror::Error;

use crate::rules::cash_advance::ValidationError;

/// Which external service a request was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Service {
    #[strum(serialize = "payroll server")]
    Backend,
    #[strum(serialize = "fingerprint bridge")]
    Bridge,
}

/// The single error type every API module returns.
///
/// Deduplicated callers all receive a clone of the same error, hence
/// `Clone` and string payloads instead of wrapped source errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("{service} is unreachable: {message}")]
    Unreachable { service: Service, message: String },

    #[error("request to {service} timed out")]
    Timeout { service: Service },

    #[error("{message}")]
    Backend { status: u16, message: String },

    /// 2xx response carrying `{ success: false, message }`.
    #[error("{0}")]
    Rejected(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("request failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// True when the remote side could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Unreachable { .. } | ApiError::Timeout { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text suitable for a toast or inline banner.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unreachable {
                service: Service::Bridge,
                ..
            } => "Fingerprint bridge is not running. Start the bridge service on this machine and try again."
                .to_string(),
            ApiError::Unreachable {
                service: Service::Backend,
                ..
            } => "Cannot reach the payroll server. Check that it is running and try again.".to_string(),
            ApiError::Timeout { service } => format!("The {service} took too long to respond."),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Pulls a human readable message out of an error body:
/// `message`, then `error`, whichever is a string first.
pub fn extract_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str))
        .map(str::to_owned)
}
