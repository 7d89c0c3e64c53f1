//! Request error taxonomy

use crate::call::RetryableCall;

/// Why a request did not produce a payload.
///
/// Only `AuthenticationRequired` is recoverable, by handing its call to the
/// challenge coordinator. Everything else goes straight back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Transport failure: connect error, timeout, truncated body.
    #[error("network error: {0}")]
    Network(String),

    /// The store credential was rejected. A deployment problem, not a user one.
    #[error("configuration error: store credential is invalid")]
    Configuration,

    /// The end user must sign in; the call can be replayed afterwards.
    #[error("authentication required for {} {}", .0.method(), .0.path())]
    AuthenticationRequired(RetryableCall),

    /// Any other non-2xx response.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// A force-reauth executor got 401/403; the token is gone.
    #[error("session expired, sign in again at {login_path}")]
    SessionExpired { login_path: String },

    /// 2xx response whose JSON body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl RequestError {
    pub fn is_authentication_required(&self) -> bool {
        matches!(self, RequestError::AuthenticationRequired(_))
    }

    /// HTTP status, for the kinds that have one.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text to show next to the UI element that triggered the call.
    ///
    /// `AuthenticationRequired` has none: it shows up as the login prompt.
    pub fn user_message(&self) -> Option<String> {
        match self {
            RequestError::AuthenticationRequired(_) => None,
            RequestError::Configuration => {
                Some("Configuration error: the store credential is invalid".to_string())
            }
            other => Some(other.to_string()),
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, RequestError>;
