//! Error types for Service Layer session operations.

use thiserror::Error;

/// Result type alias using [`SlError`].
pub type Result<T> = std::result::Result<T, SlError>;

/// Errors that can occur while managing a Service Layer session.
///
/// All errors implement `std::error::Error` and can be chained with `source()`.
/// Error messages never contain session tokens or passwords.
#[derive(Debug, Error)]
pub enum SlError {
    /// Connection settings are missing or malformed. Fatal until an
    /// operator corrects the configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The Service Layer host could not be reached.
    #[error("Service Layer unreachable: {0}")]
    Network(String),

    /// The Service Layer did not answer within the configured timeout.
    #[error("Service Layer request timed out after {0}s")]
    Timeout(u64),

    /// Login was rejected by the Service Layer, or a local operator
    /// password re-entry did not match.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// The cached session has passed its expiry time.
    #[error("session expired")]
    SessionExpired,

    /// An operation that needs a cached session was called without one.
    #[error("no active session")]
    NotAuthenticated,

    /// The Service Layer answered with a payload this crate does not
    /// understand.
    #[error("unexpected Service Layer response: {0}")]
    UnexpectedResponse(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SlError {
    /// Returns an actionable troubleshooting hint for operator-facing
    /// surfaces, or `None` when no generic advice applies.
    ///
    /// Hints never include secret material.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Configuration(_) => {
                Some("complete the Service Layer connection settings before retrying")
            }
            Self::Network(_) | Self::Timeout(_) => Some(
                "check that the Service Layer base URL is correct and the host is reachable from this server",
            ),
            Self::Authentication(_) => {
                Some("verify the company database name, username, and password")
            }
            Self::SessionExpired | Self::NotAuthenticated => {
                Some("reset the token to establish a fresh session")
            }
            Self::UnexpectedResponse(_) => {
                Some("confirm the base URL points at a SAP B1 Service Layer instance and retry")
            }
            _ => None,
        }
    }

    /// Whether the caller may simply retry the failed operation.
    ///
    /// Configuration problems are not retryable until corrected; everything
    /// else in the taxonomy is recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = SlError::Authentication("login rejected by server".to_string());
        assert_eq!(
            err.to_string(),
            "authentication rejected: login rejected by server"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = SlError::Timeout(30);
        assert_eq!(err.to_string(), "Service Layer request timed out after 30s");
    }

    #[test]
    fn test_hints_present_for_operator_errors() {
        assert!(SlError::Network("connection refused".into()).hint().is_some());
        assert!(SlError::Authentication("bad password".into()).hint().is_some());
        assert!(SlError::Configuration("missing base_url".into())
            .hint()
            .is_some());
        assert!(SlError::UnexpectedResponse("html body".into())
            .hint()
            .is_some());
    }

    #[test]
    fn test_recoverability() {
        assert!(!SlError::Configuration("missing username".into()).is_recoverable());
        assert!(SlError::Network("timed out".into()).is_recoverable());
        assert!(SlError::Authentication("rejected".into()).is_recoverable());
    }

    #[test]
    fn test_error_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = SlError::from(io);
        assert!(err.source().is_some());
    }
}
