//! Error types for the dispatch engine.

use mutsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Failures raised by the backend client layer.
///
/// Every variant is presumed transient: timeouts, lost connectivity,
/// malformed requests and rejected credentials all clear up once the
/// network or the session recovers, so the operation keeps retrying them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request could not be completed.
    #[error("request failed (status {status:?}): {message}")]
    RequestFailed {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Underlying failure.
        message: String,
    },

    /// The server answered without a body.
    #[error("no data in response (status {status:?})")]
    NoData {
        /// HTTP status of the empty response.
        status: Option<u16>,
    },

    /// The response body could not be parsed.
    #[error("failed to parse response: {message}")]
    Parse {
        /// Parser error.
        message: String,
    },

    /// The request was rejected for lack of valid credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The transport is not connected.
    #[error("not connected to backend")]
    NotConnected,

    /// The request timed out.
    #[error("request timed out")]
    Timeout,
}

/// Errors reported for a mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Backend client layer failure (always retried).
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// The large object could not be uploaded.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The record references a large object but no uploader is configured.
    #[error("no uploader configured for large object")]
    UploaderUnavailable,

    /// The backend rejected the mutation with a typed error.
    #[error("backend rejected mutation with {error_type}")]
    Backend {
        /// Backend error code.
        error_type: String,
        /// Backend message, if any.
        message: Option<String>,
    },

    /// The configured attempt cap was reached while the failure was still
    /// classified as transient.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Failure observed on the final attempt.
        last: Box<DispatchError>,
    },

    /// Protocol data error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl DispatchError {
    /// Creates an upload error.
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }

    /// Creates a backend error.
    pub fn backend(error_type: impl Into<String>, message: Option<String>) -> Self {
        Self::Backend {
            error_type: error_type.into(),
            message,
        }
    }

    /// Returns true if this error belongs to the backend client family.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DispatchError::Client(_))
    }

    /// Returns the client error, if this is one.
    pub fn as_client_error(&self) -> Option<&ClientError> {
        match self {
            DispatchError::Client(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_family() {
        assert!(DispatchError::from(ClientError::Timeout).is_client_error());
        assert!(DispatchError::from(ClientError::NotConnected).is_client_error());
        assert!(!DispatchError::upload("disk full").is_client_error());
        assert!(!DispatchError::UploaderUnavailable.is_client_error());
        assert!(!DispatchError::backend("DynamoDB:ConditionalCheckFailedException", None)
            .is_client_error());
    }

    #[test]
    fn error_display() {
        let err = DispatchError::from(ClientError::RequestFailed {
            status: Some(503),
            message: "service unavailable".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("service unavailable"));

        let err = DispatchError::RetriesExhausted {
            attempts: 3,
            last: Box::new(ClientError::Timeout.into()),
        };
        assert_eq!(
            err.to_string(),
            "gave up after 3 attempts: client error: request timed out"
        );
    }

    #[test]
    fn as_client_error() {
        let err = DispatchError::from(ClientError::Authentication("expired token".into()));
        assert_eq!(
            err.as_client_error(),
            Some(&ClientError::Authentication("expired token".into()))
        );
        assert_eq!(DispatchError::upload("x").as_client_error(), None);
    }
}
