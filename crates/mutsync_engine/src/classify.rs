//! Outcome classification and the retry predicate.

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use mutsync_protocol::{error_type, BackendError, JsonObject};
use tracing::debug;

/// Backend error code signalling that the storage layer's write throughput
/// was exceeded. Retrying later succeeds.
pub const THROUGHPUT_EXCEEDED: &str = "DynamoDB:ProvisionedThroughputExceededException";

/// Default retry predicate.
///
/// - Any client-family error retries, whatever `error_type` says.
/// - Otherwise only [`THROUGHPUT_EXCEEDED`] retries.
/// - Any other error type (uniqueness violations, oversize items, ...) is a
///   permanent failure, as is an error outside the client family.
pub fn should_retry(error_type: Option<&str>, error: Option<&DispatchError>) -> bool {
    if error.is_some_and(DispatchError::is_client_error) {
        return true;
    }
    error_type == Some(THROUGHPUT_EXCEEDED)
}

/// Result of one upload-and-submit attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptOutcome {
    /// Response returned by the backend, if any.
    pub response: Option<JsonObject>,
    /// Error raised by the upload or the submission, if any.
    pub error: Option<DispatchError>,
}

impl AttemptOutcome {
    /// An outcome with neither data nor error (the no-op path).
    pub fn empty() -> Self {
        Self::default()
    }

    /// An outcome carrying a backend response.
    pub fn response(response: JsonObject) -> Self {
        Self {
            response: Some(response),
            error: None,
        }
    }

    /// An outcome carrying an error and no data.
    pub fn failed(error: DispatchError) -> Self {
        Self {
            response: None,
            error: Some(error),
        }
    }

    /// Returns `errors[0].errorType` of the response, if any.
    pub fn error_type(&self) -> Option<&str> {
        self.response.as_ref().and_then(error_type)
    }

    /// The cause recorded when retries run out on this outcome.
    ///
    /// A transport or upload error wins. Otherwise a typed backend error in
    /// the response is reported as [`DispatchError::Backend`].
    pub fn terminal_error(&self) -> Option<DispatchError> {
        if let Some(err) = &self.error {
            return Some(err.clone());
        }
        self.response
            .as_ref()
            .and_then(BackendError::from_response)
            .map(|e| DispatchError::backend(e.error_type, e.message))
    }
}

/// What the operation does with an attempt outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Wait and run the pipeline again.
    Retry,
    /// Report the response with no error.
    ///
    /// The response may still carry a non-retryable `errors` entry; it is
    /// handed to the delegate as part of the snapshot.
    Succeed,
    /// Report the upload or submission error.
    Fail(DispatchError),
}

/// Classifies an attempt outcome under the given configuration.
pub fn classify(config: &DispatchConfig, record_id: &str, outcome: &AttemptOutcome) -> Verdict {
    let error_type = outcome.error_type();
    let error = outcome.error.as_ref();

    if config.should_retry(error_type, error) {
        match error.and_then(DispatchError::as_client_error) {
            Some(client_error) => {
                debug!(record_id, error = %client_error, "retrying mutation after client error");
            }
            None => {
                debug!(record_id, error_type, "retrying mutation after transient backend error");
            }
        }
        return Verdict::Retry;
    }

    let Some(error) = error else {
        if let Some(error_type) = error_type {
            debug!(record_id, error_type, "backend rejected mutation, reporting response");
        }
        return Verdict::Succeed;
    };

    debug!(record_id, %error, "mutation failed permanently");
    Verdict::Fail(error.clone())
}
