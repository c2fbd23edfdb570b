//! Inspection of backend responses.
//!
//! The backend answers a mutation with a loosely-typed JSON object. Only the
//! GraphQL `errors` list is interpreted here, and only its first entry:
//!
//! ```json
//! { "data": null, "errors": [ { "errorType": "...", "message": "..." } ] }
//! ```

use serde_json::Value;

/// A JSON object as returned by the backend.
pub type JsonObject = serde_json::Map<String, Value>;

fn first_error(response: &JsonObject) -> Option<&Value> {
    response.get("errors")?.as_array()?.first()
}

/// Returns `errors[0].errorType` if present and a string.
pub fn error_type(response: &JsonObject) -> Option<&str> {
    first_error(response)?.get("errorType")?.as_str()
}

/// Returns `errors[0].message` if present and a string.
pub fn error_message(response: &JsonObject) -> Option<&str> {
    first_error(response)?.get("message")?.as_str()
}

/// The first backend error of a response, in owned form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// Backend error code, e.g. `DynamoDB:ConditionalCheckFailedException`.
    pub error_type: String,
    /// Human readable message.
    pub message: Option<String>,
}

impl BackendError {
    /// Extracts the first typed error from a response.
    ///
    /// Returns `None` when the response carries no `errorType`.
    pub fn from_response(response: &JsonObject) -> Option<Self> {
        let error_type = error_type(response)?;
        Some(Self {
            error_type: error_type.to_string(),
            message: error_message(response).map(str::to_string),
        })
    }
}
