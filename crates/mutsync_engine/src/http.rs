//! HTTP transport implementation.
//!
//! This module provides an HTTP-based transport that posts serialized
//! mutations to a GraphQL endpoint. The actual HTTP client is abstracted via
//! a trait to allow different implementations (reqwest, hyper, etc.).

use crate::error::{ClientError, DispatchResult};
use crate::transport::NetworkTransport;
use async_trait::async_trait;
use bytes::Bytes;
use mutsync_protocol::JsonObject;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Longest response body excerpt kept in error messages.
const BODY_EXCERPT_LEN: usize = 256;

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a `200 OK` response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response.
    ///
    /// `Err` means no response was received at all (DNS, connect, TLS...).
    async fn post(&self, url: &str, body: Bytes) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based mutation transport.
///
/// Posts the payload as-is and expects a JSON object back.
pub struct HttpTransport<C: HttpClient> {
    /// GraphQL endpoint (e.g., "https://api.example.com/graphql").
    endpoint: String,
    /// HTTP client implementation.
    client: C,
    /// Per-request timeout.
    timeout: Option<Duration>,
    /// Connection state.
    connected: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(endpoint: impl Into<String>, client: C) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            timeout: None,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Checks if the transport is connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    /// Closes the transport. Later sends fail with `NotConnected`.
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn fail(&self, err: ClientError) -> DispatchResult<Option<JsonObject>> {
        *self.last_error.write() = Some(err.to_string());
        Err(err.into())
    }

    async fn post(&self, body: Bytes) -> Result<HttpResponse, ClientError> {
        let request = self.client.post(&self.endpoint, body);
        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, request)
                .await
                .map_err(|_| ClientError::Timeout)?,
            None => request.await,
        };

        result.map_err(|message| ClientError::RequestFailed {
            status: None,
            message,
        })
    }
}

#[async_trait]
impl<C: HttpClient> NetworkTransport for HttpTransport<C> {
    async fn send(&self, payload: Bytes) -> DispatchResult<Option<JsonObject>> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected.into());
        }

        let response = match self.post(payload).await {
            Ok(response) => response,
            Err(err) => return self.fail(err),
        };
        debug!(
            endpoint = %self.endpoint,
            status = response.status,
            bytes = response.body.len(),
            "mutation response received"
        );

        if response.status == 401 || response.status == 403 {
            return self.fail(ClientError::Authentication(format!(
                "HTTP {}",
                response.status
            )));
        }

        if !response.is_success() {
            return self.fail(ClientError::RequestFailed {
                status: Some(response.status),
                message: body_excerpt(&response.body),
            });
        }

        if response.body.is_empty() {
            return self.fail(ClientError::NoData {
                status: Some(response.status),
            });
        }

        let value: Value = match serde_json::from_slice(&response.body) {
            Ok(value) => value,
            Err(e) => {
                return self.fail(ClientError::Parse {
                    message: e.to_string(),
                })
            }
        };

        *self.last_error.write() = None;

        match value {
            Value::Object(map) => Ok(Some(map)),
            Value::Null => Ok(None),
            other => self.fail(ClientError::Parse {
                message: format!("expected JSON object, got {}", json_kind(&other)),
            }),
        }
    }
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A loopback HTTP client that routes requests directly to an in-process
/// server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST request and returns the response.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<HttpResponse, String>;
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn post(&self, url: &str, body: Bytes) -> Result<HttpResponse, String> {
        // Strip scheme and authority
        let path = url
            .find("://")
            .map(|i| &url[i + 3..])
            .and_then(|rest| rest.find('/').map(|j| &rest[j..]))
            .unwrap_or(url);

        self.server.handle_post(path, &body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
