//! Transport layer abstraction for mutation submission.

use crate::error::{ClientError, DispatchResult};
use async_trait::async_trait;
use bytes::Bytes;
use mutsync_protocol::JsonObject;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// A network transport delivers serialized mutations to the backend.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, WebSocket, scripted for testing, etc.).
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    /// Sends a serialized mutation and returns the backend's response.
    ///
    /// `Ok(None)` means the backend accepted the request without a body.
    async fn send(&self, payload: Bytes) -> DispatchResult<Option<JsonObject>>;
}

/// A transport that replays scripted outcomes, for testing.
///
/// Outcomes are consumed in order. Once the script runs out every send
/// returns the fallback outcome (an empty JSON object unless changed).
pub struct ScriptedTransport {
    script: Mutex<VecDeque<DispatchResult<Option<JsonObject>>>>,
    fallback: Mutex<DispatchResult<Option<JsonObject>>>,
    sent: Mutex<Vec<Bytes>>,
    sends: AtomicUsize,
    latency: Mutex<Duration>,
    connected: AtomicBool,
}

impl ScriptedTransport {
    /// Creates a transport that answers every send with an empty object.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(Some(JsonObject::new()))),
            sent: Mutex::new(Vec::new()),
            sends: AtomicUsize::new(0),
            latency: Mutex::new(Duration::ZERO),
            connected: AtomicBool::new(true),
        }
    }

    /// Queues an outcome for the next unscripted send.
    pub fn push_outcome(&self, outcome: DispatchResult<Option<JsonObject>>) {
        self.script.lock().push_back(outcome);
    }

    /// Queues a response body.
    pub fn push_response(&self, response: JsonObject) {
        self.push_outcome(Ok(Some(response)));
    }

    /// Sets the outcome returned once the script is exhausted.
    pub fn set_fallback(&self, outcome: DispatchResult<Option<JsonObject>>) {
        *self.fallback.lock() = outcome;
    }

    /// Delays every send by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Sets the connected state. A disconnected transport fails every send
    /// with [`ClientError::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Number of sends performed so far.
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Payloads received so far, in order.
    pub fn sent_payloads(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkTransport for ScriptedTransport {
    async fn send(&self, payload: Bytes) -> DispatchResult<Option<JsonObject>> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(payload);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected.into());
        }

        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;

    #[tokio::test]
    async fn scripted_outcomes_in_order() {
        let transport = ScriptedTransport::new();
        transport.push_outcome(Err(ClientError::Timeout.into()));
        transport.push_outcome(Ok(None));

        assert_eq!(
            transport.send(Bytes::from_static(b"a")).await,
            Err(DispatchError::Client(ClientError::Timeout))
        );
        assert_eq!(transport.send(Bytes::from_static(b"b")).await, Ok(None));
        assert_eq!(
            transport.send(Bytes::from_static(b"c")).await,
            Ok(Some(JsonObject::new()))
        );

        assert_eq!(transport.send_count(), 3);
        assert_eq!(transport.sent_payloads()[1], Bytes::from_static(b"b"));
    }

    #[tokio::test]
    async fn disconnected_transport() {
        let transport = ScriptedTransport::new();
        transport.set_connected(false);

        let result = transport.send(Bytes::from_static(b"x")).await;
        assert_eq!(result, Err(ClientError::NotConnected.into()));
    }
}
