//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use mutsync_engine::{
    CallbackQueue, DispatchConfig, DispatchError, JsonObject, LargeObject, MemorySyncClient,
    MockUploader, MutationOperation, MutationRecord, NetworkTransport, RecordingDelegate,
    ScriptedTransport, SyncClient,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing_subscriber::EnvFilter;

pub const QUEUE_LABEL: &str = "test.callbacks";

/// Installs a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One completion hook invocation.
#[derive(Debug, Clone)]
pub struct HookCall {
    pub record_id: String,
    pub error: Option<DispatchError>,
    pub queue: Option<String>,
}

/// A client, transport, uploader and delegate wired together.
pub struct Harness {
    pub client: Arc<MemorySyncClient>,
    pub transport: Arc<ScriptedTransport>,
    pub uploader: Arc<MockUploader>,
    pub delegate: Arc<RecordingDelegate>,
    pub queue: CallbackQueue,
    pub hook_calls: Arc<Mutex<Vec<HookCall>>>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();

        let client = Arc::new(MemorySyncClient::new());
        let uploader = Arc::new(MockUploader::new());
        let delegate = Arc::new(RecordingDelegate::new());
        client.set_uploader(uploader.clone());
        client.set_delegate(&delegate);

        Self {
            client,
            transport: Arc::new(ScriptedTransport::new()),
            uploader,
            delegate,
            queue: CallbackQueue::new(QUEUE_LABEL),
            hook_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replaces the uploader registered with the client.
    pub fn with_uploader(mut self, uploader: MockUploader) -> Self {
        self.uploader = Arc::new(uploader);
        self.client.set_uploader(self.uploader.clone());
        self
    }

    pub fn client_handle(&self) -> Weak<dyn SyncClient> {
        let weak: Weak<MemorySyncClient> = Arc::downgrade(&self.client);
        weak
    }

    pub fn transport_handle(&self) -> Weak<dyn NetworkTransport> {
        let weak: Weak<ScriptedTransport> = Arc::downgrade(&self.transport);
        weak
    }

    /// Builds an operation with a hook that records into `hook_calls`.
    pub fn operation(&self, record: MutationRecord, config: DispatchConfig) -> MutationOperation {
        let operation = MutationOperation::new(
            self.client_handle(),
            self.transport_handle(),
            self.queue.clone(),
            Arc::new(record),
            config,
        );

        let calls = Arc::clone(&self.hook_calls);
        operation.set_completion_hook(move |operation, error| {
            calls.lock().push(HookCall {
                record_id: operation.record().record_id.clone(),
                error: error.cloned(),
                queue: CallbackQueue::current_label(),
            });
        });
        operation
    }

    pub fn hook_calls(&self) -> Vec<HookCall> {
        self.hook_calls.lock().clone()
    }

    /// Waits for pending delegate notifications.
    pub async fn settle(&self) {
        self.queue.flush().await;
    }
}

pub fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub fn error_response(error_type: &str) -> JsonObject {
    object(serde_json::json!({
        "data": null,
        "errors": [{ "errorType": error_type, "message": "rejected by backend" }]
    }))
}

pub fn mutation(id: &str) -> MutationRecord {
    MutationRecord::with_id(id, "createPost")
        .with_payload(&br#"{"query":"mutation { createPost(title: \"hi\") { id } }"}"#[..])
}

pub fn photo() -> LargeObject {
    LargeObject::new(
        "uploads",
        "photos/cat.png",
        "us-east-1",
        "image/png",
        "/tmp/cat.png",
    )
}
