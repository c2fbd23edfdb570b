//! Large-object upload abstraction.

use crate::error::{DispatchError, DispatchResult};
use async_trait::async_trait;
use mutsync_protocol::LargeObject;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Uploads large objects to blob storage ahead of the mutation that
/// references them.
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    /// Uploads the object described by `object`.
    ///
    /// Client-family errors are retried by the operation like any other
    /// client error; everything else fails the mutation.
    async fn upload(&self, object: &LargeObject) -> DispatchResult<()>;
}

/// An uploader that replays scripted outcomes, for testing.
///
/// Succeeds once the script is exhausted.
#[derive(Default)]
pub struct MockUploader {
    script: Mutex<VecDeque<DispatchResult<()>>>,
    uploaded: Mutex<Vec<LargeObject>>,
    calls: AtomicUsize,
}

impl MockUploader {
    /// Creates an uploader that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an uploader whose first upload fails with `error`.
    pub fn failing(error: DispatchError) -> Self {
        let uploader = Self::new();
        uploader.push_outcome(Err(error));
        uploader
    }

    /// Queues an outcome for the next unscripted upload.
    pub fn push_outcome(&self, outcome: DispatchResult<()>) {
        self.script.lock().push_back(outcome);
    }

    /// Number of upload calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Objects uploaded successfully, in order.
    pub fn uploaded(&self) -> Vec<LargeObject> {
        self.uploaded.lock().clone()
    }
}

#[async_trait]
impl ObjectUploader for MockUploader {
    async fn upload(&self, object: &LargeObject) -> DispatchResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let outcome = self.script.lock().pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.uploaded.lock().push(object.clone());
        }
        outcome
    }
}
