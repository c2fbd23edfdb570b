//! The mutation dispatch operation.
//!
//! One operation drives one queued mutation through
//! upload -> submit -> classify -> (retry | complete):
//!
//! - A large object, if any, is uploaded first. An upload failure skips the
//!   submission and is classified like a submission error.
//! - A record without payload, or a released transport, completes at once
//!   as an empty success.
//! - Transient failures wait for the configured delay and re-run the whole
//!   pipeline inside the same task.
//! - A response is reported without error even if it carries a
//!   non-retryable backend error; the delegate inspects the snapshot.
//! - Terminal outcomes fire the completion hook inline, then notify the
//!   client's delegate on the callback queue.
//!
//! Cancellation is cooperative. It is checked before every attempt and after
//! every submission, and it cuts the retry delay short. It never interrupts
//! an upload or a submission already in flight.

use crate::classify::{classify, AttemptOutcome, Verdict, THROUGHPUT_EXCEEDED};
use crate::client::SyncClient;
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::queue::CallbackQueue;
use crate::state::OperationState;
use crate::transport::NetworkTransport;
use mutsync_protocol::{JsonObject, MutationRecord};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Hook invoked synchronously when an operation reports a terminal outcome.
pub type CompletionHook = Box<dyn FnOnce(&MutationOperation, Option<&DispatchError>) + Send>;

/// Dispatches one mutation record to the backend.
///
/// Cloning yields another handle to the same operation.
#[derive(Clone)]
pub struct MutationOperation {
    inner: Arc<Inner>,
}

struct Inner {
    client: Weak<dyn SyncClient>,
    transport: Weak<dyn NetworkTransport>,
    callback_queue: CallbackQueue,
    record: Arc<MutationRecord>,
    config: DispatchConfig,
    state: watch::Sender<OperationState>,
    cancel: CancellationToken,
    completion: Mutex<Option<CompletionHook>>,
    attempts: AtomicU32,
}

impl Drop for Inner {
    fn drop(&mut self) {
        trace!(record_id = %self.record.record_id, "operation released");
    }
}

impl MutationOperation {
    /// Creates an operation for `record`.
    ///
    /// The client and the transport are held weakly and never kept alive.
    pub fn new(
        client: Weak<dyn SyncClient>,
        transport: Weak<dyn NetworkTransport>,
        callback_queue: CallbackQueue,
        record: Arc<MutationRecord>,
        config: DispatchConfig,
    ) -> Self {
        let (state, _) = watch::channel(OperationState::Created);
        Self {
            inner: Arc::new(Inner {
                client,
                transport,
                callback_queue,
                record,
                config,
                state,
                cancel: CancellationToken::new(),
                completion: Mutex::new(None),
                attempts: AtomicU32::new(0),
            }),
        }
    }

    /// Sets the hook fired when the operation reports success or failure.
    ///
    /// The hook is not fired when cancellation suppresses the outcome.
    pub fn set_completion_hook(
        &self,
        hook: impl FnOnce(&MutationOperation, Option<&DispatchError>) + Send + 'static,
    ) {
        *self.inner.completion.lock() = Some(Box::new(hook));
    }

    /// The record being dispatched.
    pub fn record(&self) -> &MutationRecord {
        &self.inner.record
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OperationState {
        *self.inner.state.borrow()
    }

    /// Number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Returns true once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Returns true if both handles refer to the same operation.
    pub fn ptr_eq(&self, other: &MutationOperation) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Requests cancellation.
    ///
    /// Before `run` this makes the operation finish without any network work
    /// or notification. During an attempt it suppresses an error report and
    /// stops further retries. A returned response is still reported.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
        if self.transition(OperationState::Cancelled) {
            debug!(record_id = %self.inner.record.record_id, "cancelled before start");
        }
    }

    /// Spawns `run` on the current Tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let operation = self.clone();
        tokio::spawn(async move { operation.run().await })
    }

    /// Waits until the operation is finished.
    pub async fn finished(&self) {
        let mut state = self.inner.state.subscribe();
        let _ = state.wait_for(OperationState::is_finished).await;
    }

    /// Runs the operation to completion.
    ///
    /// Only the first call does anything.
    pub async fn run(&self) {
        let record_id = self.inner.record.record_id.as_str();

        if !self.transition(OperationState::Executing) {
            match self.state() {
                OperationState::Cancelled => {
                    self.transition(OperationState::Finished);
                }
                state => warn!(record_id, %state, "operation already started"),
            }
            return;
        }

        loop {
            if self.is_cancelled() {
                debug!(record_id, "cancelled before attempt");
                self.transition(OperationState::Finished);
                return;
            }

            let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(record_id, attempt, "starting attempt");

            let Some(outcome) = self.attempt().await else {
                warn!(record_id, "sync client released, abandoning mutation");
                self.transition(OperationState::Finished);
                return;
            };

            match classify(&self.inner.config, record_id, &outcome) {
                Verdict::Retry => {
                    let retry = &self.inner.config.retry;
                    if !retry.allows_attempt(attempt) {
                        warn!(record_id, attempts = attempt, "retries exhausted");
                        let last = outcome.terminal_error().unwrap_or_else(|| {
                            DispatchError::backend(THROUGHPUT_EXCEEDED, None)
                        });
                        let error = DispatchError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(last),
                        };
                        self.fail(outcome.response, error);
                        return;
                    }

                    let delay = retry.delay_for_retry(attempt);
                    debug!(record_id, attempt, ?delay, "waiting before retry");
                    tokio::select! {
                        _ = self.inner.cancel.cancelled() => {
                            debug!(record_id, "cancelled during retry delay");
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Verdict::Succeed => {
                    // Reported even when cancelled mid-flight
                    info!(record_id, attempts = attempt, "mutation succeeded");
                    self.notify_completion(outcome.response, None);
                    self.transition(OperationState::Finished);
                    return;
                }
                Verdict::Fail(error) => {
                    self.fail(outcome.response, error);
                    return;
                }
            }
        }
    }

    fn fail(&self, snapshot: Option<JsonObject>, error: DispatchError) {
        let record_id = self.inner.record.record_id.as_str();
        if self.is_cancelled() {
            debug!(record_id, %error, "cancelled, suppressing failure");
        } else {
            info!(record_id, %error, "mutation failed");
            self.notify_completion(snapshot, Some(error));
        }
        self.transition(OperationState::Finished);
    }

    /// Runs one upload-and-submit attempt.
    ///
    /// Returns `None` if the owning client has been released.
    async fn attempt(&self) -> Option<AttemptOutcome> {
        let record = &self.inner.record;

        let uploader = {
            let client = self.inner.client.upgrade()?;
            client.uploader()
        };

        if let Some(object) = &record.large_object {
            let Some(uploader) = uploader else {
                return Some(AttemptOutcome::failed(DispatchError::UploaderUnavailable));
            };

            debug!(record_id = %record.record_id, key = %object.key, "uploading large object");
            if let Err(err) = uploader.upload(object).await {
                debug!(record_id = %record.record_id, error = %err, "upload failed");
                return Some(AttemptOutcome::failed(err));
            }
        }

        Some(self.submit().await)
    }

    async fn submit(&self) -> AttemptOutcome {
        let record = &self.inner.record;

        let Some(payload) = record.payload.clone() else {
            debug!(record_id = %record.record_id, "no payload, nothing to submit");
            return AttemptOutcome::empty();
        };
        let Some(transport) = self.inner.transport.upgrade() else {
            warn!(record_id = %record.record_id, "transport released, skipping submission");
            return AttemptOutcome::empty();
        };

        match transport.send(payload).await {
            Ok(Some(response)) => AttemptOutcome::response(response),
            Ok(None) => AttemptOutcome::empty(),
            Err(err) => AttemptOutcome::failed(err),
        }
    }

    fn notify_completion(&self, snapshot: Option<JsonObject>, error: Option<DispatchError>) {
        let hook = self.inner.completion.lock().take();
        if let Some(hook) = hook {
            hook(self, error.as_ref());
        }

        let client = self.inner.client.clone();
        let record = Arc::clone(&self.inner.record);
        let queued = self.inner.callback_queue.dispatch(move || {
            let Some(delegate) = client.upgrade().and_then(|c| c.mutation_delegate()) else {
                debug!(record_id = %record.record_id, "no delegate, dropping notification");
                return;
            };
            delegate.mutation_callback(
                &record.record_id,
                &record.operation,
                snapshot.as_ref(),
                error.as_ref(),
            );
        });

        if !queued {
            warn!(
                record_id = %self.inner.record.record_id,
                queue = self.inner.callback_queue.label(),
                "callback queue closed, dropping notification"
            );
        }
    }

    fn transition(&self, next: OperationState) -> bool {
        let record_id = self.inner.record.record_id.as_str();
        self.inner.state.send_if_modified(|state| {
            if !state.can_transition_to(next) {
                return false;
            }
            debug!(record_id, from = %state, to = %next, "operation state");
            *state = next;
            true
        })
    }
}

impl fmt::Display for MutationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<MutationOperation record={} operation={} state={}>",
            self.inner.record.record_id,
            self.inner.record.operation,
            self.state()
        )
    }
}

impl fmt::Debug for MutationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationOperation")
            .field("record_id", &self.inner.record.record_id)
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}
