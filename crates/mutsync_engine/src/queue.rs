//! Serial callback queue for delegate notifications.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

tokio::task_local! {
    static CURRENT_QUEUE: Arc<str>;
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Flush(oneshot::Sender<()>),
}

/// A named serial executor.
///
/// Jobs run one at a time, in submission order, on a dedicated worker task.
/// A panicking job is logged and does not stop the queue. The worker exits
/// once every handle has been dropped.
#[derive(Clone)]
pub struct CallbackQueue {
    label: Arc<str>,
    sender: mpsc::UnboundedSender<Message>,
}

impl CallbackQueue {
    /// Creates a queue and spawns its worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(label: impl Into<String>) -> Self {
        let label: Arc<str> = Arc::from(label.into());
        let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();

        let worker_label = Arc::clone(&label);
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    Message::Run(job) => {
                        let outcome = CURRENT_QUEUE.sync_scope(Arc::clone(&worker_label), || {
                            catch_unwind(AssertUnwindSafe(job))
                        });
                        if outcome.is_err() {
                            error!(queue = %worker_label, "callback panicked");
                        }
                    }
                    Message::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!(queue = %worker_label, "callback queue closed");
        });

        Self { label, sender }
    }

    /// Returns the queue label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueues a job. Returns false if the worker is gone.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.sender.send(Message::Run(Box::new(job))).is_ok()
    }

    /// Waits until every job enqueued before this call has run.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Message::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Label of the callback queue running the current job, if any.
    pub fn current_label() -> Option<String> {
        CURRENT_QUEUE.try_with(|label| label.to_string()).ok()
    }
}

impl std::fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("label", &self.label)
            .finish()
    }
}
