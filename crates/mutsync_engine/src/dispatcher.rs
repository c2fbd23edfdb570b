//! In-flight mutation tracking for one sync client.

use crate::client::SyncClient;
use crate::config::DispatchConfig;
use crate::error::DispatchResult;
use crate::operation::MutationOperation;
use crate::queue::CallbackQueue;
use crate::transport::NetworkTransport;
use mutsync_protocol::MutationRecord;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

type Registry = Mutex<HashMap<String, MutationOperation>>;

/// Starts dispatch operations and tracks them until they finish.
///
/// Operations are keyed by record identifier. An operation leaves the
/// registry through its completion hook or once its task returns, so a
/// cancelled operation stays registered until any submission it has in
/// flight completes. Dropping the dispatcher cancels everything still in
/// flight.
pub struct MutationDispatcher {
    client: Weak<dyn SyncClient>,
    transport: Weak<dyn NetworkTransport>,
    callback_queue: CallbackQueue,
    config: DispatchConfig,
    in_flight: Arc<Registry>,
}

impl MutationDispatcher {
    /// Creates a dispatcher and its callback queue.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        client: Weak<dyn SyncClient>,
        transport: Weak<dyn NetworkTransport>,
        config: DispatchConfig,
    ) -> Self {
        let callback_queue = CallbackQueue::new(config.callback_queue_label.clone());
        Self {
            client,
            transport,
            callback_queue,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The queue delegate notifications are delivered on.
    pub fn callback_queue(&self) -> &CallbackQueue {
        &self.callback_queue
    }

    /// Starts dispatching `record`.
    ///
    /// If an operation for the same record id is still in flight, that
    /// operation is returned and nothing new is started. This holds for a
    /// cancelled operation whose submission has not returned yet.
    pub fn dispatch(&self, record: MutationRecord) -> MutationOperation {
        let mut in_flight = self.in_flight.lock();
        if let Some(existing) = in_flight.get(&record.record_id) {
            debug!(record_id = %record.record_id, "mutation already in flight");
            return existing.clone();
        }

        let record_id = record.record_id.clone();
        let operation = MutationOperation::new(
            self.client.clone(),
            self.transport.clone(),
            self.callback_queue.clone(),
            Arc::new(record),
            self.config.clone(),
        );

        let registry = Arc::downgrade(&self.in_flight);
        operation.set_completion_hook(move |operation, error| {
            debug!(
                record_id = %operation.record().record_id,
                failed = error.is_some(),
                "dequeuing completed mutation"
            );
            remove(&registry, operation);
        });

        in_flight.insert(record_id, operation.clone());
        drop(in_flight);

        let registry = Arc::downgrade(&self.in_flight);
        let running = operation.clone();
        tokio::spawn(async move {
            running.run().await;
            // Cancelled and abandoned operations never fire their hook
            remove(&registry, &running);
        });

        operation
    }

    /// Decodes a persisted record and dispatches it.
    pub fn dispatch_encoded(&self, bytes: &[u8]) -> DispatchResult<MutationOperation> {
        let record = MutationRecord::decode(bytes)?;
        Ok(self.dispatch(record))
    }

    /// Cancels the operation for `record_id`. Returns false if none was in
    /// flight or it was already cancelled.
    ///
    /// The operation remains in flight until its task winds down.
    pub fn cancel(&self, record_id: &str) -> bool {
        let operation = self.in_flight.lock().get(record_id).cloned();
        match operation {
            Some(operation) if !operation.is_cancelled() => {
                operation.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancels every in-flight operation.
    pub fn cancel_all(&self) {
        let operations: Vec<_> = self
            .in_flight
            .lock()
            .values()
            .filter(|op| !op.is_cancelled())
            .cloned()
            .collect();
        if !operations.is_empty() {
            info!(count = operations.len(), "cancelling in-flight mutations");
        }
        for operation in operations {
            operation.cancel();
        }
    }

    /// Number of operations in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Returns true if an operation for `record_id` is in flight.
    pub fn is_in_flight(&self, record_id: &str) -> bool {
        self.in_flight.lock().contains_key(record_id)
    }
}

impl Drop for MutationDispatcher {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn remove(registry: &Weak<Registry>, operation: &MutationOperation) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let mut in_flight = registry.lock();
    let record_id = &operation.record().record_id;
    if in_flight
        .get(record_id)
        .is_some_and(|current| current.ptr_eq(operation))
    {
        in_flight.remove(record_id);
    }
}
