//! The owning sync client and its mutation delegate.

use crate::error::DispatchError;
use crate::queue::CallbackQueue;
use crate::upload::ObjectUploader;
use mutsync_protocol::JsonObject;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

/// The offline-first client that owns dispatch operations.
///
/// Operations hold the client weakly and only reach it for the uploader
/// and the delegate.
pub trait SyncClient: Send + Sync {
    /// The uploader for large objects, if configured.
    fn uploader(&self) -> Option<Arc<dyn ObjectUploader>>;

    /// The listener notified of terminal mutation outcomes, if still alive.
    fn mutation_delegate(&self) -> Option<Arc<dyn MutationDelegate>>;
}

/// Listener notified of each mutation's terminal outcome.
///
/// Called on the client's callback queue, never concurrently from the same
/// queue, but notifications for different records may interleave.
pub trait MutationDelegate: Send + Sync {
    /// Reports the terminal outcome of a mutation.
    fn mutation_callback(
        &self,
        record_id: &str,
        operation: &str,
        snapshot: Option<&JsonObject>,
        error: Option<&DispatchError>,
    );
}

/// An in-memory sync client for testing and embedding.
///
/// Holds the uploader strongly and the delegate weakly.
#[derive(Default)]
pub struct MemorySyncClient {
    uploader: RwLock<Option<Arc<dyn ObjectUploader>>>,
    delegate: RwLock<Option<Weak<dyn MutationDelegate>>>,
}

impl MemorySyncClient {
    /// Creates a client with no uploader and no delegate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the uploader.
    pub fn set_uploader(&self, uploader: Arc<dyn ObjectUploader>) {
        *self.uploader.write() = Some(uploader);
    }

    /// Registers the delegate. The client does not keep it alive.
    pub fn set_delegate<D: MutationDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak: Weak<D> = Arc::downgrade(delegate);
        *self.delegate.write() = Some(weak);
    }

    /// Unregisters the delegate.
    pub fn clear_delegate(&self) {
        *self.delegate.write() = None;
    }
}

impl SyncClient for MemorySyncClient {
    fn uploader(&self) -> Option<Arc<dyn ObjectUploader>> {
        self.uploader.read().clone()
    }

    fn mutation_delegate(&self) -> Option<Arc<dyn MutationDelegate>> {
        self.delegate.read().as_ref().and_then(Weak::upgrade)
    }
}

/// One delegate notification as seen by [`RecordingDelegate`].
#[derive(Debug, Clone, PartialEq)]
pub struct MutationNotification {
    /// Record identifier.
    pub record_id: String,
    /// Operation descriptor.
    pub operation: String,
    /// Result snapshot.
    pub snapshot: Option<JsonObject>,
    /// Reported error.
    pub error: Option<DispatchError>,
    /// Callback queue the notification was delivered on.
    pub queue: Option<String>,
}

/// A delegate that records every notification, for testing.
#[derive(Default)]
pub struct RecordingDelegate {
    notifications: Mutex<Vec<MutationNotification>>,
}

impl RecordingDelegate {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far, in order.
    pub fn notifications(&self) -> Vec<MutationNotification> {
        self.notifications.lock().clone()
    }

    /// Number of notifications received.
    pub fn count(&self) -> usize {
        self.notifications.lock().len()
    }
}

impl MutationDelegate for RecordingDelegate {
    fn mutation_callback(
        &self,
        record_id: &str,
        operation: &str,
        snapshot: Option<&JsonObject>,
        error: Option<&DispatchError>,
    ) {
        self.notifications.lock().push(MutationNotification {
            record_id: record_id.to_string(),
            operation: operation.to_string(),
            snapshot: snapshot.cloned(),
            error: error.cloned(),
            queue: CallbackQueue::current_label(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::MockUploader;

    #[test]
    fn delegate_is_held_weakly() {
        let client = MemorySyncClient::new();
        let delegate = Arc::new(RecordingDelegate::new());
        client.set_delegate(&delegate);
        assert!(client.mutation_delegate().is_some());

        drop(delegate);
        assert!(client.mutation_delegate().is_none());
    }

    #[test]
    fn clear_delegate() {
        let client = MemorySyncClient::new();
        let delegate = Arc::new(RecordingDelegate::new());
        client.set_delegate(&delegate);
        client.clear_delegate();
        assert!(client.mutation_delegate().is_none());
    }

    #[test]
    fn uploader_is_optional() {
        let client = MemorySyncClient::new();
        assert!(client.uploader().is_none());

        client.set_uploader(Arc::new(MockUploader::new()));
        assert!(client.uploader().is_some());
    }

    #[test]
    fn recording_delegate_outside_queue() {
        let delegate = RecordingDelegate::new();
        delegate.mutation_callback("r1", "createPost", None, None);

        let seen = delegate.notifications();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].record_id, "r1");
        assert_eq!(seen[0].queue, None);
    }
}
