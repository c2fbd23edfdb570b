//! Mutation records.

use crate::error::{ProtocolError, ProtocolResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Descriptor of a blob that must reach object storage before the mutation
/// referencing it is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeObject {
    /// Destination bucket.
    pub bucket: String,
    /// Destination key within the bucket.
    pub key: String,
    /// Storage region.
    pub region: String,
    /// MIME type of the blob.
    pub content_type: String,
    /// Location of the blob on the local filesystem.
    pub local_path: PathBuf,
}

impl LargeObject {
    /// Creates a new large-object descriptor.
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        region: impl Into<String>,
        content_type: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            region: region.into(),
            content_type: content_type.into(),
            local_path: local_path.into(),
        }
    }
}

/// One locally queued write awaiting submission to the backend.
///
/// Records are owned by the durable queue. The dispatch engine only ever
/// reads them.
///
/// # Fields
///
/// - `record_id`: Stable identifier used for correlation and logging
/// - `operation`: Name of the mutation's operation, reported to the delegate
/// - `payload`: Serialized request sent to the backend, if any
/// - `large_object`: Blob to upload before submission, if any
/// - `recorded_at`: Milliseconds since the Unix epoch when the write was queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Stable record identifier.
    pub record_id: String,
    /// Operation descriptor.
    pub operation: String,
    /// Serialized request data.
    pub payload: Option<Bytes>,
    /// Blob to upload ahead of the mutation.
    pub large_object: Option<LargeObject>,
    /// Enqueue time in Unix milliseconds.
    pub recorded_at: u64,
}

impl MutationRecord {
    /// Creates a record with a fresh identifier and no payload.
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), operation)
    }

    /// Creates a record with an explicit identifier.
    pub fn with_id(record_id: impl Into<String>, operation: impl Into<String>) -> Self {
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            record_id: record_id.into(),
            operation: operation.into(),
            payload: None,
            large_object: None,
            recorded_at,
        }
    }

    /// Attaches the serialized request data.
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Attaches a large object to upload before submission.
    pub fn with_large_object(mut self, object: LargeObject) -> Self {
        self.large_object = Some(object);
        self
    }

    /// Returns true if dispatching this record has nothing to do.
    pub fn is_noop(&self) -> bool {
        self.payload.is_none() && self.large_object.is_none()
    }

    /// Returns the payload size in bytes (0 when absent).
    pub fn payload_size(&self) -> usize {
        self.payload.as_ref().map_or(0, Bytes::len)
    }

    /// Encodes the record to CBOR for the durable queue.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(64 + self.payload_size());
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a record from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let record: Self =
            ciborium::from_reader(bytes).map_err(|e| ProtocolError::decoding(e.to_string()))?;

        if record.record_id.is_empty() {
            return Err(ProtocolError::invalid_record("empty record id"));
        }
        if record.operation.is_empty() {
            return Err(ProtocolError::invalid_record("empty operation descriptor"));
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> LargeObject {
        LargeObject::new(
            "uploads",
            "photos/cat.png",
            "us-east-1",
            "image/png",
            "/tmp/cat.png",
        )
    }

    #[test]
    fn new_record_has_unique_id() {
        let a = MutationRecord::new("createPost");
        let b = MutationRecord::new("createPost");
        assert_ne!(a.record_id, b.record_id);
        assert_eq!(a.operation, "createPost");
        assert!(a.recorded_at > 0);
    }

    #[test]
    fn noop_detection() {
        let record = MutationRecord::with_id("r1", "deletePost");
        assert!(record.is_noop());

        let record = MutationRecord::with_id("r2", "deletePost").with_payload(&b"{}"[..]);
        assert!(!record.is_noop());

        let record = MutationRecord::with_id("r3", "addPhoto").with_large_object(photo());
        assert!(!record.is_noop());
    }

    #[test]
    fn record_roundtrip() {
        let record = MutationRecord::with_id("r1", "addPhoto")
            .with_payload(&b"{\"query\":\"mutation { addPhoto }\"}"[..])
            .with_large_object(photo());

        let bytes = record.encode().unwrap();
        let decoded = MutationRecord::decode(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn payload_size() {
        let record = MutationRecord::with_id("r1", "op").with_payload(vec![1u8, 2, 3]);
        assert_eq!(record.payload_size(), 3);
        assert_eq!(MutationRecord::with_id("r2", "op").payload_size(), 0);
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = MutationRecord::decode(&[0xFF, 0x00]);
        assert!(matches!(result, Err(ProtocolError::DecodingFailed { .. })));
    }

    #[test]
    fn decode_rejects_empty_identity() {
        let record = MutationRecord::with_id("", "op");
        let bytes = record.encode().unwrap();
        let result = MutationRecord::decode(&bytes);
        assert!(matches!(result, Err(ProtocolError::InvalidRecord { .. })));
    }
}
