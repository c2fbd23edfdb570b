//! # mutsync Protocol
//!
//! Data types that cross the boundary between the durable mutation queue,
//! the dispatch engine and the backend.
//!
//! This crate provides:
//! - `MutationRecord` for locally queued writes
//! - `LargeObject` descriptors for blobs uploaded ahead of a mutation
//! - CBOR persistence for records
//! - Inspection of backend responses (`errors[0].errorType`)
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod record;
mod response;

pub use error::{ProtocolError, ProtocolResult};
pub use record::{LargeObject, MutationRecord};
pub use response::{error_message, error_type, BackendError, JsonObject};
