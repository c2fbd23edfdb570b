//! # mutsync Engine
//!
//! Dispatch of offline mutations to the backend.
//!
//! This crate provides:
//! - The mutation dispatch operation (upload -> submit -> classify -> retry)
//! - The retry predicate and error classification
//! - Retry configuration (fixed or backoff delay, optional attempt cap)
//! - A serial callback queue for delegate notifications
//! - Transport, uploader and client abstractions, with in-memory test doubles
//! - An HTTP transport over an abstract HTTP client
//! - A dispatcher tracking in-flight operations per client
//!
//! ## Key Invariants
//!
//! - Each operation reports at most one terminal outcome
//! - Upload precedes submission, submission precedes classification
//! - Client-family errors and throughput-exceeded responses are retried
//! - Any other typed backend error is not retried and reaches the delegate
//!   inside the response snapshot
//! - Cancellation never reports, and never interrupts in-flight network calls
//! - The sync client and the transport are never kept alive by an operation

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod classify;
mod client;
mod config;
mod dispatcher;
mod error;
mod http;
mod operation;
mod queue;
mod state;
mod transport;
mod upload;

pub use classify::{classify, should_retry, AttemptOutcome, Verdict, THROUGHPUT_EXCEEDED};
pub use client::{
    MemorySyncClient, MutationDelegate, MutationNotification, RecordingDelegate, SyncClient,
};
pub use config::{DispatchConfig, RetryConfig};
pub use dispatcher::MutationDispatcher;
pub use error::{ClientError, DispatchError, DispatchResult};
pub use http::{HttpClient, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer};
pub use operation::{CompletionHook, MutationOperation};
pub use queue::CallbackQueue;
pub use state::OperationState;
pub use transport::{NetworkTransport, ScriptedTransport};
pub use upload::{MockUploader, ObjectUploader};

pub use mutsync_protocol::{error_type, JsonObject, LargeObject, MutationRecord};
