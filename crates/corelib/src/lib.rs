//! Core library for the ztnc relay.
//!
//! This crate turns the network stack's push-style notification callback into
//! something call sites can wait on:
//! - Captured, owned notification values
//! - The predicate-matching event registry
//! - The callback adapter the stack invokes
//! - The cancellation token shared with pump loops and signal handlers
//! - The traits the external network stack is consumed through

pub mod adapter;
pub mod cancel;
pub mod error;
pub mod event;
pub mod network;
pub mod node;
pub mod registry;

pub use adapter::CallbackAdapter;
pub use cancel::CancellationToken;
pub use error::{CaptureError, Error, StackError, WaitError};
pub use event::{CapturedEvent, EventCode, RawNotification};
pub use network::{NetworkStack, NotificationSink, StreamEndpoint};
pub use node::{NetworkId, NodeId};
pub use registry::{EventRegistry, Waiter};
