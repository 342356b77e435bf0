//! Error types for the core library.

use std::io;

/// Errors from parsing identifiers given by the operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Network id was not valid hex.
    #[error("invalid network id: {0:?}")]
    InvalidNetworkId(String),
}

/// Failures reported by a [`NetworkStack`](crate::network::NetworkStack).
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// A lifecycle call returned a non-success status.
    #[error("{op} failed with status {code}")]
    Lifecycle { op: &'static str, code: i32 },
    /// The call needs a running node.
    #[error("node is not running")]
    NotRunning,
    /// `start` was called twice.
    #[error("node is already running")]
    AlreadyRunning,
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Raised when a raw notification cannot be turned into a captured event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("unknown event code {0}")]
    UnknownEventCode(i32),
}

/// Outcome of a registry wait that did not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The registry was dropped while the waiter was pending.
    #[error("waiter abandoned before an event matched")]
    Abandoned,
    /// The caller's deadline elapsed.
    #[error("timed out waiting for event")]
    TimedOut,
    /// The caller's cancellation token was requested.
    #[error("cancelled while waiting for event")]
    Cancelled,
}
