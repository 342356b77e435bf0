//! Byte relay between a remote stream socket and local stdio.
//!
//! This crate provides:
//! - The duplex pump and its session report
//! - The local input/output pair, including a poll-bounded stdin

pub mod local;
pub mod pump;

pub use local::{LocalIo, PolledStdin};
pub use pump::{
    DuplexPump, LoopReport, PumpConfig, PumpReport, PumpState, StateHandle, StopReason,
};
