//! Loopback network stack for ztnc.
//!
//! Provides:
//! - `LoopbackStack`: a `NetworkStack` that announces lifecycle progress
//!   through the same notifications as the virtual network stack
//! - `LoopbackStream` / `LoopbackListener`: stream endpoints over local TCP
//!
//! Enables running the relay and its end-to-end tests without joining a real
//! virtual network.

mod identity;
mod stack;
mod stream;

pub use identity::IDENTITY_FILE;
pub use stack::{LoopbackConfig, LoopbackStack};
pub use stream::{LoopbackListener, LoopbackStream};
