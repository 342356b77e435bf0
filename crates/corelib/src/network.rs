//! Contracts with the external network stack.
//!
//! The stack is a collaborator: it brings the node up, joins networks,
//! assigns addresses and hands out stream sockets. This crate only consumes
//! it through [`NetworkStack`], [`StreamEndpoint`] and the
//! [`NotificationSink`] it pushes notifications into.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StackError;
use crate::event::RawNotification;
use crate::node::{NetworkId, NodeId};

/// Receiver of the stack's global notification callback.
pub trait NotificationSink: Send + Sync {
    /// Called by the stack from its own thread(s), once per notification.
    ///
    /// # Safety
    ///
    /// Every non-null pointer in `raw` must be valid for reads until this
    /// call returns. The sink must not retain or free any of them.
    unsafe fn on_notification(&self, raw: &RawNotification);
}

/// Blocking, socket-like stream handed out by the stack.
///
/// One thread may read while another writes; the owner closes.
pub trait StreamEndpoint: Send + Sync {
    /// Reads up to `buf.len()` bytes. `Ok(0)` is end of stream;
    /// [`io::ErrorKind::WouldBlock`] or [`io::ErrorKind::TimedOut`] mean the
    /// read timeout elapsed without data.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes some prefix of `buf`, returning its length. Callers detect
    /// short writes themselves.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Closes the stream. Idempotent.
    fn close(&self);

    /// Bounds how long [`read`](Self::read) blocks. Streams that cannot do
    /// so keep the default, which fails with
    /// [`io::ErrorKind::Unsupported`].
    fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl<S: StreamEndpoint + ?Sized> StreamEndpoint for Arc<S> {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn close(&self) {
        (**self).close()
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        (**self).peer_addr()
    }
}

/// Sequential, blocking lifecycle surface of a network stack.
///
/// Completion of `start` and `join` is reported asynchronously through the
/// subscribed [`NotificationSink`], not by the return value.
pub trait NetworkStack: Send + Sync {
    type Stream: StreamEndpoint + 'static;
    type Listener: Send;

    /// Installs the global notification callback. Called once, before
    /// `start`.
    fn subscribe(&self, sink: Arc<dyn NotificationSink>);

    /// Brings the node up using `cache_dir` for its identity and `port` for
    /// its underlay traffic.
    fn start(&self, cache_dir: &Path, port: u16) -> Result<(), StackError>;

    fn join(&self, nwid: NetworkId) -> Result<(), StackError>;

    fn node_id(&self) -> Option<NodeId>;

    fn listen(&self, port: u16) -> Result<Self::Listener, StackError>;

    /// Blocks until a peer connects.
    fn accept(&self, listener: &Self::Listener) -> Result<Self::Stream, StackError>;

    fn connect(&self, addr: SocketAddr) -> Result<Self::Stream, StackError>;

    /// Begins node shutdown; completion is signalled by a node-down
    /// notification.
    fn stop(&self) -> Result<(), StackError>;
}
