//! Stream endpoints carried over loopback TCP.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::trace;
use ztnc_core::StreamEndpoint;

/// Listening socket returned by [`LoopbackStack::listen`](crate::LoopbackStack).
#[derive(Debug)]
pub struct LoopbackListener {
    pub(crate) inner: TcpListener,
}

impl LoopbackListener {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// A connected stream. Reads and writes may happen from different threads.
#[derive(Debug)]
pub struct LoopbackStream {
    inner: TcpStream,
    closed: AtomicBool,
}

impl LoopbackStream {
    pub(crate) fn new(inner: TcpStream) -> io::Result<Self> {
        inner.set_nodelay(true)?;
        Ok(Self {
            inner,
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl StreamEndpoint for LoopbackStream {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Ok(0);
        }
        (&self.inner).read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        (&self.inner).write(buf)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        trace!(peer = ?self.inner.peer_addr().ok(), "closing stream");
        // Already torn down by the peer is fine.
        let _ = self.inner.shutdown(Shutdown::Both);
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_read_timeout(timeout)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr().ok()
    }
}
