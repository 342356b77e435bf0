//! Duplex copy between a remote stream and local input/output.
//!
//! Two loops run on scoped threads:
//!
//! - **inbound**: remote → local output
//! - **outbound**: local input → remote
//!
//! Whichever loop stops first (EOF, I/O error, short write) requests the
//! shared [`CancellationToken`]; the other notices within one poll interval
//! because every blocking read is bounded by it. The inbound loop takes at
//! most one more read when its last read delivered data, so an EOF queued
//! behind that data still ends it as EOF. Both loops are joined before the
//! remote is closed, and only [`DuplexPump::run`] closes it.
//!
//! A remote that cannot bound its reads (its
//! [`set_read_timeout`](StreamEndpoint::set_read_timeout) fails) is still
//! relayed, with a warning: the inbound loop then only notices cancellation
//! when the remote next delivers data or EOF.
//!
//! Stream faults never surface as errors. They end the session and are
//! recorded in the returned [`PumpReport`].

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use ztnc_core::{CancellationToken, StreamEndpoint};

use crate::local::LocalIo;

/// Well within the virtual network's MTU.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PumpConfig {
    /// Largest chunk moved per read.
    pub buffer_size: usize,
    /// Bound on every blocking read, and so on shutdown latency.
    pub poll_interval: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Session lifecycle. Only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PumpState {
    Idle = 0,
    Running = 1,
    ShuttingDown = 2,
    Closed = 3,
}

impl PumpState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => PumpState::Idle,
            1 => PumpState::Running,
            2 => PumpState::ShuttingDown,
            _ => PumpState::Closed,
        }
    }
}

/// Observer for a pump's [`PumpState`], usable from other threads.
#[derive(Clone, Debug, Default)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    pub fn get(&self) -> PumpState {
        PumpState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn advance(&self, to: PumpState) {
        self.0.fetch_max(to as u8, Ordering::SeqCst);
    }
}

/// Why a copy loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The loop's source reached end of stream.
    Eof,
    /// The sibling loop or an interrupt requested shutdown.
    Cancelled,
    ReadError(io::ErrorKind),
    WriteError(io::ErrorKind),
    /// The remote accepted fewer bytes than offered.
    ShortWrite { written: usize, requested: usize },
    /// The loop's thread panicked.
    Panicked,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Eof => f.write_str("end of stream"),
            StopReason::Cancelled => f.write_str("cancelled"),
            StopReason::ReadError(kind) => write!(f, "read error: {kind}"),
            StopReason::WriteError(kind) => write!(f, "write error: {kind}"),
            StopReason::ShortWrite { written, requested } => {
                write!(f, "short write: {written} of {requested} bytes")
            }
            StopReason::Panicked => f.write_str("loop panicked"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopReport {
    /// Bytes delivered to the loop's sink.
    pub bytes: u64,
    pub reason: StopReason,
}

/// Outcome of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PumpReport {
    /// Remote → local output.
    pub inbound: LoopReport,
    /// Local input → remote.
    pub outbound: LoopReport,
}

/// One relay session. Consumed by [`run`](Self::run).
#[derive(Debug)]
pub struct DuplexPump {
    config: PumpConfig,
    token: CancellationToken,
    state: StateHandle,
}

impl DuplexPump {
    /// `token` is shared with whatever else may end the session, typically
    /// an interrupt handler.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            config: PumpConfig::default(),
            token,
            state: StateHandle::default(),
        }
    }

    pub fn with_config(mut self, config: PumpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// Relays until either side finishes or the token is requested, then
    /// closes `remote` exactly once. Returns after both loops have exited.
    pub fn run<R, I, O>(self, remote: R, local: LocalIo<I, O>) -> PumpReport
    where
        R: StreamEndpoint,
        I: Read + Send,
        O: Write + Send,
    {
        let LocalIo {
            mut input,
            mut output,
        } = local;

        if let Err(err) = remote.set_read_timeout(Some(self.config.poll_interval)) {
            warn!(%err, "remote read timeout not applied, shutdown may lag");
        }

        self.state.advance(PumpState::Running);
        debug!(peer = ?remote.peer_addr(), "pump running");

        let (inbound, outbound) = thread::scope(|s| {
            let inbound = s.spawn(|| self.inbound(&remote, &mut output));
            let outbound = s.spawn(|| self.outbound(&mut input, &remote));
            (self.joined(inbound), self.joined(outbound))
        });

        self.state.advance(PumpState::ShuttingDown);
        remote.close();
        self.state.advance(PumpState::Closed);

        let report = PumpReport { inbound, outbound };
        info!(
            received = report.inbound.bytes,
            sent = report.outbound.bytes,
            inbound = %report.inbound.reason,
            outbound = %report.outbound.reason,
            "pump closed"
        );
        report
    }

    fn inbound<R, O>(&self, remote: &R, output: &mut O) -> LoopReport
    where
        R: StreamEndpoint,
        O: Write,
    {
        let mut buf = vec![0u8; self.config.buffer_size];
        let mut bytes = 0u64;
        let mut draining = false;
        let reason = loop {
            let delivered = match remote.read(&mut buf) {
                Ok(0) => break StopReason::Eof,
                Ok(n) => {
                    // A local write that cannot take everything is fatal.
                    if let Err(err) = output.write_all(&buf[..n]).and_then(|()| output.flush()) {
                        break StopReason::WriteError(err.kind());
                    }
                    bytes += n as u64;
                    true
                }
                Err(err) if is_poll_timeout(&err) => false,
                Err(err) => break StopReason::ReadError(err.kind()),
            };
            if self.token.is_requested() {
                // After data, read once more so an EOF queued right behind
                // it is reported as such. At most one extra read.
                if draining || !delivered {
                    break StopReason::Cancelled;
                }
                draining = true;
            }
        };
        self.finish("inbound", bytes, reason)
    }

    fn outbound<I, R>(&self, input: &mut I, remote: &R) -> LoopReport
    where
        I: Read,
        R: StreamEndpoint,
    {
        let mut buf = vec![0u8; self.config.buffer_size];
        let mut bytes = 0u64;
        let reason = loop {
            if self.token.is_requested() {
                break StopReason::Cancelled;
            }
            match input.read(&mut buf) {
                Ok(0) => break StopReason::Eof,
                Ok(n) => match remote.write(&buf[..n]) {
                    Ok(written) if written == n => bytes += n as u64,
                    // Partial writes mean a broken conversation, not
                    // backpressure; never retried.
                    Ok(written) => {
                        bytes += written as u64;
                        break StopReason::ShortWrite {
                            written,
                            requested: n,
                        };
                    }
                    Err(err) => break StopReason::WriteError(err.kind()),
                },
                Err(err) if is_poll_timeout(&err) => {}
                Err(err) => break StopReason::ReadError(err.kind()),
            }
        };
        self.finish("outbound", bytes, reason)
    }

    fn finish(&self, side: &'static str, bytes: u64, reason: StopReason) -> LoopReport {
        let first = self.token.request();
        self.state.advance(PumpState::ShuttingDown);
        match reason {
            StopReason::Eof | StopReason::Cancelled => {
                debug!(side, bytes, %reason, first, "loop stopped")
            }
            _ => warn!(side, bytes, %reason, first, "loop stopped"),
        }
        LoopReport { bytes, reason }
    }

    fn joined(&self, handle: thread::ScopedJoinHandle<'_, LoopReport>) -> LoopReport {
        handle.join().unwrap_or_else(|_| {
            self.token.request();
            LoopReport {
                bytes: 0,
                reason: StopReason::Panicked,
            }
        })
    }
}

/// The read bound elapsed without data; poll again.
fn is_poll_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
