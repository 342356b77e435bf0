//! Session tests for the duplex pump against a scripted remote.
//!
//! # Test Strategy
//!
//! 1. **Natural endings**: remote EOF, local EOF, both at once
//! 2. **Faults**: short remote writes, failing local output
//! 3. **Cancellation**: external requests, bounded shutdown latency

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use ztnc_core::{CancellationToken, StreamEndpoint};
use ztnc_streaming::{DuplexPump, LocalIo, PumpConfig, PumpState, StopReason};

const POLL: Duration = Duration::from_millis(20);

/// What the remote does once its scripted chunks run out.
#[derive(Clone, Copy)]
enum Tail {
    Eof,
    Idle,
}

struct ScriptedRemote {
    chunks: Mutex<VecDeque<Vec<u8>>>,
    tail: Tail,
    max_write: Option<usize>,
    written: Mutex<Vec<u8>>,
    read_timeout: Mutex<Option<Duration>>,
    reads: AtomicUsize,
    closes: AtomicUsize,
}

impl ScriptedRemote {
    fn new(chunks: &[&[u8]], tail: Tail) -> Arc<Self> {
        Arc::new(Self {
            chunks: Mutex::new(chunks.iter().map(|c| c.to_vec()).collect()),
            tail,
            max_write: None,
            written: Mutex::new(Vec::new()),
            read_timeout: Mutex::new(None),
            reads: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }

    fn accepting_at_most(max_write: usize) -> Arc<Self> {
        let mut remote = Arc::try_unwrap(Self::new(&[], Tail::Idle)).ok().unwrap();
        remote.max_write = Some(max_write);
        Arc::new(remote)
    }

    fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl StreamEndpoint for ScriptedRemote {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        assert_eq!(self.closes(), 0, "read after close");
        if let Some(chunk) = self.chunks.lock().pop_front() {
            buf[..chunk.len()].copy_from_slice(&chunk);
            return Ok(chunk.len());
        }
        match self.tail {
            Tail::Eof => Ok(0),
            Tail::Idle => {
                thread::sleep(self.read_timeout.lock().unwrap_or(POLL));
                Err(io::ErrorKind::WouldBlock.into())
            }
        }
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        assert_eq!(self.closes(), 0, "write after close");
        let n = self.max_write.map_or(buf.len(), |max| buf.len().min(max));
        self.written.lock().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        *self.read_timeout.lock() = timeout;
        Ok(())
    }
}

/// Local input that never has data.
struct IdleInput;

impl Read for IdleInput {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        thread::sleep(POLL);
        Err(io::ErrorKind::WouldBlock.into())
    }
}

struct BrokenOutput;

impl Write for BrokenOutput {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn pump(token: &CancellationToken) -> DuplexPump {
    DuplexPump::new(token.clone()).with_config(PumpConfig {
        buffer_size: 1024,
        poll_interval: POLL,
    })
}

fn empty_input() -> Cursor<Vec<u8>> {
    Cursor::new(Vec::new())
}

// ============================================================================
// Natural endings
// ============================================================================

#[test]
fn test_remote_hello_then_eof_with_local_input_closed() {
    let token = CancellationToken::new();
    let remote = ScriptedRemote::new(&[b"hello"], Tail::Eof);
    let mut output = Vec::new();

    let pump = pump(&token);
    let state = pump.state();
    let report = pump.run(Arc::clone(&remote), LocalIo::new(empty_input(), &mut output));

    assert_eq!(output, b"hello");
    assert_eq!(report.inbound.bytes, 5);
    // One read for the data, one for the EOF behind it, whichever loop
    // requested shutdown first.
    assert_eq!(report.inbound.reason, StopReason::Eof);
    assert_eq!(remote.reads.load(Ordering::SeqCst), 2);
    // Local EOF may race the remote EOF to the token.
    assert!(matches!(
        report.outbound.reason,
        StopReason::Eof | StopReason::Cancelled
    ));
    assert!(remote.written().is_empty());
    assert_eq!(remote.closes(), 1);
    assert_eq!(state.get(), PumpState::Closed);
    assert!(token.is_requested());
}

#[test]
fn test_local_eof_before_remote_sends() {
    let token = CancellationToken::new();
    let remote = ScriptedRemote::new(&[], Tail::Idle);
    let mut output = Vec::new();

    let pump = pump(&token);
    let state = pump.state();
    let report = pump.run(Arc::clone(&remote), LocalIo::new(empty_input(), &mut output));

    assert_eq!(report.outbound.reason, StopReason::Eof);
    assert_eq!(report.inbound.reason, StopReason::Cancelled);
    assert!(remote.written().is_empty());
    assert!(output.is_empty());
    assert_eq!(remote.closes(), 1);
    assert_eq!(state.get(), PumpState::Closed);
}

#[test]
fn test_local_input_reaches_remote() {
    let token = CancellationToken::new();
    let remote = ScriptedRemote::new(&[], Tail::Idle);
    let mut output = Vec::new();

    let report = pump(&token).run(
        Arc::clone(&remote),
        LocalIo::new(Cursor::new(b"ping\n".to_vec()), &mut output),
    );

    assert_eq!(remote.written(), b"ping\n");
    assert_eq!(report.outbound.bytes, 5);
    assert_eq!(report.outbound.reason, StopReason::Eof);
}

#[test]
fn test_both_sides_end_together_close_once() {
    for _ in 0..20 {
        let token = CancellationToken::new();
        let remote = ScriptedRemote::new(&[], Tail::Eof);
        let mut output = Vec::new();

        let report = pump(&token).run(Arc::clone(&remote), LocalIo::new(empty_input(), &mut output));

        assert_eq!(remote.closes(), 1);
        assert_ne!(report.inbound.reason, StopReason::Panicked);
        assert_ne!(report.outbound.reason, StopReason::Panicked);
    }
}

// ============================================================================
// Faults
// ============================================================================

#[test]
fn test_short_write_ends_session() {
    let token = CancellationToken::new();
    let remote = ScriptedRemote::accepting_at_most(3);
    let mut output = Vec::new();

    let report = pump(&token).run(
        Arc::clone(&remote),
        LocalIo::new(Cursor::new(b"abcdef".to_vec()), &mut output),
    );

    assert_eq!(
        report.outbound.reason,
        StopReason::ShortWrite {
            written: 3,
            requested: 6
        }
    );
    assert_eq!(report.outbound.bytes, 3);
    assert_eq!(remote.written(), b"abc");
    assert_eq!(report.inbound.reason, StopReason::Cancelled);
    assert_eq!(remote.closes(), 1);
}

#[test]
fn test_local_output_failure_ends_session() {
    let token = CancellationToken::new();
    let remote = ScriptedRemote::new(&[b"data"], Tail::Idle);

    let report = pump(&token).run(Arc::clone(&remote), LocalIo::new(IdleInput, BrokenOutput));

    assert_eq!(
        report.inbound.reason,
        StopReason::WriteError(io::ErrorKind::BrokenPipe)
    );
    assert_eq!(report.inbound.bytes, 0);
    assert_eq!(report.outbound.reason, StopReason::Cancelled);
    assert_eq!(remote.closes(), 1);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_external_cancellation_stops_both_loops() {
    let token = CancellationToken::new();
    let remote = ScriptedRemote::new(&[], Tail::Idle);
    let mut output = Vec::new();

    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.request();
        })
    };
    let report = pump(&token).run(Arc::clone(&remote), LocalIo::new(IdleInput, &mut output));
    canceller.join().unwrap();

    assert_eq!(report.inbound.reason, StopReason::Cancelled);
    assert_eq!(report.outbound.reason, StopReason::Cancelled);
    assert_eq!(remote.closes(), 1);
}

#[test]
fn test_token_requested_before_run() {
    let token = CancellationToken::new();
    token.request();
    let remote = ScriptedRemote::new(&[], Tail::Idle);
    let mut output = Vec::new();

    let report = pump(&token).run(
        Arc::clone(&remote),
        LocalIo::new(Cursor::new(b"never sent".to_vec()), &mut output),
    );

    assert_eq!(report.outbound.reason, StopReason::Cancelled);
    assert!(remote.written().is_empty());
    assert_eq!(remote.closes(), 1);
}

#[test]
fn test_sibling_observes_remote_eof_within_poll_interval() {
    let token = CancellationToken::new();
    let remote = ScriptedRemote::new(&[], Tail::Eof);
    let mut output = Vec::new();

    let start = Instant::now();
    let report = pump(&token).run(Arc::clone(&remote), LocalIo::new(IdleInput, &mut output));
    let elapsed = start.elapsed();

    assert_eq!(report.inbound.reason, StopReason::Eof);
    assert_eq!(report.outbound.reason, StopReason::Cancelled);
    // One poll interval plus scheduling slack.
    assert!(elapsed < POLL * 3, "shutdown took {elapsed:?}");
}

#[test]
fn test_sibling_observes_local_eof_within_poll_interval() {
    let token = CancellationToken::new();
    let remote = ScriptedRemote::new(&[], Tail::Idle);
    let mut output = Vec::new();

    let start = Instant::now();
    let report = pump(&token).run(Arc::clone(&remote), LocalIo::new(empty_input(), &mut output));
    let elapsed = start.elapsed();

    assert_eq!(report.inbound.reason, StopReason::Cancelled);
    assert!(elapsed < POLL * 3, "shutdown took {elapsed:?}");
    assert!(remote.reads.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_inbound_drains_once_after_cancellation() {
    let token = CancellationToken::new();
    let remote = ScriptedRemote::new(&[b"one", b"two", b"three"], Tail::Idle);
    let mut output = Vec::new();

    // Cancelled from the start: the first read still delivers, then exactly
    // one more read drains before the loop gives up.
    token.request();
    let report = pump(&token).run(Arc::clone(&remote), LocalIo::new(IdleInput, &mut output));

    assert_eq!(output, b"onetwo");
    assert_eq!(report.inbound.reason, StopReason::Cancelled);
    assert_eq!(remote.reads.load(Ordering::SeqCst), 2);
    assert_eq!(remote.closes(), 1);
}

// ============================================================================
// Remotes without read timeouts
// ============================================================================

/// Remote relying on the default `set_read_timeout`.
struct UnboundedRemote {
    closes: AtomicUsize,
}

impl StreamEndpoint for UnboundedRemote {
    fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Collects formatted log lines for inspection.
#[derive(Clone, Default)]
struct LogBuf(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_unbounded_remote_is_reported() {
    let logs = LogBuf::default();
    let subscriber = {
        let logs = logs.clone();
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || logs.clone())
            .finish()
    };

    let token = CancellationToken::new();
    let remote = Arc::new(UnboundedRemote {
        closes: AtomicUsize::new(0),
    });
    let mut output = Vec::new();
    let report = tracing::subscriber::with_default(subscriber, || {
        pump(&token).run(Arc::clone(&remote), LocalIo::new(IdleInput, &mut output))
    });

    assert_eq!(report.inbound.reason, StopReason::Eof);
    assert_eq!(remote.closes.load(Ordering::SeqCst), 1);
    let logs = String::from_utf8(logs.0.lock().clone()).unwrap();
    assert!(
        logs.contains("remote read timeout not applied"),
        "missing warning in {logs:?}"
    );
}
