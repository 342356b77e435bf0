//! Cooperative cancellation shared by pump loops, waiters and signal handlers.
//!
//! The token is a single atomic flag. In-process requests also wake blocked
//! [`wait_until_requested`](CancellationToken::wait_until_requested) callers
//! through a condition variable; a signal handler may only store the flag, so
//! waiters fall back to re-checking it every [`POLL_INTERVAL`].

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Upper bound on how long a blocked waiter takes to notice a flag set from
/// a signal handler.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Inner {
    flag: Arc<AtomicBool>,
    /// Set only by OS signal handlers, never by `request`.
    signalled: Arc<AtomicBool>,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Write-once shutdown flag. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns `true` only for the call that flipped
    /// the flag; later calls are no-ops.
    pub fn request(&self) -> bool {
        let first = !self.inner.flag.swap(true, Ordering::SeqCst);
        if first {
            let _guard = self.inner.lock.lock();
            self.inner.wake.notify_all();
        }
        first
    }

    pub fn is_requested(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Blocks until cancellation is requested.
    pub fn wait_until_requested(&self) {
        let mut guard = self.inner.lock.lock();
        while !self.is_requested() {
            self.inner.wake.wait_for(&mut guard, POLL_INTERVAL);
        }
    }

    /// Blocks until cancellation is requested or `timeout` elapses. Returns
    /// whether cancellation was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock();
        while !self.is_requested() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = (deadline - now).min(POLL_INTERVAL);
            self.inner.wake.wait_for(&mut guard, slice);
        }
        true
    }

    /// Whether a signal registered through
    /// [`register_signal`](Self::register_signal) has been delivered.
    pub fn signal_received(&self) -> bool {
        self.inner.signalled.load(Ordering::SeqCst)
    }

    /// Installs an OS signal handler that sets this token's flag.
    ///
    /// The handler body is atomic stores only, so it never allocates or
    /// takes a lock the interrupted thread might hold. Signal deliveries are
    /// tracked apart from [`request`](Self::request): the first delivery
    /// only requests cancellation, even when the flag is already set, and a
    /// second delivery terminates the process with status 1. Termination
    /// skips destructors, so anything they would remove (such as a temporary
    /// directory) is left behind.
    pub fn register_signal(&self, signal: i32) -> io::Result<()> {
        // Handlers run in registration order: the exit check must see the
        // state left by earlier deliveries only.
        signal_hook::flag::register_conditional_shutdown(
            signal,
            1,
            Arc::clone(&self.inner.signalled),
        )?;
        signal_hook::flag::register(signal, Arc::clone(&self.inner.signalled))?;
        signal_hook::flag::register(signal, Arc::clone(&self.inner.flag))?;
        Ok(())
    }

    /// [`register_signal`](Self::register_signal) for every termination
    /// signal of the platform (interrupt, terminate, quit).
    pub fn register_term_signals(&self) -> io::Result<()> {
        for &signal in signal_hook::consts::TERM_SIGNALS {
            self.register_signal(signal)?;
        }
        Ok(())
    }
}
