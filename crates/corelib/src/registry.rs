//! Predicate-matched, one-shot event correlation.
//!
//! The network stack pushes every notification through one callback. Call
//! sites that need a particular notification register a predicate *before*
//! triggering the operation that produces it, then block on the returned
//! [`Waiter`]. [`EventRegistry::dispatch`] tests each incoming event against
//! all pending predicates and resolves every match with the same shared
//! value.
//!
//! # Locking
//!
//! One mutex guards the pending set. `register` inserts under it, and each
//! `dispatch` runs test, resolve and remove for every waiter as a single
//! critical section, so a concurrent `register` never observes a partially
//! dispatched event. Predicates run while the lock is held: they must be
//! cheap, must not block, and must not call back into the registry (the lock
//! is not reentrant).
//!
//! # Hang risk
//!
//! [`Waiter::wait`] has no deadline; a predicate that never matches blocks
//! its caller until the registry is dropped. Use
//! [`Waiter::wait_timeout`] or [`Waiter::wait_cancellable`] to bound it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::cancel::{CancellationToken, POLL_INTERVAL};
use crate::error::WaitError;
use crate::event::CapturedEvent;

type Predicate<E> = Box<dyn Fn(&E) -> bool + Send>;

struct PendingWaiter<E> {
    predicate: Predicate<E>,
    slot: Sender<Arc<E>>,
}

struct Shared<E> {
    pending: Mutex<BTreeMap<u64, PendingWaiter<E>>>,
    next_id: AtomicU64,
}

impl<E> Shared<E> {
    fn remove(&self, id: u64) {
        self.pending.lock().remove(&id);
    }
}

/// Thread-safe store of pending predicate waiters.
///
/// Clones share the same pending set. Waiters are iterated in registration
/// order on every dispatch.
pub struct EventRegistry<E = CapturedEvent> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for EventRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Send + Sync + 'static> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("pending", &self.shared.pending.lock().len())
            .finish()
    }
}

impl<E: Send + Sync + 'static> EventRegistry<E> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers interest in the first event satisfying `predicate`.
    ///
    /// Only events dispatched after this call returns can resolve the
    /// waiter.
    pub fn register<F>(&self, predicate: F) -> Waiter<E>
    where
        F: Fn(&E) -> bool + Send + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (slot, rx) = channel::bounded(1);
        self.shared.pending.lock().insert(
            id,
            PendingWaiter {
                predicate: Box::new(predicate),
                slot,
            },
        );
        Waiter {
            id,
            rx,
            registry: Arc::downgrade(&self.shared),
            resolved: None,
        }
    }

    /// Resolves every pending waiter whose predicate accepts `event` and
    /// returns how many were resolved.
    pub fn dispatch(&self, event: E) -> usize {
        self.dispatch_shared(Arc::new(event))
    }

    /// Like [`dispatch`](Self::dispatch) for an event that is already shared.
    pub fn dispatch_shared(&self, event: Arc<E>) -> usize {
        let mut resolved = 0;
        let mut pending = self.shared.pending.lock();
        pending.retain(|_, waiter| {
            if !(waiter.predicate)(&event) {
                return true;
            }
            // Capacity 1 and a single send per waiter: never blocks.
            if waiter.slot.try_send(Arc::clone(&event)).is_ok() {
                resolved += 1;
            }
            false
        });
        resolved
    }

    /// Number of waiters still pending.
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().len()
    }
}

/// Handle to one registered predicate.
///
/// Dropping an unresolved waiter abandons it and removes it from the
/// registry.
pub struct Waiter<E = CapturedEvent> {
    id: u64,
    rx: Receiver<Arc<E>>,
    registry: Weak<Shared<E>>,
    resolved: Option<Arc<E>>,
}

impl<E> fmt::Debug for Waiter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("id", &self.id)
            .field("resolved", &self.resolved.is_some())
            .finish()
    }
}

impl<E> Waiter<E> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The matched event, if the waiter has been observed as resolved.
    pub fn value(&self) -> Option<&Arc<E>> {
        self.resolved.as_ref()
    }

    /// Non-blocking check for a resolution.
    pub fn try_value(&mut self) -> Option<Arc<E>> {
        if self.resolved.is_none() {
            match self.rx.try_recv() {
                Ok(event) => self.resolved = Some(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
            }
        }
        self.resolved.clone()
    }

    /// Blocks until an event matches.
    ///
    /// Fails only with [`WaitError::Abandoned`], when the registry is dropped
    /// first.
    pub fn wait(&mut self) -> Result<Arc<E>, WaitError> {
        if let Some(event) = &self.resolved {
            return Ok(Arc::clone(event));
        }
        let event = self.rx.recv().map_err(|_| WaitError::Abandoned)?;
        Ok(self.resolve(event))
    }

    /// Blocks until an event matches or `timeout` elapses. The waiter stays
    /// registered after a timeout and may be waited on again.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Arc<E>, WaitError> {
        if let Some(event) = &self.resolved {
            return Ok(Arc::clone(event));
        }
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(self.resolve(event)),
            Err(RecvTimeoutError::Timeout) => Err(WaitError::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(WaitError::Abandoned),
        }
    }

    /// Blocks until an event matches or `token` is requested, checking the
    /// token at least every [`POLL_INTERVAL`]. A resolution that is already
    /// available wins over cancellation.
    pub fn wait_cancellable(&mut self, token: &CancellationToken) -> Result<Arc<E>, WaitError> {
        loop {
            match self.wait_timeout(POLL_INTERVAL) {
                Err(WaitError::TimedOut) if token.is_requested() => {
                    return Err(WaitError::Cancelled)
                }
                Err(WaitError::TimedOut) => continue,
                other => return other,
            }
        }
    }

    fn resolve(&mut self, event: Arc<E>) -> Arc<E> {
        self.resolved = Some(Arc::clone(&event));
        event
    }
}

impl<E> Drop for Waiter<E> {
    fn drop(&mut self) {
        if self.resolved.is_some() {
            return;
        }
        if let Some(shared) = self.registry.upgrade() {
            shared.remove(self.id);
        }
    }
}
