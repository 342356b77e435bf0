//! Property and concurrency tests for the event registry.
//!
//! # Test Strategy
//!
//! 1. **One-shot resolution**: any event resolves exactly the matching subset
//! 2. **Ordering**: registration after dispatch never sees the event
//! 3. **Concurrency**: dispatch from several threads while registering

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use ztnc_core::event::AddrDetails;
use ztnc_core::{CapturedEvent, EventCode, EventRegistry, NetworkId, WaitError};

fn arb_code() -> impl Strategy<Value = EventCode> {
    prop::sample::select(EventCode::ALL.to_vec())
}

fn arb_event() -> impl Strategy<Value = CapturedEvent> {
    (arb_code(), prop::option::of(0u64..4)).prop_map(|(code, nwid)| {
        let event = CapturedEvent::new(code);
        match nwid {
            Some(nwid) => event.with_addr(AddrDetails {
                nwid: NetworkId(nwid),
                addr: None,
            }),
            None => event,
        }
    })
}

/// What a waiter is interested in: an event code and optionally a network.
fn arb_interest() -> impl Strategy<Value = (EventCode, Option<u64>)> {
    (arb_code(), prop::option::of(0u64..4))
}

fn matches(interest: (EventCode, Option<u64>), event: &CapturedEvent) -> bool {
    let (code, nwid) = interest;
    event.code == code && nwid.map_or(true, |n| event.nwid() == Some(NetworkId(n)))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property: dispatch resolves exactly the matching subset, once.
    #[test]
    fn dispatch_resolves_exact_subset(
        interests in prop::collection::vec(arb_interest(), 0..24),
        event in arb_event(),
    ) {
        let registry = EventRegistry::new();
        let mut waiters: Vec<_> = interests
            .iter()
            .map(|&interest| registry.register(move |e: &CapturedEvent| matches(interest, e)))
            .collect();

        let expected: Vec<bool> = interests.iter().map(|&i| matches(i, &event)).collect();
        let expected_count = expected.iter().filter(|m| **m).count();

        prop_assert_eq!(registry.dispatch(event.clone()), expected_count);
        prop_assert_eq!(registry.pending(), interests.len() - expected_count);

        for (waiter, should_match) in waiters.iter_mut().zip(&expected) {
            match waiter.try_value() {
                Some(resolved) => {
                    prop_assert!(*should_match);
                    prop_assert_eq!(&*resolved, &event);
                }
                None => prop_assert!(!*should_match),
            }
        }

        // Already-resolved waiters are gone; a repeat only hits nothing new.
        prop_assert_eq!(registry.dispatch(event), 0);
    }

    /// Property: a waiter registered after a dispatch never sees that event.
    #[test]
    fn no_retroactive_matching(events in prop::collection::vec(arb_event(), 1..8)) {
        let registry = EventRegistry::new();
        for event in events {
            registry.dispatch(event);
        }
        let mut late = registry.register(|_: &CapturedEvent| true);
        prop_assert!(late.try_value().is_none());
        prop_assert_eq!(registry.pending(), 1);
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_dispatch_and_register() {
    let registry: EventRegistry = EventRegistry::new();
    let mut waiters: Vec<_> = (0..64u64)
        .map(|i| {
            registry.register(move |e: &CapturedEvent| {
                e.code == EventCode::AddrAddedIp4 && e.nwid() == Some(NetworkId(i))
            })
        })
        .collect();

    let dispatchers: Vec<_> = (0..4u64)
        .map(|t| {
            let registry = registry.clone();
            thread::spawn(move || {
                let mut resolved = 0;
                for i in (t..64).step_by(4) {
                    let event = CapturedEvent::new(EventCode::AddrAddedIp4).with_addr(AddrDetails {
                        nwid: NetworkId(i),
                        addr: None,
                    });
                    resolved += registry.dispatch(event);
                    // Registrations racing with dispatch must not disturb it.
                    drop(registry.register(|_: &CapturedEvent| false));
                }
                resolved
            })
        })
        .collect();

    let total: usize = dispatchers.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 64);
    for (i, waiter) in waiters.iter_mut().enumerate() {
        let event = waiter.wait_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.nwid(), Some(NetworkId(i as u64)));
    }
    assert_eq!(registry.pending(), 0);
}

#[test]
fn test_blocked_waiter_wakes_on_dispatch() {
    let registry: EventRegistry = EventRegistry::new();
    let mut ready = registry.register(|e: &CapturedEvent| e.code == EventCode::NetworkReadyIp4);

    let waiting = thread::spawn(move || ready.wait().map(|e| e.code));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(registry.dispatch(CapturedEvent::new(EventCode::NetworkReadyIp4)), 1);
    assert_eq!(waiting.join().unwrap(), Ok(EventCode::NetworkReadyIp4));
}

#[test]
fn test_unmatched_wait_times_out_and_stays_registered() {
    let registry: EventRegistry = EventRegistry::new();
    let mut never = registry.register(|e: &CapturedEvent| e.code == EventCode::NodeIdentityCollision);

    assert_eq!(
        never.wait_timeout(Duration::from_millis(10)),
        Err(WaitError::TimedOut)
    );
    assert_eq!(registry.pending(), 1);

    let event = Arc::new(CapturedEvent::new(EventCode::NodeIdentityCollision));
    assert_eq!(registry.dispatch_shared(Arc::clone(&event)), 1);
    assert!(Arc::ptr_eq(&never.wait().unwrap(), &event));
}
