//! Behavioural scenarios
//!
//! End-to-end checks of deferred settlement, fan-out, progress,
//! assimilation and chaining, driven through the public API only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pledge_core::{
    defer, Callbacks, Deferred, DeferredConfig, Handlers, Operation, PledgeError, Promise,
    Resolution, Status, TaskQueue,
};

use crate::{init_tracing, FakeChain, FakeRejected, FakeResolved, FakeUnruly, Notification, Recorder};

// ============================================================================
// SETTLEMENT
// ============================================================================

#[test]
fn test_resolve_notifies_fulfilled_handler() {
    init_tracing();
    let d = defer::<u32, u32, ()>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);

    d.resolve(1).unwrap();

    assert_eq!(recorder.outcome(0), Some(Ok(1)));
    assert_eq!(recorder.len(), 1);
}

#[test]
fn test_resolve_with_fulfilled_thenable() {
    let d = defer::<u32, u32, ()>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);

    d.resolve(Resolution::thenable(FakeResolved(1))).unwrap();

    assert_eq!(recorder.outcome(0), Some(Ok(1)));
    assert_eq!(d.status(), Status::Fulfilled);
}

#[test]
fn test_reject_notifies_rejected_handler() {
    let d = defer::<u32, u32, ()>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);

    d.reject(1).unwrap();

    assert_eq!(recorder.outcome(0), Some(Err(1)));
    assert_eq!(recorder.len(), 1);
}

#[test]
fn test_resolve_with_rejected_thenable_rejects() {
    let d = defer::<u32, u32, ()>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);

    d.resolve(Resolution::thenable(FakeRejected(1))).unwrap();

    assert_eq!(recorder.outcome(0), Some(Err(1)));
    assert_eq!(d.status(), Status::Rejected);
}

#[test]
fn test_resolve_with_deferred_that_later_rejects() {
    let outer = defer::<u32, u32, ()>();
    let inner = defer::<u32, u32, ()>();
    let recorder = Recorder::new();
    recorder.attach(&outer.promise(), 0);

    outer.resolve(Resolution::thenable(inner.promise())).unwrap();
    assert_eq!(outer.status(), Status::Pending);
    assert!(outer.is_adopting());
    assert!(recorder.is_empty());

    inner.reject(3).unwrap();

    assert_eq!(outer.status(), Status::Rejected);
    assert_eq!(recorder.outcome(0), Some(Err(3)));
}

#[test]
fn test_flattening_through_nested_thenables() {
    let d = defer::<u32, u32, ()>();
    d.resolve(Resolution::thenable(FakeChain::nested(5, 42))).unwrap();

    assert_eq!(d.promise().peek(), Some(Ok(42)));
}

#[test]
fn test_chain_of_pending_deferreds() {
    let a = defer::<u32, u32, ()>();
    let b = defer::<u32, u32, ()>();
    let c = defer::<u32, u32, ()>();

    a.resolve(Resolution::thenable(b.promise())).unwrap();
    b.resolve(Resolution::thenable(c.promise())).unwrap();
    assert_eq!(a.status(), Status::Pending);

    c.resolve(9).unwrap();

    assert_eq!(a.promise().peek(), Some(Ok(9)));
    assert_eq!(b.promise().peek(), Some(Ok(9)));
}

#[test]
fn test_unruly_thenable_settles_once() {
    let d = defer::<u32, u32, ()>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);

    d.resolve(Resolution::thenable(FakeUnruly { value: 1, reason: 2 }))
        .unwrap();

    assert_eq!(recorder.terminal_count(0), 1);
    assert_eq!(recorder.outcome(0), Some(Ok(1)));
}

// ============================================================================
// PROGRESS
// ============================================================================

#[test]
fn test_progress_reaches_progress_handler() {
    let d = defer::<u32, u32, u32>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);

    d.progress(1).unwrap();

    assert_eq!(recorder.progress_updates(0), vec![1]);
    assert_eq!(recorder.terminal_count(0), 0);
}

#[test]
fn test_resolve_after_progress() {
    let d = defer::<u32, u32, u32>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);

    d.progress(1).unwrap();
    d.resolve(2).unwrap();

    assert_eq!(
        recorder.notifications(),
        vec![
            Notification::Progress { observer: 0, update: 1 },
            Notification::Fulfilled { observer: 0, value: 2 },
        ]
    );
}

#[test]
fn test_reject_after_progress() {
    let d = defer::<u32, u32, u32>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);

    d.progress(1).unwrap();
    d.reject(2).unwrap();

    assert_eq!(
        recorder.notifications(),
        vec![
            Notification::Progress { observer: 0, update: 1 },
            Notification::Rejected { observer: 0, reason: 2 },
        ]
    );
}

#[test]
fn test_progress_follows_adopted_deferred() {
    let outer = defer::<u32, u32, u32>();
    let inner = defer::<u32, u32, u32>();
    let recorder = Recorder::new();
    recorder.attach(&outer.promise(), 0);

    // Adoption wires the inner promise up as an ordinary thenable, so
    // its progress is not forwarded
    outer.resolve(Resolution::thenable(inner.promise())).unwrap();
    inner.progress(4).unwrap();
    inner.resolve(5).unwrap();

    assert!(recorder.progress_updates(0).is_empty());
    assert_eq!(recorder.outcome(0), Some(Ok(5)));
}

// ============================================================================
// INVALID STATE
// ============================================================================

fn settled(fulfil: bool) -> Deferred<u32, u32, u32> {
    let d = defer();
    if fulfil {
        d.resolve(1).unwrap();
    } else {
        d.reject(1).unwrap();
    }
    d
}

#[test]
fn test_second_settlement_always_fails() {
    for fulfil in [true, false] {
        let d = settled(fulfil);
        let status = d.status();

        assert_eq!(
            d.resolve(2),
            Err(PledgeError::InvalidState {
                operation: Operation::Resolve,
                status,
            })
        );
        assert_eq!(
            d.reject(2),
            Err(PledgeError::InvalidState {
                operation: Operation::Reject,
                status,
            })
        );
        assert_eq!(
            d.progress(2),
            Err(PledgeError::InvalidState {
                operation: Operation::Progress,
                status,
            })
        );
        // The stored outcome is untouched
        assert_eq!(d.status(), status);
    }
}

#[test]
fn test_refused_call_notifies_nobody() {
    let d = settled(true);
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);
    recorder.clear();

    assert!(d.reject(7).is_err());
    assert!(d.progress(7).is_err());

    assert!(recorder.is_empty());
}

#[test]
fn test_adopting_deferred_refuses_producer() {
    let d = defer::<u32, u32, u32>();
    let pending = defer::<u32, u32, u32>();
    d.resolve(Resolution::thenable(pending.promise())).unwrap();

    assert!(d.resolve(1).unwrap_err().is_invalid_state());
    assert!(d.reject(1).unwrap_err().is_invalid_state());
    assert!(d.progress(1).unwrap_err().is_invalid_state());
}

// ============================================================================
// LATE REGISTRATION
// ============================================================================

#[test]
fn test_late_callback_on_resolved() {
    let d = defer::<u32, u32, ()>();
    d.resolve(1).unwrap();

    let recorder = Recorder::new();
    let registration = recorder.attach(&d.promise(), 0);

    assert!(registration.replayed);
    assert_eq!(recorder.outcome(0), Some(Ok(1)));
    assert_eq!(recorder.terminal_count(0), 1);
}

#[test]
fn test_late_errback_on_rejected() {
    let d = defer::<u32, u32, ()>();
    d.reject(1).unwrap();

    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);

    assert_eq!(recorder.outcome(0), Some(Err(1)));
    assert_eq!(recorder.terminal_count(0), 1);
}

#[test]
fn test_then_registered_after_resolve() {
    let d = defer::<u32, u32, ()>();
    d.resolve(1).unwrap();

    let hits = Arc::new(Mutex::new(Vec::new()));
    let (f, g) = (hits.clone(), hits.clone());
    d.promise().then(
        Handlers::on_fulfilled(move |v: u32| {
            f.lock().push(format!("f:{v}"));
            Ok(Resolution::Value(v))
        })
        .on_rejected(move |r: u32| {
            g.lock().push(format!("g:{r}"));
            Err(r)
        }),
    );

    assert_eq!(*hits.lock(), vec!["f:1"]);
}

// ============================================================================
// FAN-OUT
// ============================================================================

#[test]
fn test_fan_out_in_registration_order() {
    let d = defer::<u32, u32, u32>();
    let recorder = Recorder::new();
    for observer in 0..5 {
        recorder.attach(&d.promise(), observer);
    }

    d.progress(1).unwrap();
    d.resolve(2).unwrap();

    let order: Vec<_> = recorder
        .notifications()
        .iter()
        .map(|n| (n.observer(), n.is_terminal()))
        .collect();
    let expected: Vec<_> = (0..5)
        .map(|o| (o, false))
        .chain((0..5).map(|o| (o, true)))
        .collect();
    assert_eq!(order, expected);
    assert_eq!(d.promise().observer_count(), 0);
}

#[test]
fn test_observer_added_between_progress_events() {
    let d = defer::<u32, u32, u32>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);
    d.progress(1).unwrap();
    recorder.attach(&d.promise(), 1);
    d.progress(2).unwrap();

    assert_eq!(recorder.progress_updates(0), vec![1, 2]);
    assert_eq!(recorder.progress_updates(1), vec![2]);
}

#[test]
fn test_panicking_observer_does_not_stop_fan_out() {
    init_tracing();
    let d = defer::<u32, u32, ()>();
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);
    d.promise()
        .register(Callbacks::new().on_fulfilled(|_| panic!("observer failure")));
    recorder.attach(&d.promise(), 2);

    d.resolve(1).unwrap();

    assert_eq!(recorder.outcome(0), Some(Ok(1)));
    assert_eq!(recorder.outcome(2), Some(Ok(1)));
}

#[test]
fn test_progress_observer_settling_same_deferred() {
    let d = defer::<u32, u32, u32>();
    let recorder = Recorder::new();

    let relay = d.clone();
    d.promise().register(Callbacks::new().on_progress(move |update: u32| {
        relay.resolve(update + 8).unwrap();
    }));
    recorder.attach(&d.promise(), 1);

    d.progress(1).unwrap();

    assert_eq!(
        recorder.notifications(),
        vec![
            Notification::Progress { observer: 1, update: 1 },
            Notification::Fulfilled { observer: 1, value: 9 },
        ]
    );
}

#[test]
fn test_late_registration_during_fan_out_is_last() {
    let d = defer::<u32, u32, ()>();
    let recorder = Recorder::new();

    let promise = d.promise();
    let log = recorder.clone();
    d.promise().register(Callbacks::new().on_fulfilled(move |_: u32| {
        log.attach(&promise, 2);
    }));
    recorder.attach(&d.promise(), 1);

    d.resolve(5).unwrap();

    let order: Vec<_> = recorder.notifications().iter().map(|n| n.observer()).collect();
    assert_eq!(order, vec![1, 2]);
}

#[test]
fn test_self_resolution_refused() {
    let d = defer::<u32, u32, ()>();
    assert_eq!(
        d.resolve(Resolution::thenable(d.promise())),
        Err(PledgeError::SelfResolution)
    );
    assert_eq!(d.status(), Status::Pending);
    assert!(d.resolve(3).is_ok());
}

#[test]
fn test_observer_resolving_another_deferred() {
    let first = defer::<u32, u32, ()>();
    let second = defer::<u32, u32, ()>();
    let recorder = Recorder::new();
    recorder.attach(&second.promise(), 0);

    let relay = second.clone();
    first.promise().register(Callbacks::new().on_fulfilled(move |v: u32| {
        relay.resolve(v * 10).unwrap();
    }));
    first.resolve(4).unwrap();

    assert_eq!(recorder.outcome(0), Some(Ok(40)));
}

// ============================================================================
// CHAINING
// ============================================================================

#[test]
fn test_handler_error_rejects_derived() {
    let d = defer::<u32, String, ()>();
    let derived = d
        .promise()
        .and_then(|_v| Err::<Resolution<u32, String>, _>("boom".to_string()));
    d.resolve(1).unwrap();

    assert_eq!(derived.peek(), Some(Err("boom".to_string())));
}

#[test]
fn test_rejection_tunnels_to_recovery() {
    let d = defer::<u32, u32, ()>();
    let recovered = d
        .promise()
        .map(|v| v + 1)
        .map(|v| v * 2)
        .or_else(|r| Ok(Resolution::Value(r + 100)));
    d.reject(5).unwrap();

    assert_eq!(recovered.peek(), Some(Ok(105)));
}

#[test]
fn test_handler_returning_pending_thenable() {
    let d = defer::<u32, u32, ()>();
    let later = defer::<u32, u32, ()>();
    let promise = later.promise();
    let derived = d
        .promise()
        .and_then(move |_| Ok(Resolution::thenable(promise)));

    d.resolve(1).unwrap();
    assert!(derived.is_pending());

    later.resolve(2).unwrap();
    assert_eq!(derived.peek(), Some(Ok(2)));
}

#[test]
fn test_always_runs_on_either_outcome() {
    for fulfil in [true, false] {
        let d = defer::<u32, u32, ()>();
        let done = Arc::new(AtomicUsize::new(0));
        let counter = done.clone();
        let derived = d.promise().always(move |outcome| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Resolution::Value(outcome.is_ok()))
        });

        if fulfil {
            d.resolve(1).unwrap();
        } else {
            d.reject(1).unwrap();
        }

        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(derived.peek(), Some(Ok(fulfil)));
    }
}

#[test]
fn test_promise_as_thenable_of_pre_settled() {
    let d = defer::<u32, u32, ()>();
    d.resolve(Resolution::thenable(Promise::<u32, u32>::rejected(8)))
        .unwrap();

    assert_eq!(d.promise().peek(), Some(Err(8)));
}

// ============================================================================
// SCHEDULING
// ============================================================================

#[test]
fn test_queued_delivery_preserves_order() {
    let queue = TaskQueue::new();
    let d: Deferred<u32, u32, u32> =
        Deferred::with_config(DeferredConfig::queued(&queue).with_label("queued"));
    let recorder = Recorder::new();
    recorder.attach(&d.promise(), 0);
    recorder.attach(&d.promise(), 1);

    d.progress(1).unwrap();
    d.resolve(2).unwrap();
    assert!(recorder.is_empty());

    assert_eq!(queue.drain(), 4);
    assert_eq!(
        recorder.notifications(),
        vec![
            Notification::Progress { observer: 0, update: 1 },
            Notification::Progress { observer: 1, update: 1 },
            Notification::Fulfilled { observer: 0, value: 2 },
            Notification::Fulfilled { observer: 1, value: 2 },
        ]
    );
}

#[test]
fn test_queued_chain_settles_after_drain() {
    let queue = TaskQueue::new();
    let d: Deferred<u32, u32> = Deferred::with_config(DeferredConfig::queued(&queue));
    let derived = d.promise().map(|v| v + 1).map(|v| v * 3);

    d.resolve(1).unwrap();
    assert!(derived.is_pending());

    queue.drain();
    assert_eq!(derived.peek(), Some(Ok(6)));
}

#[tokio::test]
async fn test_settled_future_after_adoption() {
    let outer = defer::<u32, u32, ()>();
    let inner = defer::<u32, u32, ()>();
    outer.resolve(Resolution::thenable(inner.promise())).unwrap();

    let waiting = outer.promise().settled();
    let producer = tokio::spawn(async move {
        inner.resolve(11).unwrap();
    });
    producer.await.unwrap();

    assert_eq!(waiting.await, Ok(Ok(11)));
}
