//! Shared deferred cell
//!
//! Both halves of a deferred point at one `Inner`. All mutation happens
//! under its lock. Notifications are queued in the cell's outbox in the
//! same critical section that changed the state, and are handed to the
//! scheduler only after the lock is released, so a callback may re-enter
//! any deferred, including this one.
//!
//! The outbox is drained by whichever call first finds it idle. A
//! re-entrant call only appends, so notifications caused by a callback
//! always come after the rest of the fan-out that callback is part of.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observer::Observer;
use crate::state::State;
use crate::{
    Callbacks, DeferredConfig, Job, Operation, Payload, PledgeError, PledgeResult, Registration,
    Resolution, Status,
};

/// Who is asking for a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Origin {
    /// The deferred's owner, through `Deferred`
    Producer,
    /// A parent in a `then` chain, or an adopted thenable
    Internal,
}

struct Slot<T, E, P> {
    state: State<T, E>,
    observers: Vec<Observer<T, E, P>>,
    next_seq: u64,
    /// Notifications waiting for the scheduler, in fan-out order
    outbox: VecDeque<Job>,
    draining: bool,
    /// Nothing will ever settle this cell
    abandoned: bool,
}

pub(crate) struct Inner<T, E, P> {
    slot: Mutex<Slot<T, E, P>>,
    config: DeferredConfig,
}

impl<T: Payload, E: Payload, P: Payload> Inner<T, E, P> {
    pub fn new(config: DeferredConfig) -> Arc<Self> {
        Self::with_state(config, State::default())
    }

    pub fn settled(config: DeferredConfig, outcome: Result<T, E>) -> Arc<Self> {
        let state = match outcome {
            Ok(value) => State::Fulfilled(value),
            Err(reason) => State::Rejected(reason),
        };
        Self::with_state(config, state)
    }

    fn with_state(config: DeferredConfig, state: State<T, E>) -> Arc<Self> {
        Arc::new(Inner {
            slot: Mutex::new(Slot {
                state,
                observers: Vec::new(),
                next_seq: 0,
                outbox: VecDeque::new(),
                draining: false,
                abandoned: false,
            }),
            config,
        })
    }

    pub fn config(&self) -> &DeferredConfig {
        &self.config
    }

    /// Identity of this cell, compared against [`Thenable::cell_id`](crate::Thenable::cell_id)
    pub fn id(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as *const () as usize
    }

    pub fn status(&self) -> Status {
        self.slot.lock().state.status()
    }

    pub fn is_adopting(&self) -> bool {
        self.slot.lock().state.is_adopting()
    }

    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.slot.lock().state.outcome()
    }

    pub fn observer_count(&self) -> usize {
        self.slot.lock().observers.len()
    }

    /// Queue an observer, or replay the outcome if already settled.
    pub fn register(&self, callbacks: Callbacks<T, E, P>) -> Registration {
        let mut slot = self.slot.lock();
        let seq = slot.next_seq;
        slot.next_seq += 1;

        if slot.abandoned {
            drop(slot);
            tracing::trace!(label = ?self.config.label, seq, "Observer dropped, deferred abandoned");
            if let Some(hook) = callbacks.on_abandon {
                hook();
            }
            return Registration {
                seq,
                replayed: false,
            };
        }

        let replayed = match slot.state.outcome() {
            None => {
                slot.observers.push(Observer { seq, callbacks });
                tracing::trace!(label = ?self.config.label, seq, "Observer queued");
                false
            }
            Some(outcome) => {
                tracing::trace!(label = ?self.config.label, seq, "Observer replayed");
                if let Some(job) = self.delivery(callbacks, outcome) {
                    slot.outbox.push_back(job);
                }
                true
            }
        };
        drop(slot);

        self.flush();
        Registration { seq, replayed }
    }

    /// Resolve with a value or follow a thenable.
    pub fn resolve(self: &Arc<Self>, resolution: Resolution<T, E>, origin: Origin) -> PledgeResult<()> {
        let thenable = match resolution {
            Resolution::Value(value) => return self.settle(Ok(value), origin),
            Resolution::Thenable(thenable) => thenable,
        };

        {
            let mut slot = self.slot.lock();
            match origin {
                Origin::Producer => slot.state.check_producer(Operation::Resolve)?,
                Origin::Internal => slot.state.check_pending(Operation::Resolve)?,
            }
            // Following itself would keep the cell alive and pending forever
            if thenable.cell_id() == Some(self.id()) {
                drop(slot);
                return match origin {
                    Origin::Producer => Err(PledgeError::SelfResolution),
                    Origin::Internal => {
                        tracing::warn!(label = ?self.config.label, "Derived promise resolved with itself");
                        self.abandon("resolved with itself");
                        Ok(())
                    }
                };
            }
            match origin {
                Origin::Producer => slot.state.adopt()?,
                Origin::Internal => slot.state.follow()?,
            }
        }
        tracing::trace!(label = ?self.config.label, "Adopting thenable");

        let fulfilled = Arc::clone(self);
        let rejected = Arc::clone(self);
        thenable.subscribe(
            Box::new(move |resolution| fulfilled.follow(resolution)),
            Box::new(move |reason| rejected.complete(Err(reason))),
        );
        Ok(())
    }

    /// The one transition out of pending, followed by fan-out.
    pub fn settle(&self, outcome: Result<T, E>, origin: Origin) -> PledgeResult<()> {
        {
            let mut slot = self.slot.lock();
            if origin == Origin::Producer {
                let operation = match outcome {
                    Ok(_) => Operation::Resolve,
                    Err(_) => Operation::Reject,
                };
                slot.state.check_producer(operation)?;
            }
            slot.state.settle(outcome.clone())?;

            let observers = std::mem::take(&mut slot.observers);
            tracing::trace!(
                label = ?self.config.label,
                fulfilled = outcome.is_ok(),
                observers = observers.len(),
                "Deferred settled"
            );
            for observer in observers {
                tracing::trace!(label = ?self.config.label, seq = observer.seq, "Notifying observer");
                if let Some(job) = self.delivery(observer.callbacks, outcome.clone()) {
                    slot.outbox.push_back(job);
                }
            }
        }

        self.flush();
        Ok(())
    }

    /// Notify every currently registered progress callback.
    pub fn progress(&self, update: P, origin: Origin) -> PledgeResult<()> {
        {
            let mut slot = self.slot.lock();
            match origin {
                Origin::Producer => slot.state.check_producer(Operation::Progress)?,
                Origin::Internal => slot.state.check_pending(Operation::Progress)?,
            }

            let listeners: Vec<_> = slot
                .observers
                .iter()
                .filter_map(|o| o.callbacks.on_progress.clone())
                .collect();
            tracing::trace!(label = ?self.config.label, listeners = listeners.len(), "Progress");

            for listener in listeners {
                let update = update.clone();
                let job = self.guard(move || listener(update));
                slot.outbox.push_back(job);
            }
        }

        self.flush();
        Ok(())
    }

    /// Internal resolve. A refusal here means the deferred was already
    /// settled by another path, which is not the caller's error.
    pub fn follow(self: &Arc<Self>, resolution: Resolution<T, E>) {
        if let Err(e) = self.resolve(resolution, Origin::Internal) {
            tracing::debug!(label = ?self.config.label, "Ignoring late resolution: {}", e);
        }
    }

    /// Internal settle, see [`Inner::follow`].
    pub fn complete(&self, outcome: Result<T, E>) {
        if let Err(e) = self.settle(outcome, Origin::Internal) {
            tracing::debug!(label = ?self.config.label, "Ignoring late settlement: {}", e);
        }
    }

    /// Internal progress, see [`Inner::follow`].
    pub fn forward_progress(&self, update: P) {
        if let Err(e) = self.progress(update, Origin::Internal) {
            tracing::debug!(label = ?self.config.label, "Ignoring late progress: {}", e);
        }
    }

    /// Give up on a pending cell that nothing can settle any more.
    ///
    /// Waiting observers are dropped, which ends `settled()` futures with
    /// `Abandoned`, and chains hanging off this cell are abandoned in turn.
    /// The status stays `Pending`.
    pub fn abandon(&self, reason: &str) {
        let observers = {
            let mut slot = self.slot.lock();
            if slot.state.status().is_settled() || slot.abandoned {
                return;
            }
            slot.abandoned = true;
            std::mem::take(&mut slot.observers)
        };

        tracing::debug!(label = ?self.config.label, observers = observers.len(), "Deferred abandoned: {}", reason);

        for observer in observers {
            if let Some(hook) = observer.callbacks.on_abandon {
                hook();
            }
        }
    }

    /// Terminal notification job for one observer
    fn delivery(&self, callbacks: Callbacks<T, E, P>, outcome: Result<T, E>) -> Option<Job> {
        match outcome {
            Ok(value) => callbacks.on_fulfilled.map(|f| self.guard(move || f(value))),
            Err(reason) => callbacks.on_rejected.map(|f| self.guard(move || f(reason))),
        }
    }

    /// Wrap a callback so a panic is contained and later jobs still run.
    fn guard(&self, job: impl FnOnce() + Send + 'static) -> Job {
        let label = self.config.label.clone();
        Box::new(move || {
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::error!(label = ?label, "Observer callback panicked");
            }
        })
    }

    /// Hand queued notifications to the scheduler, oldest first. Returns
    /// at once if another call is already draining this cell.
    fn flush(&self) {
        {
            let mut slot = self.slot.lock();
            if slot.draining {
                return;
            }
            slot.draining = true;
        }

        loop {
            let job = {
                let mut slot = self.slot.lock();
                match slot.outbox.pop_front() {
                    Some(job) => job,
                    None => {
                        slot.draining = false;
                        return;
                    }
                }
            };
            self.config.scheduler.schedule(job);
        }
    }
}

impl<T, E, P> Drop for Inner<T, E, P> {
    /// A pending cell that is dropped can never settle, so chains waiting
    /// on it are abandoned.
    fn drop(&mut self) {
        let slot = self.slot.get_mut();
        if slot.state.status().is_settled() || slot.abandoned {
            return;
        }
        for observer in slot.observers.drain(..) {
            if let Some(hook) = observer.callbacks.on_abandon {
                hook();
            }
        }
    }
}
