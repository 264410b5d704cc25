//! Keyed coalescing scheduler.
//!
//! # Responsibility
//! - Collapse bursts of trigger signals into at most one task per window
//!   (leading edge suppressed, trailing edge guaranteed).
//!
//! # Invariants
//! - Rescheduling a pending key replaces its task but keeps the original
//!   deadline, so a task fires at most once per window.
//! - Time is supplied by the caller; nothing here reads a clock, which
//!   keeps coalescing deterministic under test.
//! - Each window is its own instance; the projection-rebuild and
//!   note-persist windows are never shared.

use std::time::{Duration, Instant};

/// Stable identifier for one coalesced task slot.
pub type TaskKey = &'static str;

struct Pending<T> {
    key: TaskKey,
    deadline: Instant,
    task: T,
}

/// Single-window scheduler holding at most one pending task per key.
pub struct Scheduler<T> {
    window: Duration,
    pending: Vec<Pending<T>>,
}

impl<T> Scheduler<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedules `task` under `key`.
    ///
    /// A fresh key gets deadline `now + window`. A pending key keeps its
    /// deadline and only swaps the payload (last-write-wins).
    pub fn schedule(&mut self, key: TaskKey, now: Instant, task: T) {
        if let Some(slot) = self.pending.iter_mut().find(|slot| slot.key == key) {
            slot.task = task;
            return;
        }
        self.pending.push(Pending {
            key,
            deadline: now + self.window,
            task,
        });
    }

    /// Removes and returns every task whose deadline has passed, in
    /// scheduling order.
    pub fn take_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].deadline <= now {
                due.push(self.pending.remove(index).task);
            } else {
                index += 1;
            }
        }
        due
    }

    pub fn is_pending(&self, key: TaskKey) -> bool {
        self.pending.iter().any(|slot| slot.key == key)
    }

    /// Drops a pending key, if any. Superseding normally happens through
    /// `schedule`; explicit cancellation exists for teardown paths.
    pub fn cancel(&mut self, key: TaskKey) -> Option<T> {
        let index = self.pending.iter().position(|slot| slot.key == key)?;
        Some(self.pending.remove(index).task)
    }

    /// Earliest pending deadline, for callers that drive a timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|slot| slot.deadline).min()
    }
}
