// src/engine/gate.rs

//! Single-flight gate.
//!
//! A gate is either open or closed. [`Gate::try_enter`] atomically flips it
//! from open to closed and hands out a [`GatePermit`]; every other caller
//! gets `None` until that permit is dropped. There is no queue: a trigger
//! that finds the gate closed is simply dropped.
//!
//! Reopening happens in `Drop`, so the gate is released on every exit path
//! of the work it guards, including early returns and panics.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

pub struct Gate {
    name: &'static str,
    closed: AtomicBool,
    /// Number of completed cycles; bumped on every release.
    cycles: AtomicU64,
    reopened: Notify,
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .field("cycles", &self.cycles())
            .finish()
    }
}

impl Gate {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            closed: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            reopened: Notify::new(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Close the gate if it is open.
    ///
    /// Returns `None` when another cycle holds the gate.
    pub fn try_enter(self: &Arc<Self>) -> Option<GatePermit> {
        self.closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GatePermit {
                gate: Arc::clone(self),
            })
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Wait until the gate is open.
    ///
    /// Returns immediately if it already is. Another caller may close the
    /// gate again before the waiter gets to act on it.
    pub async fn wait_open(&self) {
        loop {
            let notified = self.reopened.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_open() {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        self.cycles.fetch_add(1, Ordering::AcqRel);
        self.closed.store(false, Ordering::Release);
        self.reopened.notify_waiters();
    }
}

/// Proof that the holder is the only cycle running behind a [`Gate`].
#[must_use = "dropping the permit reopens the gate immediately"]
pub struct GatePermit {
    gate: Arc<Gate>,
}

impl fmt::Debug for GatePermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePermit")
            .field("gate", &self.gate.name)
            .finish()
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
