//! The condvar every `wait` call blocks on until a TSV's first value lands.
use crate::sync::{Condvar, Mutex};

/// Gates `Tsv::wait` on the TSV's first successful `set`.
///
/// spec.md §4.4: a waiter first tries the predicate directly; only if that
/// fails does it park. On wake it re-checks (loop, not a single wait), and
/// once satisfied it signals the condvar once more before returning so
/// queued waiters drain one at a time (chain-wake) instead of every thread
/// waking simultaneously.
pub(crate) struct Waiter {
    gate: Mutex<()>,
    condvar: Condvar,
}

impl Waiter {
    pub(crate) fn new() -> Self {
        Waiter {
            gate: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until `has_value()` returns true, then returns.
    pub(crate) fn wait_until(&self, mut has_value: impl FnMut() -> bool) {
        if has_value() {
            return;
        }
        let guard = self.gate.lock().unwrap_or_else(|e| e.into_inner());
        let mut guard = guard;
        while !has_value() {
            guard = match self.condvar.wait(guard) {
                Ok(g) => g,
                Err(e) => e.into_inner(),
            };
        }
        // Chain-wake: hand the signal to the next waiter before we drop the
        // gate, rather than `notify_all` waking the whole herd at once.
        self.condvar.notify_one();
    }

    /// Called by a writer exactly once, after the TSV's first successful
    /// publish, to wake the first parked waiter (spec.md §4.4: `signal`, not
    /// `broadcast`).
    pub(crate) fn notify_first_publish(&self) {
        let _guard = self.gate.lock().unwrap_or_else(|e| e.into_inner());
        self.condvar.notify_one();
    }
}
