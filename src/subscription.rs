//! Algorithm variant B (spec.md §4.3): a singly-linked list of live wrappers
//! (head = newest) plus a hazard-pointer-style subscription cell per reader
//! thread. Writers garbage-collect by scanning every cell.
//!
//! Readers never block — they only loop on atomic loads — at the cost of
//! writers doing O(live wrappers × reader threads) work per `set` and the
//! cell registry living behind a mutex (see `CellTable` below).
use std::sync::Arc;

use slab::Slab;

use crate::cache;
use crate::error::TsvError;
use crate::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use crate::sync::{thread, Mutex};
use crate::wrapper::{decref, incref, Destructor, Wrapper};

/// Per-thread hazard-pointer cell: stores whatever wrapper that thread most
/// recently protected. `Arc`'d so a thread's registration can outlive the
/// `Tsv` itself (spec.md §9 "wrappers may outlive the TSV object").
pub(crate) type Cell<T> = Arc<AtomicPtr<Wrapper<T>>>;

/// The growable array of subscription cells (spec.md §3 "Subscription
/// slot"). A `slab::Slab` behind a mutex, mirroring `local-rcu`'s own
/// `epochs: Mutex<slab::Slab<Arc<AtomicUsize>>>` registry: the mutex is only
/// ever held for the O(1) insert/remove at registration/thread-exit, never
/// while a reader is doing its hazard-pointer loop, and never while a writer
/// is linking a new head — only while a writer is scanning for liveness.
pub(crate) type CellTable<T> = Arc<Mutex<Slab<Cell<T>>>>;

pub(crate) struct SubscriptionEngine<T> {
    head: AtomicPtr<Wrapper<T>>,
    /// Mirrors the newest wrapper's version without requiring a hazard-
    /// protected dereference of `head`, so `current_version` (used by
    /// `Tsv::get`'s fast path) stays cheap and safe to call unprotected.
    latest_version: AtomicU64,
    cells: CellTable<T>,
    writer_mutex: Mutex<()>,
}

impl<T> SubscriptionEngine<T> {
    pub(crate) fn new() -> Self {
        SubscriptionEngine {
            head: AtomicPtr::new(std::ptr::null_mut()),
            latest_version: AtomicU64::new(0),
            cells: Arc::new(Mutex::new(Slab::new())),
            writer_mutex: Mutex::new(()),
        }
    }

    pub(crate) fn current_version(&self) -> u64 {
        self.latest_version.load(Ordering::SeqCst)
    }

    /// spec.md §4.3 "Reader algorithm": the hazard-pointer discipline.
    /// `tsv_id` identifies the owning TSV so the calling thread's cell is
    /// looked up (and lazily registered) in the right per-thread cache slot.
    pub(crate) fn read(&self, tsv_id: usize) -> Option<(*mut Wrapper<T>, u64)> {
        let cell = cache::subscription_cell::<T>(tsv_id, &self.cells);
        loop {
            let h = self.head.load(Ordering::SeqCst);
            // Release: publishes the protection before we check it still
            // matches, pairing with the Acquire-equivalent SeqCst load below.
            cell.store(h, Ordering::SeqCst);
            let h2 = self.head.load(Ordering::SeqCst);
            if h2 == h {
                if h.is_null() {
                    return None;
                }
                unsafe { incref(h) };
                let version = unsafe { (*h).version };
                return Some((h, version));
            }
            // A writer relinked head while we were protecting the old value;
            // loop and protect whatever is current now.
        }
    }

    /// spec.md §4.3 "Writer algorithm".
    pub(crate) fn write(&self, value: T, destructor: &Destructor<T>) -> Result<u64, TsvError> {
        let version = {
            let guard = self
                .writer_mutex
                .lock()
                .map_err(|_| TsvError::Internal("subscription writer mutex poisoned"))?;

            let old_head = self.head.load(Ordering::SeqCst);
            let version = if old_head.is_null() {
                1
            } else {
                unsafe { (*old_head).version + 1 }
            };
            let ptr = Wrapper::new_boxed(value, version);
            unsafe {
                incref(ptr); // the list's own reference
                (*ptr).next.store(old_head, Ordering::SeqCst);
            }
            self.head.store(ptr, Ordering::SeqCst);
            self.latest_version.store(version, Ordering::SeqCst);

            self.collect_garbage(destructor);
            drop(guard);
            version
        };

        // Anti-starvation: give a reader stuck in its hazard-protect loop a
        // chance to observe the new head before we potentially write again.
        thread::yield_now();
        log::debug!("tsv set: subscription-slots published version {version}");
        Ok(version)
    }

    /// spec.md §4.3 step 3: walk the list, unlinking and freeing any
    /// non-head wrapper no subscription cell still protects.
    fn collect_garbage(&self, destructor: &Destructor<T>) {
        let head = self.head.load(Ordering::SeqCst);
        if head.is_null() {
            return;
        }
        let mut reclaimed = 0u32;
        let mut prev = head;
        loop {
            let node = unsafe { (*prev).next.load(Ordering::SeqCst) };
            if node.is_null() {
                break;
            }
            if self.is_protected(node) {
                prev = node;
                continue;
            }
            let next = unsafe { (*node).next.load(Ordering::SeqCst) };
            unsafe { (*prev).next.store(next, Ordering::SeqCst) };
            unsafe { decref(node, destructor) };
            reclaimed += 1;
        }
        if reclaimed > 0 {
            log::debug!("tsv gc: reclaimed {reclaimed} superseded value(s)");
        }
    }

    fn is_protected(&self, ptr: *mut Wrapper<T>) -> bool {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.iter().any(|(_, cell)| cell.load(Ordering::SeqCst) == ptr)
    }

    /// Releases the list's own references on every remaining wrapper. Only
    /// called once, from `Tsv::drop`, with exclusive (`&mut`) access.
    pub(crate) fn teardown(&mut self, destructor: &Destructor<T>) {
        let mut current = *self.head.get_mut();
        while !current.is_null() {
            let next = unsafe { (*current).next.load(Ordering::SeqCst) };
            unsafe { decref(current, destructor) };
            current = next;
        }
    }
}
