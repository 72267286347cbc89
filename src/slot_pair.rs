//! Algorithm variant A (spec.md §4.2): two fixed slots, a monotonic version
//! counter, per-slot active-reader pins, a writer mutex + condvar.
//!
//! Readers never allocate and almost never contend: the only lock they ever
//! touch is the writer-wait mutex, and only when they happen to be the last
//! reader draining a slot a writer is waiting on. Writers are serialized
//! against each other and, at most, wait for one slot to quiesce.
use std::time::Duration;

use crate::error::TsvError;
use crate::sync::atomic::{AtomicU32, AtomicU64, AtomicPtr, Ordering};
use crate::sync::{Condvar, Mutex};
use crate::wrapper::{decref, incref, Destructor, Wrapper};

/// How long a writer waits on the quiescence condvar between stall-warning
/// log lines. This is *not* the signal-loss workaround spec.md §9 warns
/// against: the wait itself is unbounded (the loop condition is the only
/// thing that ends it), this timeout only paces `log::warn!` calls while a
/// writer is stuck behind a slow reader.
const STALL_LOG_INTERVAL: Duration = Duration::from_millis(250);

struct Slot<T> {
    wrapper: AtomicPtr<Wrapper<T>>,
    active_readers: AtomicU32,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Slot {
            wrapper: AtomicPtr::new(std::ptr::null_mut()),
            active_readers: AtomicU32::new(0),
        }
    }
}

pub(crate) struct SlotPairEngine<T> {
    slots: [Slot<T>; 2],
    /// Count of values published so far; 0 means "never set". The slot
    /// currently holding the freshest wrapper is `slots[(next_version - 1) & 1]`
    /// whenever `next_version > 0` (spec.md §3 "Version counter").
    next_version: AtomicU64,
    writer_mutex: Mutex<()>,
    writer_wait: Mutex<()>,
    writer_condvar: Condvar,
}

impl<T> SlotPairEngine<T> {
    pub(crate) fn new() -> Self {
        SlotPairEngine {
            slots: [Slot::empty(), Slot::empty()],
            next_version: AtomicU64::new(0),
            writer_mutex: Mutex::new(()),
            writer_wait: Mutex::new(()),
            writer_condvar: Condvar::new(),
        }
    }

    pub(crate) fn current_version(&self) -> u64 {
        self.next_version.load(Ordering::SeqCst)
    }

    /// spec.md §4.2 "Reader algorithm", steps 2-7 (step 1, the per-thread
    /// fast path, lives in `Tsv::get`).
    pub(crate) fn read(&self) -> Option<(*mut Wrapper<T>, u64)> {
        let nv = self.next_version.load(Ordering::SeqCst);
        if nv == 0 {
            return None;
        }

        // Step 3: pin the slot the version counter currently indicates.
        let idx0 = ((nv - 1) & 1) as usize;
        self.slots[idx0].active_readers.fetch_add(1, Ordering::SeqCst);

        // Step 4/5: if a writer raced ahead while we were pinning, pin the
        // sibling too before deciding which one to actually read from. Both
        // slots stay pinned until step 7 releases them.
        let mut read_idx = idx0;
        let mut other_pinned = false;
        let nv2 = self.next_version.load(Ordering::SeqCst);
        if nv2 != nv {
            let other0 = idx0 ^ 1;
            self.slots[other0].active_readers.fetch_add(1, Ordering::SeqCst);
            other_pinned = true;
            let nv3 = self.next_version.load(Ordering::SeqCst);
            read_idx = ((nv3 - 1) & 1) as usize;
        }

        // Step 6: take our own reference and read the value out.
        let wrapper_ptr = self.slots[read_idx].wrapper.load(Ordering::SeqCst);
        let result = if wrapper_ptr.is_null() {
            // Only reachable if a first writer raced between our `nv` load
            // and populating both slots; see `write`'s bootstrap branch,
            // which populates both slots before publishing `next_version`,
            // so this is defensive rather than expected in practice.
            None
        } else {
            unsafe { incref(wrapper_ptr) };
            let version = unsafe { (*wrapper_ptr).version };
            Some((wrapper_ptr, version))
        };

        // Step 7: release exactly the pins we took.
        self.unpin(idx0, other_pinned.then_some(idx0 ^ 1));

        result
    }

    fn unpin(&self, idx: usize, other_idx: Option<usize>) {
        if self.slots[idx].active_readers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify_writer();
        }
        if let Some(other_idx) = other_idx {
            if self.slots[other_idx].active_readers.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.notify_writer();
            }
        }
    }

    fn notify_writer(&self) {
        // Best-effort: this mutex guards no data of its own, only pairs with
        // the condvar, so a poisoned lock (a writer panicking mid-wait) is
        // recovered rather than propagated — there is no invariant to lose.
        let _guard = self
            .writer_wait
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        self.writer_condvar.notify_one();
    }

    /// spec.md §4.2 "Writer algorithm".
    pub(crate) fn write(&self, value: T, destructor: &Destructor<T>) -> Result<u64, TsvError> {
        let guard = self
            .writer_mutex
            .lock()
            .map_err(|_| TsvError::Internal("slot-pair writer mutex poisoned"))?;

        let published = self.next_version.load(Ordering::SeqCst);
        let new_version = published + 1;
        let ptr = Wrapper::new_boxed(value, new_version);

        if published == 0 {
            // Bootstrap (step 3, V == 0): both slots start out pointing at
            // the same first value so neither is ever observed null again.
            unsafe {
                incref(ptr);
                incref(ptr);
            }
            self.slots[0].wrapper.store(ptr, Ordering::SeqCst);
            self.slots[1].wrapper.store(ptr, Ordering::SeqCst);
            self.next_version.store(new_version, Ordering::SeqCst);
            drop(guard);
            log::debug!("tsv set: slot-pair published first version {new_version}");
            return Ok(new_version);
        }

        let current_idx = ((published - 1) & 1) as usize;
        let target_idx = current_idx ^ 1;

        self.wait_for_quiescence(target_idx);

        let old_ptr = self.slots[target_idx].wrapper.load(Ordering::SeqCst);
        unsafe { incref(ptr) }; // the slot's own reference
        self.slots[target_idx].wrapper.store(ptr, Ordering::SeqCst);
        // Publish: this store is what makes the new value "current" for any
        // reader whose slot-selection load is sequenced after it.
        self.next_version.store(new_version, Ordering::SeqCst);

        drop(guard);

        if !old_ptr.is_null() {
            unsafe { decref(old_ptr, destructor) };
        }

        log::debug!("tsv set: slot-pair published version {new_version}");
        Ok(new_version)
    }

    fn wait_for_quiescence(&self, idx: usize) {
        let mut guard = self
            .writer_wait
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let mut waited = Duration::ZERO;
        while self.slots[idx].active_readers.load(Ordering::SeqCst) != 0 {
            let (g, timeout) = match self.writer_condvar.wait_timeout(guard, STALL_LOG_INTERVAL) {
                Ok(pair) => pair,
                Err(e) => e.into_inner(),
            };
            guard = g;
            if timeout.timed_out() {
                waited += STALL_LOG_INTERVAL;
                log::warn!("tsv writer stalled {waited:?} waiting for slot {idx} to quiesce");
            }
        }
    }

    /// Releases the engine's own references on both slots. Only called once,
    /// from `Tsv::drop`, with exclusive (`&mut`) access — no reader or writer
    /// can be concurrently active at this point.
    pub(crate) fn teardown(&mut self, destructor: &Destructor<T>) {
        let p0 = *self.slots[0].wrapper.get_mut();
        let p1 = *self.slots[1].wrapper.get_mut();
        if !p0.is_null() {
            unsafe { decref(p0, destructor) };
        }
        if !p1.is_null() && p1 != p0 {
            unsafe { decref(p1, destructor) };
        }
    }
}
