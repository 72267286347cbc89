//! The per-thread cache (spec.md §3 "Per-thread cache"): for each (TSV,
//! thread) pair, at most one wrapper is held on that thread's behalf.
//!
//! This is plain `std::thread_local!`, not loom-gated: spec.md lists
//! thread-local storage as an out-of-scope external collaborator ("the
//! implementer uses whatever per-thread key facility the platform
//! provides"), and loom does not model `std` TLS faithfully across its
//! simulated scheduler. `slot_pair`'s engine never touches this module, so
//! it gets its own loom tests that bypass it entirely
//! (`slot_pair::loom_tests`); `subscription`'s hazard cells are registered
//! here, so its loom coverage (`tests/loom.rs`) necessarily runs this module
//! too — harmless, since every entry here is read and written only by its
//! owning thread and never shared.
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ptr;

use crate::subscription::{Cell, CellTable};
use crate::wrapper::{decref, Destructor, Wrapper};

/// Everything one thread remembers about one TSV: the wrapper it last read
/// (if any, for the refcounted hold) plus, for TSVs running the
/// subscription-slots engine, its registered hazard cell (kept across calls
/// so a thread registers at most once per TSV, per spec.md §3: "allocated on
/// first read and persist until thread exit").
struct CacheSlot<T: 'static> {
    wrapper: *mut Wrapper<T>,
    destructor: Destructor<T>,
    subscription: Option<SubscriptionHandle<T>>,
}

impl<T: 'static> CacheSlot<T> {
    fn empty() -> Self {
        CacheSlot {
            wrapper: ptr::null_mut(),
            destructor: Destructor::default(),
            subscription: None,
        }
    }
}

impl<T: 'static> Drop for CacheSlot<T> {
    fn drop(&mut self) {
        if !self.wrapper.is_null() {
            // SAFETY: `wrapper` was stored here by `adopt`, which only ever
            // stores a pointer this thread already holds a strong reference
            // to.
            unsafe { decref(self.wrapper, &self.destructor) };
        }
        // `subscription`, if present, releases its slab slot via its own
        // `Drop` impl below — this runs at thread-exit even if the owning
        // `Tsv` has already been dropped, because it holds its own clone of
        // the cell table `Arc` rather than a reference into the `Tsv`.
    }
}

struct SubscriptionHandle<T> {
    cells: CellTable<T>,
    index: usize,
    cell: Cell<T>,
}

impl<T> Drop for SubscriptionHandle<T> {
    fn drop(&mut self) {
        if let Ok(mut cells) = self.cells.lock() {
            cells.remove(self.index);
        }
    }
}

thread_local! {
    static CACHE: RefCell<HashMap<usize, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

fn with_slot<T: 'static, R>(tsv_id: usize, f: impl FnOnce(&mut CacheSlot<T>) -> R) -> R {
    CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let entry = cache
            .entry(tsv_id)
            .or_insert_with(|| Box::new(CacheSlot::<T>::empty()) as Box<dyn Any>);
        let slot = entry
            .downcast_mut::<CacheSlot<T>>()
            .expect("tsv cache slot type mismatch: tsv_id collided across distinct T, which should be impossible for a process-wide counter");
        f(slot)
    })
}

/// Adopts `new_wrapper` (already `incref`'d on the caller's behalf) into
/// this thread's cache for `tsv_id`, releasing whatever this thread
/// previously held for the same TSV. Leaves any subscription registration
/// untouched.
pub(crate) fn adopt<T: 'static>(tsv_id: usize, new_wrapper: *mut Wrapper<T>, destructor: &Destructor<T>) {
    with_slot::<T, _>(tsv_id, |slot| {
        let old = std::mem::replace(&mut slot.wrapper, new_wrapper);
        slot.destructor = destructor.clone();
        if !old.is_null() {
            unsafe { decref(old, destructor) };
        }
    });
}

/// The wrapper and version this thread currently has cached for `tsv_id`,
/// if any — used by `Tsv::get`'s fast path (spec.md §4.2 step 1).
pub(crate) fn cached_entry<T: 'static>(tsv_id: usize) -> Option<(*mut Wrapper<T>, u64)> {
    CACHE.with(|cache| {
        cache.borrow().get(&tsv_id).and_then(|entry| {
            entry.downcast_ref::<CacheSlot<T>>().and_then(|slot| {
                if slot.wrapper.is_null() {
                    None
                } else {
                    Some((slot.wrapper, unsafe { (*slot.wrapper).version }))
                }
            })
        })
    })
}

/// Drops this thread's cached reference for `tsv_id`, if any. Idempotent:
/// calling it again before another `get` is a no-op (spec.md `release`).
pub(crate) fn release<T: 'static>(tsv_id: usize) {
    CACHE.with(|cache| {
        if let Some(entry) = cache.borrow_mut().get_mut(&tsv_id) {
            if let Some(slot) = entry.downcast_mut::<CacheSlot<T>>() {
                if !slot.wrapper.is_null() {
                    let old = std::mem::replace(&mut slot.wrapper, ptr::null_mut());
                    unsafe { decref(old, &slot.destructor) };
                }
            }
        }
    });
}

/// Returns this thread's hazard cell for `tsv_id`, registering one in
/// `cells` on first use.
pub(crate) fn subscription_cell<T: 'static>(tsv_id: usize, cells: &CellTable<T>) -> Cell<T> {
    with_slot::<T, _>(tsv_id, |slot| {
        if slot.subscription.is_none() {
            let cell: Cell<T> = std::sync::Arc::new(crate::sync::atomic::AtomicPtr::new(ptr::null_mut()));
            let index = cells
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(cell.clone());
            slot.subscription = Some(SubscriptionHandle {
                cells: cells.clone(),
                index,
                cell: cell.clone(),
            });
        }
        slot.subscription.as_ref().unwrap().cell.clone()
    })
}
