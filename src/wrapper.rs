//! Refcounted envelope around one published value.
//!
//! A `Wrapper<T>` is the unit both engines publish, pin, and eventually free.
//! Neither engine inspects `T`'s bytes; they only move the wrapper pointer
//! around and keep its refcount honest.
use std::mem::ManuallyDrop;
use std::sync::Arc;

use crate::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

/// A user-supplied destructor, invoked exactly once per value when its
/// wrapper's refcount transitions to zero. Closures over captured state are
/// supported (spec.md §9 "Dynamic dispatch": no raw function pointer
/// required).
pub type DestructorFn<T> = dyn Fn(T) + Send + Sync;

/// Shared handle to a TSV's destructor. Cheap to clone; every `Wrapper<T>`
/// produced by a given `Tsv<T>` is freed through the same `Destructor<T>`.
pub(crate) struct Destructor<T>(Arc<DestructorFn<T>>);

impl<T> Clone for Destructor<T> {
    fn clone(&self) -> Self {
        Destructor(self.0.clone())
    }
}

impl<T> Destructor<T> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Destructor(Arc::new(f))
    }

    pub(crate) fn call(&self, value: T) {
        (self.0)(value)
    }
}

impl<T: 'static> Default for Destructor<T> {
    /// Falls back to `T`'s own `Drop` impl when the caller supplies none.
    fn default() -> Self {
        Destructor::new(|v: T| drop(v))
    }
}

/// Refcounted envelope around one published value.
///
/// Invariants: `refcount > 0` implies the value is still live; the
/// transition to `refcount == 0` happens exactly once and triggers exactly
/// one destructor call, after which the wrapper's storage is freed
/// (`decref`). `version` is set once at construction and never mutated
/// afterwards, so reading it concurrently with other readers is race-free.
pub(crate) struct Wrapper<T> {
    value: ManuallyDrop<T>,
    refcount: AtomicU32,
    pub(crate) version: u64,
    /// Intrusive link used only by the subscription-slots engine; left null
    /// and unused by the slot-pair engine.
    pub(crate) next: AtomicPtr<Wrapper<T>>,
}

impl<T> Wrapper<T> {
    /// Allocates a new wrapper with `refcount == 0` (spec.md §4.5
    /// `Allocated`). The caller is expected to `incref` it into whichever
    /// slot/list position publishes it, per engine.
    pub(crate) fn new_boxed(value: T, version: u64) -> *mut Wrapper<T> {
        Box::into_raw(Box::new(Wrapper {
            value: ManuallyDrop::new(value),
            refcount: AtomicU32::new(0),
            version,
            next: AtomicPtr::new(std::ptr::null_mut()),
        }))
    }

    pub(crate) fn value(&self) -> &T {
        &self.value
    }
}

/// Takes one strong reference on the wrapper at `ptr`.
///
/// # Safety
/// `ptr` must point at a live `Wrapper<T>` (its storage has not yet been
/// freed by a prior `decref` that observed the last reference).
pub(crate) unsafe fn incref<T>(ptr: *mut Wrapper<T>) {
    (*ptr).refcount.fetch_add(1, Ordering::SeqCst);
}

/// Drops one strong reference on the wrapper at `ptr`. If it was the last
/// reference, invokes `destructor` on the value exactly once and frees the
/// wrapper's storage.
///
/// # Safety
/// `ptr` must point at a live `Wrapper<T>` that the caller holds a strong
/// reference to (via a prior `incref`, or as the wrapper's initial
/// TSV-owned reference at publish time).
pub(crate) unsafe fn decref<T>(ptr: *mut Wrapper<T>, destructor: &Destructor<T>) {
    if (*ptr).refcount.fetch_sub(1, Ordering::SeqCst) == 1 {
        let mut boxed = Box::from_raw(ptr);
        let value = ManuallyDrop::take(&mut boxed.value);
        destructor.call(value);
        // `boxed` drops here, freeing the wrapper's storage. `value` is now a
        // spent `ManuallyDrop`, so this does not double-run `T`'s destructor.
    }
}
