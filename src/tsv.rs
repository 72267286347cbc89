//! The public surface (spec.md §4.1): `Tsv<T>` and its six operations.
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crate::cache;
use crate::engine::{EngineImpl, EngineKind};
use crate::error::TsvError;
use crate::waiter::Waiter;
use crate::wrapper::{decref, incref, Destructor, Wrapper};

/// Source of per-`Tsv` cache keys (see `Tsv::id`). A process-wide counter,
/// not an address: addresses get reused by the allocator the moment a
/// `Tsv<T>` is dropped, and a thread's per-thread cache entry must not be
/// silently reinterpreted as belonging to whatever same-`T` `Tsv` a later
/// allocation happens to land on.
static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// A thread-safe variable: a shared cell holding a pointer-like value that
/// readers obtain at near-zero cost and writers replace without blocking
/// readers.
///
/// A value read by a thread (via [`Tsv::get`]) remains valid in that thread
/// until it reads the next value, calls [`Tsv::release`], or the thread
/// exits; stale values are destroyed automatically once the last reference
/// to them is dropped.
///
/// `Tsv<T>` runs one of two engines (see [`EngineKind`]) behind this one
/// type; both satisfy the same contract.
pub struct Tsv<T: Send + Sync + 'static> {
    id: usize,
    engine: EngineImpl<T>,
    destructor: Destructor<T>,
    waiter: Waiter,
    // Ties this type's auto `Send`/`Sync` to `T`'s: the raw pointers inside
    // `engine` are themselves unconditionally `Send`/`Sync` (they're just
    // machine words), but sharing the *value* they point to across threads
    // is only sound when `T` itself is `Send + Sync`.
    _marker: PhantomData<T>,
}

impl<T: Send + Sync + 'static> Tsv<T> {
    /// Creates a new, empty TSV running the slot-pair engine with `T`'s own
    /// `Drop` impl as the destructor (spec.md `init`).
    pub fn new() -> Self {
        Self::from_parts(Destructor::default(), EngineKind::default())
    }

    /// Like [`Tsv::new`], but runs the given engine.
    pub fn with_engine(kind: EngineKind) -> Self {
        Self::from_parts(Destructor::default(), kind)
    }

    /// Like [`Tsv::new`], but invokes `destructor` instead of `T::drop` when
    /// a value's last reference is released.
    pub fn with_destructor<F>(destructor: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::from_parts(Destructor::new(destructor), EngineKind::default())
    }

    /// Combines [`Tsv::with_destructor`] and [`Tsv::with_engine`].
    pub fn with_destructor_and_engine<F>(destructor: F, kind: EngineKind) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::from_parts(Destructor::new(destructor), kind)
    }

    fn from_parts(destructor: Destructor<T>, kind: EngineKind) -> Self {
        Tsv {
            id: NEXT_ID.fetch_add(1, AtomicOrdering::SeqCst),
            engine: EngineImpl::new(kind),
            destructor,
            waiter: Waiter::new(),
            _marker: PhantomData,
        }
    }

    /// A process-wide identifier, distinct from every other `Tsv` that has
    /// ever existed (not just those currently live) — used to key this
    /// thread's cache entry (`crate::cache`) without risk of a dropped
    /// `Tsv`'s stale cache entry being mistaken for a new one that happens
    /// to reuse its memory address.
    fn id(&self) -> usize {
        self.id
    }

    /// Which engine this instance runs.
    pub fn engine_kind(&self) -> EngineKind {
        self.engine.kind()
    }

    /// Returns the currently published value and its version, transferring
    /// the calling thread's cached reference to it, or `None` if nothing has
    /// ever been `set` (spec.md `get`).
    ///
    /// Per spec.md §5 "Cancellation": if a host runtime cancels this thread
    /// mid-call, the reference this call was about to take or transfer may
    /// leak. Do not cancel threads inside `get`/`set`; wrap them in a
    /// cancellation-disabled region if your runtime supports one.
    pub fn get(&self) -> Option<TsvGuard<'_, T>> {
        let id = self.id();
        let current = self.engine.current_version();
        if current != 0 {
            if let Some((ptr, v)) = cache::cached_entry::<T>(id) {
                if v == current {
                    // Fast path (spec.md §4.2 step 1): no atomics on shared
                    // state beyond the `current_version` load above.
                    unsafe { incref(ptr) };
                    return Some(TsvGuard::new(self, ptr, v));
                }
            }
        }
        let (ptr, version) = self.engine.read(id)?;
        unsafe { incref(ptr) }; // the guard's own reference, independent of the cache's
        cache::adopt(id, ptr, &self.destructor);
        Some(TsvGuard::new(self, ptr, version))
    }

    /// Like [`Tsv::get`], but never touches the per-thread cache: the
    /// returned guard owns its own reference and releases it when dropped,
    /// regardless of what this thread has previously read or will read
    /// next. Useful for a scoped read that shouldn't affect what `release`
    /// later tears down.
    pub fn peek(&self) -> Option<TsvGuard<'_, T>> {
        let (ptr, version) = self.engine.read(self.id())?;
        Some(TsvGuard::new(self, ptr, version))
    }

    /// Atomically publishes `value`, returning its version (spec.md `set`).
    /// Writers are serialized against each other; this may block briefly
    /// waiting for the slot-pair engine's previous slot to quiesce, but
    /// never blocks on another writer for more than the duration of one
    /// `set` call.
    pub fn set(&self, value: T) -> Result<u64, TsvError> {
        let version = self.engine.write(value, &self.destructor)?;
        if version == 1 {
            self.waiter.notify_first_publish();
        }
        Ok(version)
    }

    /// Blocks until at least one value has been published, returning
    /// immediately if one already has (spec.md `wait`).
    pub fn wait(&self) {
        self.waiter.wait_until(|| self.engine.current_version() != 0);
    }

    /// Drops the calling thread's cached reference, if any. Idempotent
    /// (spec.md `release`).
    pub fn release(&self) {
        cache::release::<T>(self.id());
    }

    /// Consumes the TSV. Equivalent to `drop(tsv)`; spelled out because
    /// spec.md's C-shaped contract names this operation `destroy` (§4.1).
    pub fn destroy(self) {
        drop(self);
    }
}

impl<T: Send + Sync + 'static> Default for Tsv<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Drop for Tsv<T> {
    fn drop(&mut self) {
        // Release this thread's cached reference first (spec.md `destroy`),
        // then the engine's own slot/list references. Any reference held by
        // *other* threads' caches is released independently, by them, later
        // (spec.md: "live wrappers still referenced by other threads are
        // released when those threads exit").
        cache::release::<T>(self.id());
        self.engine.teardown(&self.destructor);
    }
}

/// A scoped handle to one value read from a [`Tsv`], returned by
/// [`Tsv::get`] and [`Tsv::peek`].
pub struct TsvGuard<'a, T: Send + Sync + 'static> {
    tsv: &'a Tsv<T>,
    wrapper: *mut Wrapper<T>,
    version: u64,
}

impl<'a, T: Send + Sync + 'static> TsvGuard<'a, T> {
    fn new(tsv: &'a Tsv<T>, wrapper: *mut Wrapper<T>, version: u64) -> Self {
        TsvGuard { tsv, wrapper, version }
    }

    /// The version this value was published with.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl<'a, T: Send + Sync + 'static> Deref for TsvGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { (*self.wrapper).value() }
    }
}

impl<'a, T: Send + Sync + 'static> Drop for TsvGuard<'a, T> {
    fn drop(&mut self) {
        unsafe { decref(self.wrapper, &self.tsv.destructor) };
    }
}
