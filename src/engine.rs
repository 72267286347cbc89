//! Picks which of the two published algorithms (spec.md §4.2, §4.3) a given
//! `Tsv<T>` runs, and dispatches the three operations each must provide.
//!
//! An enum rather than a trait object: both variants are known at compile
//! time per `Tsv<T>` instantiation, there's exactly one of them per TSV, and
//! avoiding `dyn` keeps the hot read path free of vtable indirection —
//! consistent with neither engine touching an allocator on the read path.
use crate::error::TsvError;
use crate::slot_pair::SlotPairEngine;
use crate::subscription::SubscriptionEngine;
use crate::wrapper::{Destructor, Wrapper};

/// Which algorithm a [`crate::Tsv`] runs. See spec.md §1 for the trade-off
/// each makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Two fixed slots, a version counter, per-slot reader pins. Allocates
    /// nothing on the read path; writers may briefly wait for the previous
    /// slot to quiesce.
    SlotPair,
    /// A linked list of live values plus a hazard-pointer-style subscription
    /// cell per reader thread. Writers garbage-collect by scanning cells;
    /// readers never block.
    SubscriptionSlots,
}

impl Default for EngineKind {
    fn default() -> Self {
        EngineKind::SlotPair
    }
}

pub(crate) enum EngineImpl<T> {
    SlotPair(SlotPairEngine<T>),
    Subscription(SubscriptionEngine<T>),
}

impl<T: Send + Sync + 'static> EngineImpl<T> {
    pub(crate) fn new(kind: EngineKind) -> Self {
        match kind {
            EngineKind::SlotPair => EngineImpl::SlotPair(SlotPairEngine::new()),
            EngineKind::SubscriptionSlots => EngineImpl::Subscription(SubscriptionEngine::new()),
        }
    }

    pub(crate) fn kind(&self) -> EngineKind {
        match self {
            EngineImpl::SlotPair(_) => EngineKind::SlotPair,
            EngineImpl::Subscription(_) => EngineKind::SubscriptionSlots,
        }
    }

    /// The version currently published, or 0 if nothing has been `set` yet.
    /// Cheap: a single atomic load, never dereferences a wrapper pointer, so
    /// it is safe to call without holding any reference (see
    /// `subscription::SubscriptionEngine::latest_version` for why that
    /// matters for that engine).
    pub(crate) fn current_version(&self) -> u64 {
        match self {
            EngineImpl::SlotPair(e) => e.current_version(),
            EngineImpl::Subscription(e) => e.current_version(),
        }
    }

    /// Reads the currently published wrapper, returning it with one strong
    /// reference already taken on the caller's behalf. `tsv_id` identifies
    /// the owning `Tsv` for the subscription engine's per-thread cell
    /// registry; the slot-pair engine ignores it.
    pub(crate) fn read(&self, tsv_id: usize) -> Option<(*mut Wrapper<T>, u64)> {
        match self {
            EngineImpl::SlotPair(e) => e.read(),
            EngineImpl::Subscription(e) => e.read(tsv_id),
        }
    }

    pub(crate) fn write(&self, value: T, destructor: &Destructor<T>) -> Result<u64, TsvError> {
        match self {
            EngineImpl::SlotPair(e) => e.write(value, destructor),
            EngineImpl::Subscription(e) => e.write(value, destructor),
        }
    }

    /// Releases the engine's own (TSV-owned) references. Called once, from
    /// `Tsv::drop`, after the calling thread's cached reference has already
    /// been released. Any reference still held by other threads' per-thread
    /// caches is unaffected and is released independently by those threads.
    pub(crate) fn teardown(&mut self, destructor: &Destructor<T>) {
        match self {
            EngineImpl::SlotPair(e) => e.teardown(destructor),
            EngineImpl::Subscription(e) => e.teardown(destructor),
        }
    }
}
