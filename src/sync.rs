//! Indirection over the atomics/locking primitives the engines build on, so
//! the hard part of this crate (`slot_pair`, `subscription`, `waiter`) can run
//! under [`loom`] for model checking (`cfg(loom)`) as well as plain `std`.
//!
//! This mirrors the same `#[cfg(loom)]` swap `local-rcu`'s `lib.rs` does; we
//! just centralize it so every module that needs it imports from here
//! instead of repeating the `#[cfg(...)]` pair.
//!
//! The per-thread cache (`crate::cache`) deliberately does *not* route its
//! `thread_local!` through here: spec.md lists thread-local storage as an
//! out-of-scope external collaborator, and loom does not model `std`'s TLS
//! faithfully. Its loom tests exercise the engines, not the cache layer.

#[cfg(loom)]
pub(crate) use loom::sync::atomic;
#[cfg(loom)]
pub(crate) use loom::sync::{Condvar, Mutex};
#[cfg(loom)]
pub(crate) use loom::thread;

#[cfg(not(loom))]
pub(crate) use std::sync::atomic;
#[cfg(not(loom))]
pub(crate) use std::sync::{Condvar, Mutex};
#[cfg(not(loom))]
pub(crate) use std::thread;
