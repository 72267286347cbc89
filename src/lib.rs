//! A thread-safe variable (TSV): a shared cell holding a pointer-like value
//! that readers may obtain at near-zero cost, and writers may replace
//! without ever blocking readers.
//!
//! A value read by a thread (via [`Tsv::get`]) remains valid in that thread
//! until it reads the next value or explicitly [`Tsv::release`]s it; stale
//! values are destroyed automatically once the last reference to them is
//! dropped.
//!
//! Two engines implement the same contract with opposite trade-offs — see
//! [`EngineKind`]:
//!
//! - [`EngineKind::SlotPair`] (the default): two fixed slots and a version
//!   counter. Reads never allocate; writers may briefly wait for the
//!   previous slot to quiesce.
//! - [`EngineKind::SubscriptionSlots`]: a linked list of live values plus a
//!   hazard-pointer cell per reader thread. Reads never block; writers
//!   garbage-collect by scanning every cell.
//!
//! # Example
//!
//! ```
//! use tsv::Tsv;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let tsv = Arc::new(Tsv::<i32>::new());
//! assert!(tsv.get().is_none());
//!
//! let v1 = tsv.set(1).unwrap();
//! assert_eq!(v1, 1);
//!
//! let reader = {
//!     let tsv = tsv.clone();
//!     thread::spawn(move || {
//!         tsv.wait();
//!         let guard = tsv.get().unwrap();
//!         assert_eq!(*guard, 1);
//!         guard.version()
//!     })
//! };
//! assert_eq!(reader.join().unwrap(), 1);
//! ```
mod cache;
mod engine;
mod error;
mod slot_pair;
mod subscription;
mod sync;
mod tsv;
mod waiter;
mod wrapper;

pub use engine::EngineKind;
pub use error::TsvError;
pub use tsv::{Tsv, TsvGuard};
pub use wrapper::DestructorFn;
