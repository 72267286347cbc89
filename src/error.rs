//! Error taxonomy for the TSV public surface.
//!
//! `get`/`peek`/`wait`/`release` never fail (a never-set TSV is reported via
//! `Option`, not an error); only `set` can, and only for the reasons listed
//! here.

/// Errors reported by [`crate::Tsv::set`].
#[derive(Debug, thiserror::Error)]
pub enum TsvError {
    /// A bad argument was supplied (reserved for future fallible constructors;
    /// `set` itself takes `T` by value so it cannot be passed a null).
    #[error("invalid argument: {0}")]
    Invalid(&'static str),

    /// Allocation or primitive-init failure.
    #[error("resource allocation failed: {0}")]
    Resource(&'static str),

    /// A broken invariant was detected mid-operation (e.g. a writer mutex
    /// found poisoned by a prior panicking writer). Surfaced as an error
    /// rather than aborting the process, per spec.md's "either" clause for
    /// INTERNAL; never silently recovered.
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}
