//! Error kinds shared by every operator in the refinement pipeline.
//!
//! The five kinds and their propagation policy are part of the external
//! contract (see the manager operations in [`crate::manager`]): callers
//! that treat a status as "no candidate" match on [`Error::NotFound`] or
//! [`Error::NotInitialised`]; everything else is fatal for the current
//! operator's pass.

use thiserror::Error;

/// Catch-all error for the refinement pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A lookup in an id-keyed store found nothing. Recoverable at callers
    /// that treat it as "no candidate".
    #[error("not found: {0}")]
    NotFound(String),
    /// A configuration value was out of range, or an input constraint was
    /// violated (e.g. an empty list where a non-empty one is required).
    /// Fatal for the current operator.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Attempted to insert a duplicate into an id-keyed set that must stay
    /// unique. Indicates a framework-invariant violation; fatal.
    #[error("already present: {0}")]
    AlreadyPresent(String),
    /// An expected invariant did not hold (e.g. a recomputed cluster id
    /// does not match the key it was stored under). Fatal; the caller
    /// aborts the current pass.
    #[error("invariant violated: {0}")]
    Failure(String),
    /// An optional field was read before it was set (e.g. a cluster's
    /// best-guess track before one was assigned). Recoverable at callers
    /// with a fallback.
    #[error("not initialised: {0}")]
    NotInitialised(String),
}

impl Error {
    /// True for the two kinds a candidate-selection loop may treat as
    /// "skip this candidate, keep iterating".
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotInitialised(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
