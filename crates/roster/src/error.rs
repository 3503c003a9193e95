//! Unified error type for the Roster stack.

use roster_authority::AuthorityError;
use roster_resolver::ResolveError;
use roster_store::StoreError;
use roster_tracker::TrackerError;

/// Top-level error that wraps all crate-specific errors.
///
/// Users of the `roster` meta-crate deal with this single type; the
/// `#[from]` impls let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    /// Talking to the remote authority failed.
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Identity resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The persistent store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The tracker rejected an operation or configuration.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}
