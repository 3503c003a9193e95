//! Error types for the tracker layer.

use roster_resolver::ResolveError;
use roster_store::StoreError;

/// Errors that can occur in the session tracker.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A configuration value was rejected (e.g. session timeout below
    /// the floor). Fails fast at the call site.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The persistent store failed. Surfaced, never swallowed: a lost
    /// write on a session transition risks a permanently stuck session.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Identity resolution failed and the configured resolver chain did
    /// not recover it. With the standard fallback chain this does not
    /// occur; a custom bare resolver can produce it.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
