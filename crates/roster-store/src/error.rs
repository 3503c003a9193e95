//! Error types for the store layer.

/// Errors that can occur accessing the player table.
///
/// A failed write on a session transition must never be swallowed — it
/// risks a permanently stuck "online" row — so everything here
/// propagates to the caller, which logs loudly and keeps its task alive.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database failed (I/O, locking, constraint).
    #[error("store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    /// A stored row contains data we cannot interpret (e.g. a key that
    /// is not a UUID). Indicates external tampering or corruption.
    #[error("corrupt player row: {0}")]
    Corrupt(String),
}
