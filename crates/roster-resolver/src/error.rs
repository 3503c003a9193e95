//! Error types for identity resolution.

/// Errors that can occur while resolving a display name to an identity.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The remote lookup service failed (network error, 5xx, bad body).
    /// Recoverable: [`FallbackResolver`](crate::FallbackResolver) maps
    /// this to a deterministic offline identity.
    #[error("remote identity lookup failed: {0}")]
    RemoteFailed(String),

    /// The remote service answered but knows no identity for this name.
    #[error("no identity known for display name {0:?}")]
    UnknownName(String),
}
