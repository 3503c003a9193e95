//! Error types for the authority client.
//!
//! All of these are transient from the system's point of view: the
//! tracker's failure governor counts them, it never crashes on them.

/// Errors that can occur talking to the remote authority.
#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    /// Could not reach the authority (connect refused, DNS, reset).
    #[error("authority unreachable: {0}")]
    Unreachable(#[source] std::io::Error),

    /// The authority rejected our credentials during the handshake.
    #[error("authority rejected authentication")]
    AuthFailed,

    /// A request exceeded its bounded timeout.
    #[error("authority request timed out")]
    Timeout,

    /// The authority answered with something we could not parse.
    #[error("authority protocol error: {0}")]
    Protocol(String),
}

impl AuthorityError {
    /// Maps an I/O failure on an established connection.
    pub(crate) fn io(err: std::io::Error) -> Self {
        Self::Unreachable(err)
    }
}
