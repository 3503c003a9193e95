//! Identity resolution for Roster.
//!
//! The session tracker works with stable identities, but the signals it
//! consumes (log lines, admin-protocol listings) only carry display
//! names. This crate owns the mapping between the two:
//!
//! 1. **Identity type** — [`PlayerId`], a UUID newtype.
//! 2. **Resolution seam** — the [`Resolve`] trait. The actual remote
//!    lookup (a vendor account API, a directory service) is a
//!    collaborator implemented elsewhere; this crate only defines the
//!    interface and the pieces every deployment needs:
//! 3. **Fallback** — [`FallbackResolver`] recovers from remote failures
//!    with a deterministic hash-derived identity, so resolution never
//!    blocks session tracking.
//! 4. **Caching** — [`CachedResolver`] puts a time-bounded cache in
//!    front of any resolver.

#![allow(async_fn_in_trait)]

mod error;
mod id;
mod resolver;

pub use error::ResolveError;
pub use id::PlayerId;
pub use resolver::{CachedResolver, FallbackResolver, OfflineResolver, Resolve};
