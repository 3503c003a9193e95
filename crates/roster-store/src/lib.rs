//! Durable player/session storage for Roster.
//!
//! One SQLite table, one row per identity, never deleted by this layer.
//! The session-relevant operations are deliberately conditional SQL:
//! starting a session only succeeds when no session is open, ending one
//! only touches rows with an open session. That makes `end_session`
//! idempotent and race-safe — when a real leave event and a watchdog
//! eviction race, the loser matches zero rows and reports a 0ms
//! duration instead of double-counting playtime.

mod error;
mod record;
mod store;

pub use error::StoreError;
pub use record::PlayerRecord;
pub use store::PlayerStore;
