//! The session-tracking reconciliation engine.
//!
//! Two independent sources claim to know who is online, and they
//! disagree under failure:
//!
//! - **Events** (join/leave lines from the server log) are precise but
//!   lossy — a crashed client never says goodbye.
//! - **Polls** (the admin protocol's `list` command) are authoritative
//!   but periodic, and the authority itself can be down.
//!
//! This crate reconciles the two without ever reporting a false
//! "online" forever, and without cutting a real session on a transient
//! outage:
//!
//! ```text
//! join/leave events ──→ SessionTracker ──→ PlayerStore
//!                            ↑
//! poll task ─→ authority ─→ reconcile (gated by the Governor)
//! watchdog task ──────────→ check_stale ─→ forced session ends
//! ```
//!
//! Events always apply. Poll evidence only advances liveness timestamps
//! while the [`Governor`] considers the authority reliable. The watchdog
//! evicts purely on timestamp age, so it keeps making progress when the
//! authority is down — a prolonged outage eventually evicts everyone,
//! which is the documented failure mode rather than freezing state.

mod error;
mod governor;
mod tasks;
mod tracker;

pub use error::TrackerError;
pub use governor::{Governor, GovernorConfig, MIN_SESSION_TIMEOUT_MS};
pub use tasks::{PollSource, TrackerTasks, spawn_tasks};
pub use tracker::{JoinOutcome, SessionTracker};

/// Current wall-clock time in unix milliseconds.
///
/// The tracker's mutating APIs take explicit timestamps; this is the
/// value the task loops and event entry points feed them.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
