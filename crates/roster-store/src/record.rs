//! The player record type.

use roster_resolver::PlayerId;

/// One player's durable record. All timestamps are unix milliseconds.
///
/// Invariant: the record is "online" exactly when
/// `active_session_started_at` is `Some`. Only a session end — explicit
/// leave or watchdog eviction — clears it, and that transition is
/// idempotent at the store level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    /// Stable key. Immutable after creation.
    pub identity: PlayerId,
    /// Latest known display name; refreshed on every join.
    pub display_name: String,
    /// When this identity was first recorded. Set once.
    pub first_seen_at: i64,
    /// Last moment we had positive evidence the player was present.
    /// Advanced by joins, leaves, and (governor permitting) reconcile.
    pub last_seen_at: i64,
    /// Total completed-session playtime. Monotonically non-decreasing;
    /// advanced only when a session ends.
    pub cumulative_online_ms: u64,
    /// Number of sessions ever started. Monotonically non-decreasing.
    pub session_count: u64,
    /// Start of the currently open session, if any.
    pub active_session_started_at: Option<i64>,
}

impl PlayerRecord {
    /// Whether a session is currently open.
    pub fn is_online(&self) -> bool {
        self.active_session_started_at.is_some()
    }
}
