//! The failure governor: decides whether poll evidence is trusted.
//!
//! Every knob is runtime-mutable and read fresh by each tick, so an
//! operator can retune intervals on a live process. Plain per-field
//! atomics are enough — each value is an independent scalar and the
//! loops tolerate reading a mix of old and new values for one tick.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};

use crate::TrackerError;

/// Hard floor for the session timeout. Below this, ordinary scheduler
/// jitter between reconcile and the watchdog scan would evict live
/// sessions.
pub const MIN_SESSION_TIMEOUT_MS: u64 = 5_000;

/// Initial values for the governor's runtime-mutable policy.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Watchdog scan interval.
    pub heartbeat_interval_ms: u64,
    /// How long a session may go without liveness evidence before the
    /// watchdog force-ends it. Floor: [`MIN_SESSION_TIMEOUT_MS`].
    pub session_timeout_ms: u64,
    /// Authority poll interval. Keep at or below the heartbeat interval
    /// so live sessions get touched at least once per watchdog window.
    pub poll_interval_ms: u64,
    /// Consecutive poll failures after which poll evidence is distrusted.
    pub max_consecutive_failures: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 60_000,
            session_timeout_ms: 180_000,
            poll_interval_ms: 60_000,
            max_consecutive_failures: 3,
        }
    }
}

/// Tracks authority health and owns the runtime-mutable policy.
///
/// The one decision it exports is [`authority_reliable`](Self::authority_reliable):
/// while `false`, reconcile must not advance any `last_seen_at` — the
/// watchdog keeps scanning the aging timestamps regardless.
pub struct Governor {
    heartbeat_interval_ms: AtomicU64,
    session_timeout_ms: AtomicU64,
    poll_interval_ms: AtomicU64,
    max_consecutive_failures: AtomicU32,

    consecutive_failures: AtomicU32,

    // Observability only.
    last_poll_at: AtomicI64,
    last_success_at: AtomicI64,
    last_known_online_count: AtomicU64,
}

impl Governor {
    /// Creates a governor, validating the config against the floors.
    pub fn new(config: GovernorConfig) -> Result<Self, TrackerError> {
        validate_session_timeout(config.session_timeout_ms)?;
        validate_interval("heartbeat_interval_ms", config.heartbeat_interval_ms)?;
        validate_interval("poll_interval_ms", config.poll_interval_ms)?;
        if config.max_consecutive_failures == 0 {
            return Err(TrackerError::Config(
                "max_consecutive_failures must be at least 1".into(),
            ));
        }
        Ok(Self {
            heartbeat_interval_ms: AtomicU64::new(config.heartbeat_interval_ms),
            session_timeout_ms: AtomicU64::new(config.session_timeout_ms),
            poll_interval_ms: AtomicU64::new(config.poll_interval_ms),
            max_consecutive_failures: AtomicU32::new(config.max_consecutive_failures),
            consecutive_failures: AtomicU32::new(0),
            last_poll_at: AtomicI64::new(0),
            last_success_at: AtomicI64::new(0),
            last_known_online_count: AtomicU64::new(0),
        })
    }

    // -- Policy reads (fresh each tick) ------------------------------------

    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.heartbeat_interval_ms.load(Ordering::Relaxed)
    }

    pub fn session_timeout_ms(&self) -> u64 {
        self.session_timeout_ms.load(Ordering::Relaxed)
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.load(Ordering::Relaxed)
    }

    pub fn max_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures.load(Ordering::Relaxed)
    }

    // -- Policy writes -----------------------------------------------------

    /// Sets the session timeout. Fails loudly below the floor rather
    /// than clamping: silently raising a requested eviction timeout
    /// would change semantics behind the operator's back.
    pub fn set_session_timeout_ms(&self, value: u64) -> Result<(), TrackerError> {
        validate_session_timeout(value)?;
        self.session_timeout_ms.store(value, Ordering::Relaxed);
        tracing::info!(session_timeout_ms = value, "session timeout updated");
        Ok(())
    }

    pub fn set_heartbeat_interval_ms(&self, value: u64) -> Result<(), TrackerError> {
        validate_interval("heartbeat_interval_ms", value)?;
        self.heartbeat_interval_ms.store(value, Ordering::Relaxed);
        tracing::info!(heartbeat_interval_ms = value, "heartbeat interval updated");
        Ok(())
    }

    pub fn set_poll_interval_ms(&self, value: u64) -> Result<(), TrackerError> {
        validate_interval("poll_interval_ms", value)?;
        self.poll_interval_ms.store(value, Ordering::Relaxed);
        tracing::info!(poll_interval_ms = value, "poll interval updated");
        Ok(())
    }

    pub fn set_max_consecutive_failures(&self, value: u32) -> Result<(), TrackerError> {
        if value == 0 {
            return Err(TrackerError::Config(
                "max_consecutive_failures must be at least 1".into(),
            ));
        }
        self.max_consecutive_failures.store(value, Ordering::Relaxed);
        tracing::info!(max_consecutive_failures = value, "failure threshold updated");
        Ok(())
    }

    // -- Failure accounting ------------------------------------------------

    /// Whether poll evidence is currently trusted.
    pub fn authority_reliable(&self) -> bool {
        self.consecutive_failures.load(Ordering::Relaxed)
            < self.max_consecutive_failures.load(Ordering::Relaxed)
    }

    /// Current consecutive failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Records a successful poll: resets the failure streak and updates
    /// the observability fields.
    pub fn record_success(&self, now_ms: i64, online_count: u64) {
        let was_reliable = self.authority_reliable();
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_poll_at.store(now_ms, Ordering::Relaxed);
        self.last_success_at.store(now_ms, Ordering::Relaxed);
        self.last_known_online_count
            .store(online_count, Ordering::Relaxed);
        if !was_reliable {
            tracing::info!(online_count, "authority recovered, poll evidence trusted again");
        }
    }

    /// Records a failed poll. Returns `true` if this failure crossed
    /// the threshold and flipped the authority to unreliable.
    pub fn record_failure(&self, now_ms: i64) -> bool {
        self.last_poll_at.store(now_ms, Ordering::Relaxed);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        let flipped = failures == self.max_consecutive_failures.load(Ordering::Relaxed);
        if flipped {
            tracing::warn!(
                consecutive_failures = failures,
                "authority unreliable, suppressing reconcile until it recovers"
            );
        }
        flipped
    }

    // -- Observability -----------------------------------------------------

    pub fn last_poll_at(&self) -> i64 {
        self.last_poll_at.load(Ordering::Relaxed)
    }

    pub fn last_success_at(&self) -> i64 {
        self.last_success_at.load(Ordering::Relaxed)
    }

    pub fn last_known_online_count(&self) -> u64 {
        self.last_known_online_count.load(Ordering::Relaxed)
    }
}

fn validate_session_timeout(value: u64) -> Result<(), TrackerError> {
    if value < MIN_SESSION_TIMEOUT_MS {
        return Err(TrackerError::Config(format!(
            "session_timeout_ms {value} is below the {MIN_SESSION_TIMEOUT_MS}ms floor"
        )));
    }
    Ok(())
}

fn validate_interval(name: &str, value: u64) -> Result<(), TrackerError> {
    if value == 0 {
        return Err(TrackerError::Config(format!("{name} must be non-zero")));
    }
    Ok(())
}
