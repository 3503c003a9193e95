//! The session tracker: a per-identity {Offline, Online} state machine
//! persisted in the player store.
//!
//! All mutations go through the store behind one async mutex, and the
//! store's session transitions are conditional SQL, so a real leave
//! event racing a watchdog eviction resolves cleanly: exactly one of
//! them credits the session, the other observes "already offline" and
//! no-ops.

use std::collections::HashSet;
use std::sync::Arc;

use roster_resolver::{PlayerId, Resolve};
use roster_store::PlayerStore;
use tokio::sync::Mutex;

use crate::{Governor, TrackerError};

/// What a join did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The identity the display name resolved to.
    pub identity: PlayerId,
    /// Playtime credited from implicitly closing a session that was
    /// still open for this identity (re-login without an observed
    /// leave). `0` in the normal case.
    pub credited_ms: u64,
}

/// The reconciliation engine.
///
/// Owns the store handle and the governor; constructed once at startup
/// and shared (via `Arc`) with the periodic tasks and the event-parser
/// collaborator. No global state.
pub struct SessionTracker<R: Resolve> {
    store: Arc<Mutex<PlayerStore>>,
    resolver: R,
    governor: Arc<Governor>,
}

impl<R: Resolve> SessionTracker<R> {
    /// Creates a tracker over the given store, resolver and governor.
    pub fn new(store: Arc<Mutex<PlayerStore>>, resolver: R, governor: Arc<Governor>) -> Self {
        Self {
            store,
            resolver,
            governor,
        }
    }

    /// The shared store handle (read-only projections go through this).
    pub fn store(&self) -> &Arc<Mutex<PlayerStore>> {
        &self.store
    }

    /// The governor gating poll evidence.
    pub fn governor(&self) -> &Arc<Governor> {
        &self.governor
    }

    /// The resolver used for joins and poll results.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Handles an observed join: resolves the identity, upserts the
    /// record and opens a session.
    ///
    /// A join while a session is already open closes the old session
    /// first, crediting its elapsed time — a re-login whose leave we
    /// missed. The credited duration is reported in the outcome.
    ///
    /// Never waits on the authority; resolution failures are expected
    /// to be absorbed by the resolver chain's offline fallback.
    pub async fn on_join(&self, display_name: &str, now_ms: i64) -> Result<JoinOutcome, TrackerError> {
        let identity = self.resolver.resolve(display_name).await?;

        let mut store = self.store.lock().await;
        store.upsert(identity, display_name, now_ms)?;

        let credited_ms = store.end_session(identity, now_ms)?;
        if credited_ms > 0 {
            tracing::warn!(
                %identity,
                display_name,
                credited_ms,
                "join while online, closed the stale session first"
            );
        }

        if !store.start_session(identity, now_ms)? {
            // end_session just cleared the marker under the same lock.
            return Err(TrackerError::Config(format!(
                "session start rejected for {identity}, store invariant broken"
            )));
        }

        tracing::info!(%identity, display_name, "session opened");
        Ok(JoinOutcome {
            identity,
            credited_ms,
        })
    }

    /// Handles an observed leave. Returns the session duration, `0` if
    /// the identity was already offline (idempotent no-op, not an
    /// error).
    pub async fn on_leave(&self, identity: PlayerId, now_ms: i64) -> Result<u64, TrackerError> {
        let mut store = self.store.lock().await;
        let duration_ms = store.end_session(identity, now_ms)?;
        drop(store);

        if duration_ms > 0 {
            tracing::info!(%identity, duration_ms, "session closed");
        } else {
            tracing::debug!(%identity, "leave for offline identity, no-op");
        }
        Ok(duration_ms)
    }

    /// Merges one poll result into the store.
    ///
    /// Advances `last_seen_at` for every *online* record present in the
    /// polled set — but only while the governor trusts the authority.
    /// Records absent from the set are deliberately left to age:
    /// absence is evidence of a possible disconnect, not proof, and
    /// eviction is the watchdog's decision. Returns how many records
    /// were touched.
    pub async fn reconcile(
        &self,
        online: &HashSet<PlayerId>,
        now_ms: i64,
    ) -> Result<usize, TrackerError> {
        if !self.governor.authority_reliable() {
            tracing::debug!(
                consecutive_failures = self.governor.consecutive_failures(),
                "authority unreliable, poll evidence discarded"
            );
            return Ok(0);
        }

        let identities: Vec<PlayerId> = online.iter().copied().collect();
        let mut store = self.store.lock().await;
        let touched = store.touch_online(&identities, now_ms)?;
        drop(store);

        tracing::debug!(polled = online.len(), touched, "reconciled poll result");
        Ok(touched)
    }

    /// Force-ends every online session whose `last_seen_at` is older
    /// than the governor's current session timeout. Returns the evicted
    /// identities.
    ///
    /// Runs entirely on stored timestamps — no authority involvement —
    /// so it makes progress through any outage.
    pub async fn check_stale(&self, now_ms: i64) -> Result<Vec<PlayerId>, TrackerError> {
        let timeout_ms = self.governor.session_timeout_ms();

        // Scan and evict under one lock acquisition so a session cannot
        // be closed (and reopened) between the two steps.
        let mut store = self.store.lock().await;
        let stale = store.stale_online(timeout_ms, now_ms)?;
        for identity in &stale {
            let duration_ms = store.end_session(*identity, now_ms)?;
            tracing::info!(
                %identity,
                duration_ms,
                timeout_ms,
                reason = "watchdog-timeout",
                "session force-ended"
            );
        }
        Ok(stale)
    }

    /// Shutdown drain: closes every open session so none is silently
    /// lost across a restart. Returns how many were closed.
    pub async fn close_all_open(&self, now_ms: i64) -> Result<usize, TrackerError> {
        let mut store = self.store.lock().await;
        let open: Vec<PlayerId> = store.online_identities()?.into_iter().collect();
        for identity in &open {
            let duration_ms = store.end_session(*identity, now_ms)?;
            tracing::info!(%identity, duration_ms, reason = "shutdown", "session closed");
        }
        Ok(open.len())
    }
}
