//! The `Roster` context: one struct owning the whole stack.
//!
//! Replaces any notion of global tracker state — the store handle,
//! governor and task handles all live here, constructed once at startup
//! and passed to whatever feeds it events.

use std::path::PathBuf;
use std::sync::Arc;

use roster_authority::{AuthorityClient, AuthorityConfig};
use roster_resolver::{CachedResolver, OfflineResolver, PlayerId, Resolve};
use roster_store::{PlayerRecord, PlayerStore};
use roster_tracker::{
    Governor, GovernorConfig, JoinOutcome, SessionTracker, TrackerError, TrackerTasks, now_ms,
    spawn_tasks,
};
use tokio::sync::Mutex;

use crate::RosterError;

/// The resolver chain used when none is supplied: deterministic offline
/// identities behind a time-bounded cache. Deployments with a remote
/// account service plug their own [`Resolve`] impl in via
/// [`RosterBuilder::build_with_resolver`] (typically wrapped in
/// `FallbackResolver` + `CachedResolver`).
pub type DefaultResolver = CachedResolver<OfflineResolver>;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`Roster`] context.
pub struct RosterBuilder {
    authority: Option<AuthorityConfig>,
    store_path: Option<PathBuf>,
    governor: GovernorConfig,
}

impl RosterBuilder {
    /// Creates a builder with defaults: in-memory store, default
    /// governor policy, no authority (event-only mode until one is set).
    pub fn new() -> Self {
        Self {
            authority: None,
            store_path: None,
            governor: GovernorConfig::default(),
        }
    }

    /// Sets the authority endpoint and password.
    pub fn authority(mut self, addr: impl Into<String>, password: impl Into<String>) -> Self {
        self.authority = Some(AuthorityConfig::new(addr, password));
        self
    }

    /// Sets a fully custom authority configuration.
    pub fn authority_config(mut self, config: AuthorityConfig) -> Self {
        self.authority = Some(config);
        self
    }

    /// Persists the player table at `path` instead of in memory.
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Overrides the governor's initial policy.
    pub fn governor(mut self, config: GovernorConfig) -> Self {
        self.governor = config;
        self
    }

    /// Builds the context with the default resolver chain.
    pub fn build(self) -> Result<Roster<DefaultResolver>, RosterError> {
        self.build_with_resolver(CachedResolver::new(OfflineResolver))
    }

    /// Builds the context with a custom resolver.
    ///
    /// Fails fast on invalid governor config or an unopenable store;
    /// does not touch the network (that happens in [`Roster::start`]).
    pub fn build_with_resolver<R: Resolve>(self, resolver: R) -> Result<Roster<R>, RosterError> {
        let store = match &self.store_path {
            Some(path) => PlayerStore::open(path)?,
            None => PlayerStore::in_memory()?,
        };
        let store = Arc::new(Mutex::new(store));
        let governor = Arc::new(Governor::new(self.governor)?);
        let tracker = Arc::new(SessionTracker::new(store, resolver, governor));

        Ok(Roster {
            tracker,
            authority: self.authority,
            tasks: None,
        })
    }
}

impl Default for RosterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// A running (or about-to-run) session-tracking context.
pub struct Roster<R: Resolve = DefaultResolver> {
    tracker: Arc<SessionTracker<R>>,
    authority: Option<AuthorityConfig>,
    tasks: Option<TrackerTasks<R>>,
}

impl Roster<DefaultResolver> {
    /// Creates a new builder.
    pub fn builder() -> RosterBuilder {
        RosterBuilder::new()
    }
}

impl<R: Resolve> Roster<R> {
    /// Connects to the authority and starts the poll and watchdog tasks.
    ///
    /// # Errors
    /// Fails if no authority was configured, or if the initial connect
    /// or authentication fails. Once started, subsequent authority
    /// failures are the governor's business and never surface here.
    pub async fn start(&mut self) -> Result<(), RosterError> {
        if self.tasks.is_some() {
            return Ok(());
        }
        let config = self.authority.clone().ok_or_else(|| {
            TrackerError::Config("no authority endpoint configured".into())
        })?;

        let client = AuthorityClient::connect(config).await?;
        self.tasks = Some(spawn_tasks(Arc::clone(&self.tracker), client));
        tracing::info!("roster started");
        Ok(())
    }

    /// Graceful shutdown: stops the periodic tasks, then closes every
    /// still-open session so no playtime is lost across a restart.
    /// Safe to call without a prior [`start`](Self::start).
    pub async fn shutdown(&mut self) {
        match self.tasks.take() {
            Some(tasks) => tasks.shutdown().await,
            None => match self.tracker.close_all_open(now_ms()).await {
                Ok(closed) => tracing::info!(closed, "roster drained"),
                Err(err) => tracing::error!(error = %err, "failed to drain open sessions"),
            },
        }
    }

    // -- Event entry points (called by the log-parser collaborator) -------

    /// Records an observed join for `display_name`, now.
    pub async fn on_join(&self, display_name: &str) -> Result<JoinOutcome, RosterError> {
        Ok(self.tracker.on_join(display_name, now_ms()).await?)
    }

    /// Records an observed leave for `identity`, now.
    pub async fn on_leave(&self, identity: PlayerId) -> Result<u64, RosterError> {
        Ok(self.tracker.on_leave(identity, now_ms()).await?)
    }

    // -- Read-only projection (the aggregation collaborator's view) -------

    /// Every player record, ordered by cumulative playtime descending.
    pub async fn players(&self) -> Result<Vec<PlayerRecord>, RosterError> {
        Ok(self.tracker.store().lock().await.all_by_playtime()?)
    }

    /// Fast online check for one identity.
    pub async fn is_online(&self, identity: PlayerId) -> Result<bool, RosterError> {
        Ok(self.tracker.store().lock().await.is_online(identity)?)
    }

    /// Number of identities currently online.
    pub async fn online_count(&self) -> Result<u64, RosterError> {
        Ok(self.tracker.store().lock().await.online_count()?)
    }

    /// The governor, for runtime policy changes and health inspection.
    pub fn governor(&self) -> &Governor {
        self.tracker.governor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_defaults_build_in_memory() {
        let roster = Roster::builder().build().expect("build succeeds");
        assert_eq!(roster.online_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_builder_rejects_bad_governor_config() {
        let result = Roster::builder()
            .governor(GovernorConfig {
                session_timeout_ms: 100,
                ..GovernorConfig::default()
            })
            .build();
        assert!(matches!(result, Err(RosterError::Tracker(_))));
    }

    #[tokio::test]
    async fn test_start_without_authority_fails() {
        let mut roster = Roster::builder().build().unwrap();
        let err = roster.start().await.unwrap_err();
        assert!(matches!(err, RosterError::Tracker(TrackerError::Config(_))));
    }

    #[tokio::test]
    async fn test_join_leave_through_context() {
        let roster = Roster::builder().build().unwrap();

        let outcome = roster.on_join("Alice").await.unwrap();
        assert!(roster.is_online(outcome.identity).await.unwrap());
        assert_eq!(roster.online_count().await.unwrap(), 1);

        roster.on_leave(outcome.identity).await.unwrap();
        assert!(!roster.is_online(outcome.identity).await.unwrap());
    }

    #[tokio::test]
    async fn test_players_ordered_by_playtime() {
        let roster = Roster::builder().build().unwrap();
        let a = roster.on_join("A").await.unwrap().identity;
        let b = roster.on_join("B").await.unwrap().identity;

        // Close A's session (tiny but real playtime), leave B's open.
        roster.on_leave(a).await.unwrap();

        let players = roster.players().await.unwrap();
        assert_eq!(players.len(), 2);
        // A has credited playtime, B has none yet.
        assert!(players[0].cumulative_online_ms >= players[1].cumulative_online_ms);
        assert!(players.iter().any(|p| p.identity == b && p.is_online()));
    }

    #[tokio::test]
    async fn test_shutdown_without_start_drains_sessions() {
        let mut roster = Roster::builder().build().unwrap();
        let id = roster.on_join("Alice").await.unwrap().identity;

        roster.shutdown().await;

        assert!(!roster.is_online(id).await.unwrap());
    }
}
