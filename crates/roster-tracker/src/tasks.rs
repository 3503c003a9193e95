//! The two periodic tasks driving the tracker.
//!
//! Poll and watchdog are separate tasks on purpose: a slow or hung
//! authority must never delay stale-session eviction, and eviction
//! never depends on poll success — only on `last_seen_at` age. Each
//! tick re-reads its interval from the governor, so runtime retuning
//! takes effect on the next tick, and each tick contains its own
//! failures: nothing that happens inside a tick kills the loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use roster_authority::{AuthorityClient, AuthorityError};
use roster_resolver::Resolve;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::{SessionTracker, now_ms};

/// The poll task's view of the authority: "who is online, by name".
///
/// A seam so the task loop can be exercised against a scripted source;
/// production uses [`AuthorityClient`].
pub trait PollSource: Send + 'static {
    /// Asks the authority for the currently online display names.
    fn poll(
        &mut self,
    ) -> impl std::future::Future<Output = Result<HashSet<String>, AuthorityError>> + Send;
}

impl PollSource for AuthorityClient {
    async fn poll(&mut self) -> Result<HashSet<String>, AuthorityError> {
        AuthorityClient::poll(self).await
    }
}

/// Handles to the two running tasks plus their shutdown signal.
pub struct TrackerTasks<R: Resolve> {
    tracker: Arc<SessionTracker<R>>,
    shutdown: watch::Sender<bool>,
    poll: JoinHandle<()>,
    watchdog: JoinHandle<()>,
}

impl<R: Resolve> TrackerTasks<R> {
    /// Graceful shutdown: stop both loops (an in-flight tick finishes),
    /// then drain by closing every still-open session so nothing is
    /// silently lost across a restart.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.poll.await;
        let _ = self.watchdog.await;

        match self.tracker.close_all_open(now_ms()).await {
            Ok(closed) => tracing::info!(closed, "tracker drained"),
            Err(err) => tracing::error!(error = %err, "failed to drain open sessions"),
        }
    }

    /// Aborts both tasks without draining. Tests only.
    #[cfg(test)]
    pub(crate) fn abort(self) {
        self.poll.abort();
        self.watchdog.abort();
    }
}

/// Spawns the poll and watchdog tasks for `tracker`.
pub fn spawn_tasks<R, S>(tracker: Arc<SessionTracker<R>>, source: S) -> TrackerTasks<R>
where
    R: Resolve,
    S: PollSource,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poll = tokio::spawn(poll_loop(Arc::clone(&tracker), source, shutdown_rx.clone()));
    let watchdog = tokio::spawn(watchdog_loop(Arc::clone(&tracker), shutdown_rx));

    TrackerTasks {
        tracker,
        shutdown: shutdown_tx,
        poll,
        watchdog,
    }
}

async fn poll_loop<R: Resolve, S: PollSource>(
    tracker: Arc<SessionTracker<R>>,
    mut source: S,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!("poll task started");
    loop {
        let interval = Duration::from_millis(tracker.governor().poll_interval_ms());
        tokio::select! {
            _ = time::sleep(interval) => {
                poll_tick(&tracker, &mut source).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("poll task stopped");
}

async fn watchdog_loop<R: Resolve>(
    tracker: Arc<SessionTracker<R>>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!("watchdog task started");
    loop {
        let interval = Duration::from_millis(tracker.governor().heartbeat_interval_ms());
        tokio::select! {
            _ = time::sleep(interval) => {
                watchdog_tick(&tracker).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("watchdog task stopped");
}

/// One poll tick: ask the authority, account the result, reconcile.
async fn poll_tick<R: Resolve, S: PollSource>(tracker: &SessionTracker<R>, source: &mut S) {
    let now = now_ms();
    match source.poll().await {
        Ok(names) => {
            tracker.governor().record_success(now, names.len() as u64);

            let mut online = HashSet::with_capacity(names.len());
            for name in &names {
                match tracker.resolver().resolve(name).await {
                    Ok(identity) => {
                        online.insert(identity);
                    }
                    Err(err) => tracing::warn!(
                        display_name = %name,
                        error = %err,
                        "could not resolve polled player, skipping"
                    ),
                }
            }

            if let Err(err) = tracker.reconcile(&online, now).await {
                tracing::error!(error = %err, "reconcile failed");
            }
        }
        Err(err) => {
            tracker.governor().record_failure(now);
            tracing::warn!(error = %err, "authority poll failed");
        }
    }
}

/// One watchdog tick: evict sessions that have gone stale.
async fn watchdog_tick<R: Resolve>(tracker: &SessionTracker<R>) {
    if let Err(err) = tracker.check_stale(now_ms()).await {
        tracing::error!(error = %err, "stale-session scan failed");
    }
}
