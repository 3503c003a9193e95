//! The resolution seam and its standard wrappers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::{PlayerId, ResolveError};

/// Resolves a display name to a stable player identity.
///
/// The remote implementation (account API, directory service) lives
/// outside this workspace. Implementations must return the same identity
/// for the same name for as long as that player exists.
///
/// `Send + Sync + 'static` because resolvers are shared across the
/// tracker's tasks for the lifetime of the process.
pub trait Resolve: Send + Sync + 'static {
    /// Resolves `display_name` to an identity.
    fn resolve(
        &self,
        display_name: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, ResolveError>> + Send;
}

// ---------------------------------------------------------------------------
// OfflineResolver
// ---------------------------------------------------------------------------

/// Resolves purely via the deterministic hash derivation.
///
/// No network, never fails. This is the default resolver when no remote
/// service is configured, and the workhorse of tests and demos.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineResolver;

impl Resolve for OfflineResolver {
    async fn resolve(&self, display_name: &str) -> Result<PlayerId, ResolveError> {
        Ok(PlayerId::offline(display_name))
    }
}

// ---------------------------------------------------------------------------
// FallbackResolver
// ---------------------------------------------------------------------------

/// Wraps a resolver and recovers from its failures with the
/// deterministic offline identity.
///
/// Resolution failure must never block session tracking, so this wrapper
/// logs the failure and degrades instead of propagating. The offline
/// identity is stable per name, meaning a player resolved during an
/// outage keeps accumulating onto the same record on every retry.
#[derive(Debug, Clone)]
pub struct FallbackResolver<R> {
    inner: R,
}

impl<R: Resolve> FallbackResolver<R> {
    /// Wraps `inner` with offline fallback.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Resolve> Resolve for FallbackResolver<R> {
    async fn resolve(&self, display_name: &str) -> Result<PlayerId, ResolveError> {
        match self.inner.resolve(display_name).await {
            Ok(id) => Ok(id),
            Err(err) => {
                let fallback = PlayerId::offline(display_name);
                tracing::warn!(
                    display_name,
                    error = %err,
                    %fallback,
                    "identity resolution failed, using offline fallback"
                );
                Ok(fallback)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CachedResolver
// ---------------------------------------------------------------------------

/// Default time-to-live for cached resolutions.
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// A time-bounded cache in front of any resolver.
///
/// Successful resolutions are cached per display name for the TTL;
/// errors are never cached. The poll task resolves the same handful of
/// names every interval, so without this every poll is a remote call
/// per online player.
pub struct CachedResolver<R> {
    inner: R,
    ttl: Duration,
    /// Positive entries only. The map stays small (one entry per name
    /// seen within the TTL), a plain mutex is plenty.
    cache: Mutex<HashMap<String, (PlayerId, Instant)>>,
}

impl<R: Resolve> CachedResolver<R> {
    /// Wraps `inner` with the default one-hour TTL.
    pub fn new(inner: R) -> Self {
        Self::with_ttl(inner, DEFAULT_TTL)
    }

    /// Wraps `inner` with a custom TTL.
    pub fn with_ttl(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, display_name: &str) -> Option<PlayerId> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let (id, inserted_at) = cache.get(display_name)?;
        if inserted_at.elapsed() < self.ttl {
            Some(*id)
        } else {
            None
        }
    }

    fn insert(&self, display_name: &str, id: PlayerId) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(display_name.to_owned(), (id, Instant::now()));
    }
}

impl<R: Resolve> Resolve for CachedResolver<R> {
    async fn resolve(&self, display_name: &str) -> Result<PlayerId, ResolveError> {
        if let Some(id) = self.cached(display_name) {
            return Ok(id);
        }
        let id = self.inner.resolve(display_name).await?;
        self.insert(display_name, id);
        Ok(id)
    }
}
