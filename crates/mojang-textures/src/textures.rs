//! Profile textures lookup with a short-lived in-memory cache

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use mojang_api::ProfileResponse;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::Result;
use crate::stats::{CacheStats, Counter};
use crate::upstream::UuidToTextures;

const TEXTURES_TTL: Duration = Duration::from_secs(60);
const TEXTURES_CACHE_CAPACITY: u64 = 100_000;
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Anything able to fetch the signed profile of a uuid
#[async_trait]
pub trait TexturesProvider: Send + Sync {
    /// `Ok(None)` means the account exists upstream but has no profile to serve
    async fn get_textures(&self, uuid: &str) -> Result<Option<Arc<ProfileResponse>>>;
}

/// Fetches signed profiles straight from the session server
pub struct MojangApiTexturesProvider {
    endpoint: Arc<dyn UuidToTextures>,
    requests: Counter,
}

impl MojangApiTexturesProvider {
    pub fn new(endpoint: Arc<dyn UuidToTextures>) -> Self {
        Self {
            endpoint,
            requests: Counter::default(),
        }
    }

    /// Requests sent to the session server
    pub fn requests(&self) -> u64 {
        self.requests.get()
    }
}

#[async_trait]
impl TexturesProvider for MojangApiTexturesProvider {
    async fn get_textures(&self, uuid: &str) -> Result<Option<Arc<ProfileResponse>>> {
        self.requests.incr();
        let profile = self.endpoint.uuid_to_textures(uuid, true).await?;

        Ok(profile.map(Arc::new))
    }
}

/// Lifecycle of the background expiry sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    NotStarted,
    Running,
    Stopped,
}

enum Sweeper {
    NotStarted,
    Running { stop: oneshot::Sender<()> },
    Stopped,
}

/// Cache-aside decorator over a [`TexturesProvider`]
///
/// Entries, including "no profile" answers, live for a fixed TTL counted
/// from insertion; reads don't extend it. Errors are never cached.
pub struct TexturesProviderWithInMemoryCache {
    provider: Arc<dyn TexturesProvider>,
    cache: Cache<String, Option<Arc<ProfileResponse>>>,
    sweep_interval: Duration,
    sweeper: Mutex<Sweeper>,
    hits: Counter,
    misses: Counter,
}

impl TexturesProviderWithInMemoryCache {
    pub fn new(provider: Arc<dyn TexturesProvider>) -> Self {
        Self::with_ttl(provider, TEXTURES_TTL)
    }

    pub fn with_ttl(provider: Arc<dyn TexturesProvider>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(TEXTURES_CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();

        Self {
            provider,
            cache,
            sweep_interval: ttl,
            sweeper: Mutex::new(Sweeper::NotStarted),
            hits: Counter::default(),
            misses: Counter::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
        }
    }

    pub fn sweeper_state(&self) -> SweeperState {
        match *self.sweeper() {
            Sweeper::NotStarted => SweeperState::NotStarted,
            Sweeper::Running { .. } => SweeperState::Running,
            Sweeper::Stopped => SweeperState::Stopped,
        }
    }

    /// Stop the background sweep. Safe to call whether or not it ever started.
    pub fn stop_sweeper(&self) {
        let previous = std::mem::replace(&mut *self.sweeper(), Sweeper::Stopped);
        if let Sweeper::Running { stop } = previous {
            let _ = stop.send(());
        }
    }

    /// Started after the first successful store rather than on construction
    fn start_sweeper_once(&self) {
        let mut sweeper = self.sweeper();
        if !matches!(*sweeper, Sweeper::NotStarted) {
            return;
        }

        let (stop, mut stopped) = oneshot::channel::<()>();
        let cache = self.cache.clone();
        let mut ticker = tokio::time::interval(self.sweep_interval.max(MIN_SWEEP_INTERVAL));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stopped => return,
                    _ = ticker.tick() => cache.run_pending_tasks().await,
                }
            }
        });
        *sweeper = Sweeper::Running { stop };
        debug!(interval_ms = self.sweep_interval.as_millis() as u64, "Textures cache sweeper started");
    }

    fn sweeper(&self) -> MutexGuard<'_, Sweeper> {
        self.sweeper.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TexturesProvider for TexturesProviderWithInMemoryCache {
    async fn get_textures(&self, uuid: &str) -> Result<Option<Arc<ProfileResponse>>> {
        // Expired entries are never returned by `get`
        if let Some(cached) = self.cache.get(uuid).await {
            self.hits.incr();
            return Ok(cached);
        }

        self.misses.incr();

        let result = self.provider.get_textures(uuid).await?;
        self.cache.insert(uuid.to_string(), result.clone()).await;
        self.start_sweeper_once();

        Ok(result)
    }
}
