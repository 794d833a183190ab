//! Username → UUID resolution backed by a persistent store
//!
//! [`UuidsProviderWithCache`] consults the [`UuidStore`] first and only
//! falls back to the wrapped provider on a miss. Both positive and negative
//! answers are written back, which is what keeps lookups of nonexistent
//! usernames from eating into the upstream quota.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use mojang_api::ProfileInfo;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::stats::{CacheStats, Counter};

const MEMORY_STORE_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30); // 30 days
const MEMORY_STORE_CAPACITY: u64 = 100_000;

/// Anything able to resolve a username to a Mojang profile id
#[async_trait]
pub trait UuidsProvider: Send + Sync {
    /// `Ok(None)` means no Mojang account uses this name
    async fn get_uuid(&self, username: &str) -> Result<Option<ProfileInfo>>;
}

/// A stored username → UUID answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidRecord {
    /// Casing as last reported by Mojang
    pub username: String,
    /// `None` when the username is known to have no account
    pub uuid: Option<String>,
}

/// Persistent username → UUID storage supplied by the host
///
/// Implementations key records by the lower-cased username and own the
/// expiry policy: stale records must be reported as absent.
#[async_trait]
pub trait UuidStore: Send + Sync {
    /// `Ok(None)` means the username was never looked up (or the record expired)
    async fn get_uuid_for_username(
        &self,
        username: &str,
    ) -> std::result::Result<Option<UuidRecord>, StoreError>;

    /// `uuid == None` records that the username has no account
    async fn store_uuid(
        &self,
        username: &str,
        uuid: Option<&str>,
    ) -> std::result::Result<(), StoreError>;
}

/// Cache-aside decorator over a [`UuidsProvider`]
pub struct UuidsProviderWithCache {
    provider: Arc<dyn UuidsProvider>,
    store: Arc<dyn UuidStore>,
    hits: Counter,
    misses: Counter,
}

impl UuidsProviderWithCache {
    pub fn new(provider: Arc<dyn UuidsProvider>, store: Arc<dyn UuidStore>) -> Self {
        Self {
            provider,
            store,
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
}

#[async_trait]
impl UuidsProvider for UuidsProviderWithCache {
    async fn get_uuid(&self, username: &str) -> Result<Option<ProfileInfo>> {
        let key = username.to_lowercase();
        if let Some(record) = self.store.get_uuid_for_username(&key).await? {
            self.hits.incr();
            return Ok(record
                .uuid
                .map(|uuid| ProfileInfo::new(uuid, record.username)));
        }

        let profile = self.provider.get_uuid(username).await?;

        let (well_cased_username, uuid) = match &profile {
            Some(profile) => (profile.name.as_str(), Some(profile.id.as_str())),
            None => (username, None),
        };

        match self.store.store_uuid(well_cased_username, uuid).await {
            Ok(()) => self.misses.incr(),
            Err(e) => {
                warn!(username = %well_cased_username, error = %e, "Failed to store Mojang UUID");
            }
        }

        Ok(profile)
    }
}

/// Process-local [`UuidStore`] on top of a moka cache
pub struct MemoryUuidStore {
    records: Cache<String, UuidRecord>,
}

impl MemoryUuidStore {
    /// Records live for 30 days
    pub fn new() -> Self {
        Self::with_ttl(MEMORY_STORE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let records = Cache::builder()
            .max_capacity(MEMORY_STORE_CAPACITY)
            .time_to_live(ttl)
            .build();

        Self { records }
    }
}

impl Default for MemoryUuidStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UuidStore for MemoryUuidStore {
    async fn get_uuid_for_username(
        &self,
        username: &str,
    ) -> std::result::Result<Option<UuidRecord>, StoreError> {
        Ok(self.records.get(&username.to_lowercase()).await)
    }

    async fn store_uuid(
        &self,
        username: &str,
        uuid: Option<&str>,
    ) -> std::result::Result<(), StoreError> {
        let record = UuidRecord {
            username: username.to_string(),
            uuid: uuid.map(str::to_string),
        };
        self.records.insert(username.to_lowercase(), record).await;
        Ok(())
    }
}
