//! Mojang textures resolution pipeline
//!
//! Turns bursts of single-username lookups into few batched Mojang API calls:
//!
//! - [`BatchUuidsProvider`] queues username lookups and resolves them in
//!   time-windowed batches
//! - [`UuidsProviderWithCache`] keeps positive and negative username → uuid
//!   answers in a host-supplied [`UuidStore`]
//! - [`TexturesProviderWithInMemoryCache`] keeps signed profiles for a minute
//! - [`MojangTexturesProvider`] ties it together and coalesces concurrent
//!   lookups of the same username

mod batch;
mod error;
mod provider;
mod singleflight;
mod stats;
mod textures;
mod upstream;
mod uuids;

pub use batch::{BatchConfig, BatchUuidsProvider, QueueState};
pub use error::{ProviderError, Result, StoreError};
pub use provider::{is_valid_username, MojangTexturesProvider, NilProfilesProvider, ProfilesProvider};
pub use singleflight::SingleFlight;
pub use stats::{BatchStats, CacheStats, PipelineStats, ResolverStats};
pub use textures::{
    MojangApiTexturesProvider, SweeperState, TexturesProvider, TexturesProviderWithInMemoryCache,
};
pub use upstream::{UsernamesToUuids, UuidToTextures};
pub use uuids::{MemoryUuidStore, UuidRecord, UuidStore, UuidsProvider, UuidsProviderWithCache};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mojang_api::{MojangError, ProfileInfo, ProfileResponse};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// In-process Mojang double answering both endpoints
    #[derive(Default)]
    struct FakeMojang {
        accounts: Vec<ProfileInfo>,
        rate_limited: bool,
        batches: Mutex<Vec<Vec<String>>>,
        profiles: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UsernamesToUuids for FakeMojang {
        async fn usernames_to_uuids(
            &self,
            usernames: &[String],
        ) -> mojang_api::Result<Vec<ProfileInfo>> {
            self.batches.lock().unwrap().push(usernames.to_vec());
            if self.rate_limited {
                return Err(MojangError::TooManyRequests);
            }

            Ok(self
                .accounts
                .iter()
                .filter(|account| {
                    usernames
                        .iter()
                        .any(|name| name.eq_ignore_ascii_case(&account.name))
                })
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl UuidToTextures for FakeMojang {
        async fn uuid_to_textures(
            &self,
            uuid: &str,
            _signed: bool,
        ) -> mojang_api::Result<Option<ProfileResponse>> {
            self.profiles.lock().unwrap().push(uuid.to_string());
            Ok(self
                .accounts
                .iter()
                .find(|account| account.id == uuid)
                .map(|account| ProfileResponse::new(account.id.clone(), account.name.clone(), vec![])))
        }
    }

    struct Pipeline {
        batch: Arc<BatchUuidsProvider>,
        provider: MojangTexturesProvider,
    }

    fn pipeline(mojang: Arc<FakeMojang>) -> Pipeline {
        let batch = Arc::new(BatchUuidsProvider::new(
            mojang.clone(),
            BatchConfig {
                batch_size: 10,
                delay: Duration::from_millis(20),
                fire_on_full: false,
            },
        ));
        let uuids = Arc::new(UuidsProviderWithCache::new(
            batch.clone(),
            Arc::new(MemoryUuidStore::new()),
        ));
        let textures = Arc::new(TexturesProviderWithInMemoryCache::new(Arc::new(
            MojangApiTexturesProvider::new(mojang),
        )));

        Pipeline {
            batch,
            provider: MojangTexturesProvider::new(uuids, textures),
        }
    }

    #[tokio::test]
    async fn test_resolves_notch() {
        let mojang = Arc::new(FakeMojang {
            accounts: vec![ProfileInfo::new("069a79f444e94726a5befca90e38aaf", "Notch")],
            ..Default::default()
        });
        let pipeline = pipeline(mojang.clone());

        let profile = pipeline
            .provider
            .find_or_resolve_textures("notch")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(profile.id, "069a79f444e94726a5befca90e38aaf");
        assert_eq!(profile.name, "Notch");
        assert_eq!(mojang.batches.lock().unwrap().clone(), vec![vec!["notch".to_string()]]);
        pipeline.batch.stop();
    }

    #[tokio::test]
    async fn test_different_usernames_share_a_batch() {
        let mojang = Arc::new(FakeMojang {
            accounts: vec![
                ProfileInfo::new("uuid1", "First"),
                ProfileInfo::new("uuid2", "Second"),
            ],
            ..Default::default()
        });
        let pipeline = pipeline(mojang.clone());

        let (first, second, missing) = tokio::join!(
            pipeline.provider.get_for_username("first"),
            pipeline.provider.get_for_username("second"),
            pipeline.provider.get_for_username("missing"),
        );

        assert_eq!(first.unwrap().unwrap().id, "uuid1");
        assert_eq!(second.unwrap().unwrap().id, "uuid2");
        assert!(missing.unwrap().is_none());
        assert_eq!(mojang.batches.lock().unwrap().len(), 1);
        assert_eq!(mojang.profiles.lock().unwrap().len(), 2);
        pipeline.batch.stop();
    }

    #[tokio::test]
    async fn test_missing_account_is_looked_up_once() {
        let mojang = Arc::new(FakeMojang::default());
        let pipeline = pipeline(mojang.clone());

        for _ in 0..3 {
            assert!(pipeline.provider.get_for_username("ghost").await.unwrap().is_none());
        }

        assert_eq!(mojang.batches.lock().unwrap().len(), 1);
        assert!(mojang.profiles.lock().unwrap().is_empty());
        pipeline.batch.stop();
    }

    #[tokio::test]
    async fn test_rate_limit_reaches_every_caller_and_is_retried_later() {
        let mojang = Arc::new(FakeMojang {
            rate_limited: true,
            ..Default::default()
        });
        let pipeline = pipeline(mojang.clone());

        let (first, second) = tokio::join!(
            pipeline.provider.get_for_username("first"),
            pipeline.provider.get_for_username("second"),
        );
        assert!(first.unwrap_err().is_rate_limited());
        assert!(second.unwrap_err().is_rate_limited());

        // Errors are not cached anywhere, so the next call goes upstream again
        assert!(pipeline.provider.get_for_username("first").await.is_err());
        assert_eq!(mojang.batches.lock().unwrap().len(), 2);
        pipeline.batch.stop();
    }
}
