//! Assembly of the Mojang textures pipeline

use std::sync::Arc;

use mojang_api::MojangClient;
use mojang_textures::{
    BatchConfig, BatchUuidsProvider, MojangApiTexturesProvider, MojangTexturesProvider,
    PipelineStats, ProfilesProvider, TexturesProviderWithInMemoryCache,
    UsernamesToUuids, UuidStore, UuidToTextures, UuidsProviderWithCache,
};

/// Every layer between the HTTP handlers and Mojang, kept for stats and shutdown
pub struct MojangPipeline {
    batch: Arc<BatchUuidsProvider>,
    uuids: Arc<UuidsProviderWithCache>,
    api_textures: Arc<MojangApiTexturesProvider>,
    textures: Arc<TexturesProviderWithInMemoryCache>,
    resolver: Arc<MojangTexturesProvider>,
}

impl MojangPipeline {
    pub fn new(client: MojangClient, store: Arc<dyn UuidStore>, queue: BatchConfig) -> Self {
        let client = Arc::new(client);
        Self::with_upstream(client.clone(), client, store, queue)
    }

    pub fn with_upstream(
        uuids_endpoint: Arc<dyn UsernamesToUuids>,
        textures_endpoint: Arc<dyn UuidToTextures>,
        store: Arc<dyn UuidStore>,
        queue: BatchConfig,
    ) -> Self {
        let batch = Arc::new(BatchUuidsProvider::new(uuids_endpoint, queue));
        let uuids = Arc::new(UuidsProviderWithCache::new(batch.clone(), store));
        let api_textures = Arc::new(MojangApiTexturesProvider::new(textures_endpoint));
        let textures = Arc::new(TexturesProviderWithInMemoryCache::new(api_textures.clone()));
        let resolver = Arc::new(MojangTexturesProvider::new(uuids.clone(), textures.clone()));

        Self {
            batch,
            uuids,
            api_textures,
            textures,
            resolver,
        }
    }

    pub fn provider(&self) -> Arc<dyn ProfilesProvider> {
        self.resolver.clone()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            uuid_cache: self.uuids.stats(),
            batch: self.batch.stats(),
            textures_cache: self.textures.stats(),
            textures_requests: self.api_textures.requests(),
            resolver: self.resolver.stats(),
        }
    }

    /// Start the batching loop ahead of the first lookup
    pub fn start(&self) -> mojang_textures::Result<()> {
        self.batch.start()
    }

    /// Stop background tasks. Lookups still queued fail with `QueueStopped`.
    pub fn shutdown(&self) {
        self.batch.stop();
        self.textures.stop_sweeper();
    }
}
