//! Mojang endpoints as seen by the pipeline
//!
//! The pipeline depends on these traits rather than on [`MojangClient`]
//! directly so each layer can be exercised against in-process doubles.

use async_trait::async_trait;
use mojang_api::{MojangClient, ProfileInfo, ProfileResponse};

/// Batch usernames → profile ids lookup
#[async_trait]
pub trait UsernamesToUuids: Send + Sync + 'static {
    async fn usernames_to_uuids(
        &self,
        usernames: &[String],
    ) -> mojang_api::Result<Vec<ProfileInfo>>;
}

/// Profile id → signed profile lookup
#[async_trait]
pub trait UuidToTextures: Send + Sync + 'static {
    async fn uuid_to_textures(
        &self,
        uuid: &str,
        signed: bool,
    ) -> mojang_api::Result<Option<ProfileResponse>>;
}

#[async_trait]
impl UsernamesToUuids for MojangClient {
    async fn usernames_to_uuids(
        &self,
        usernames: &[String],
    ) -> mojang_api::Result<Vec<ProfileInfo>> {
        MojangClient::usernames_to_uuids(self, usernames).await
    }
}

#[async_trait]
impl UuidToTextures for MojangClient {
    async fn uuid_to_textures(
        &self,
        uuid: &str,
        signed: bool,
    ) -> mojang_api::Result<Option<ProfileResponse>> {
        MojangClient::uuid_to_textures(self, uuid, signed).await
    }
}
