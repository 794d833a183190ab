//! Username → signed profile resolution, the pipeline's entry point

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use mojang_api::ProfileResponse;
use regex::Regex;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::singleflight::SingleFlight;
use crate::stats::{Counter, ResolverStats};
use crate::textures::TexturesProvider;
use crate::uuids::UuidsProvider;

// https://help.minecraft.net/hc/en-us/articles/4408950195341#h_01GE5JX1Z0CZ833A7S54Y195KV
static ALLOWED_USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9a-z_]{3,16}$").unwrap());

/// Whether Mojang would accept `username` as a player name
pub fn is_valid_username(username: &str) -> bool {
    ALLOWED_USERNAME_RE.is_match(username)
}

/// What the rest of the application calls to get Mojang textures
#[async_trait]
pub trait ProfilesProvider: Send + Sync {
    /// `Ok(None)` when there is nothing to serve for this username
    async fn find_or_resolve_textures(&self, username: &str)
        -> Result<Option<Arc<ProfileResponse>>>;
}

/// Resolves a username to its signed profile
///
/// Concurrent lookups of the same username (case-insensitively) share one
/// resolution, so at most one uuid lookup and one textures fetch are in
/// flight per username.
pub struct MojangTexturesProvider {
    uuids: Arc<dyn UuidsProvider>,
    textures: Arc<dyn TexturesProvider>,
    group: SingleFlight<String, Result<Option<Arc<ProfileResponse>>>>,
    found: Counter,
    missed: Counter,
    failed: Counter,
    shared: Counter,
}

impl MojangTexturesProvider {
    pub fn new(uuids: Arc<dyn UuidsProvider>, textures: Arc<dyn TexturesProvider>) -> Self {
        Self {
            uuids,
            textures,
            group: SingleFlight::new(),
            found: Counter::default(),
            missed: Counter::default(),
            failed: Counter::default(),
            shared: Counter::default(),
        }
    }

    pub async fn get_for_username(&self, username: &str) -> Result<Option<Arc<ProfileResponse>>> {
        if !is_valid_username(username) {
            return Err(ProviderError::InvalidUsername(username.to_string()));
        }

        let username = username.to_lowercase();
        let uuids = self.uuids.clone();
        let textures = self.textures.clone();
        let key = username.clone();

        let (result, shared) = self
            .group
            .run(key, move || async move {
                let Some(profile) = uuids.get_uuid(&username).await? else {
                    return Ok(None);
                };

                textures.get_textures(&profile.id).await
            })
            .await;

        self.record(shared, &result);

        result
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            found: self.found.get(),
            missed: self.missed.get(),
            failed: self.failed.get(),
            shared: self.shared.get(),
        }
    }

    fn record(&self, shared: bool, result: &Result<Option<Arc<ProfileResponse>>>) {
        if shared {
            self.shared.incr();
        }

        match result {
            Ok(Some(_)) => self.found.incr(),
            Ok(None) => self.missed.incr(),
            Err(e) => {
                debug!(error = %e, "Mojang textures resolution failed");
                self.failed.incr();
            }
        }
    }
}

#[async_trait]
impl ProfilesProvider for MojangTexturesProvider {
    async fn find_or_resolve_textures(
        &self,
        username: &str,
    ) -> Result<Option<Arc<ProfileResponse>>> {
        self.get_for_username(username).await
    }
}

/// Used when proxying Mojang textures is turned off
pub struct NilProfilesProvider;

#[async_trait]
impl ProfilesProvider for NilProfilesProvider {
    async fn find_or_resolve_textures(
        &self,
        _username: &str,
    ) -> Result<Option<Arc<ProfileResponse>>> {
        Ok(None)
    }
}
