//! Mojang API HTTP client

use reqwest::StatusCode;
use tracing::debug;

use crate::error::{MojangError, Result};
use crate::types::{ProfileInfo, ProfileResponse};

/// Client for the Mojang username and session server APIs
///
/// Stateless: every call is exactly one HTTP request, with no retries and no
/// caching. Both belong to the callers.
#[derive(Clone)]
pub struct MojangClient {
    http: reqwest::Client,
    batch_uuids_url: String,
    profile_url: String,
}

impl MojangClient {
    /// Batch usernames → UUIDs endpoint
    pub const BATCH_UUIDS_URL: &'static str = "https://api.mojang.com/profiles/minecraft";
    /// Session server profile endpoint, the UUID is appended
    pub const PROFILE_URL: &'static str =
        "https://sessionserver.mojang.com/session/minecraft/profile/";

    /// Create a client talking to the public Mojang hosts
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoints(http, Self::BATCH_UUIDS_URL, Self::PROFILE_URL)
    }

    /// Create a client with custom endpoints. Empty values fall back to the defaults.
    pub fn with_endpoints(http: reqwest::Client, batch_uuids_url: &str, profile_url: &str) -> Self {
        let batch_uuids_url = if batch_uuids_url.is_empty() {
            Self::BATCH_UUIDS_URL.to_string()
        } else {
            batch_uuids_url.to_string()
        };

        let mut profile_url = if profile_url.is_empty() {
            Self::PROFILE_URL.to_string()
        } else {
            profile_url.to_string()
        };
        if !profile_url.ends_with('/') {
            profile_url.push('/');
        }

        Self {
            http,
            batch_uuids_url,
            profile_url,
        }
    }

    pub fn batch_uuids_url(&self) -> &str {
        &self.batch_uuids_url
    }

    pub fn profile_url(&self) -> &str {
        &self.profile_url
    }

    /// Exchange usernames for profile ids
    ///
    /// Unknown usernames are simply missing from the result, and the result
    /// order does not follow the request order. Match entries by
    /// case-insensitive name.
    ///
    /// See <https://wiki.vg/Mojang_API#Playernames_-.3E_UUIDs>
    pub async fn usernames_to_uuids(&self, usernames: &[String]) -> Result<Vec<ProfileInfo>> {
        let response = self
            .http
            .post(&self.batch_uuids_url)
            .json(usernames)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(
            status = status.as_u16(),
            count = usernames.len(),
            "Mojang usernames to uuids response"
        );

        if status != StatusCode::OK {
            return Err(MojangError::from_status(status.as_u16(), &body));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch the profile with its textures property
    ///
    /// A 204 response means there is no profile for this uuid and is
    /// reported as `Ok(None)`.
    ///
    /// See <https://wiki.vg/Mojang_API#UUID_-.3E_Profile_.2B_Skin.2FCape>
    pub async fn uuid_to_textures(
        &self,
        uuid: &str,
        signed: bool,
    ) -> Result<Option<ProfileResponse>> {
        let url = self.profile_request_url(uuid, signed);

        let response = self.http.get(&url).send().await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(uuid = %uuid, status = status.as_u16(), "Mojang profile response");

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if status != StatusCode::OK {
            return Err(MojangError::from_status(status.as_u16(), &body));
        }

        Ok(Some(serde_json::from_slice(&body)?))
    }

    fn profile_request_url(&self, uuid: &str, signed: bool) -> String {
        let mut url = format!("{}{}", self.profile_url, uuid.replace('-', ""));
        if signed {
            url.push_str("?unsigned=false");
        }

        url
    }
}
