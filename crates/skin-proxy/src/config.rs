use std::env;
use std::time::Duration;

use mojang_api::MojangClient;
use mojang_textures::BatchConfig;
use url::Url;

use crate::error::{Result, SkinProxyError};

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Postgres store for username → uuid records; in-memory when unset
    pub database_url: Option<String>,
    pub textures_enabled: bool,
    pub batch_uuids_url: String,
    pub profile_url: String,
    pub queue: BatchConfig,
    pub http_timeout: Duration,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = var("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3005);

        let database_url = var("DATABASE_URL").filter(|url| !url.is_empty());

        let textures_enabled = var("MOJANG_TEXTURES_ENABLED")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(true);

        let batch_uuids_url = parse_upstream_url(
            "MOJANG_BATCH_UUIDS_URL",
            var("MOJANG_BATCH_UUIDS_URL"),
            MojangClient::BATCH_UUIDS_URL,
        )?;

        let mut profile_url = parse_upstream_url(
            "MOJANG_PROFILE_URL",
            var("MOJANG_PROFILE_URL"),
            MojangClient::PROFILE_URL,
        )?;
        if !profile_url.ends_with('/') {
            profile_url.push('/');
        }

        let defaults = BatchConfig::default();
        let delay = var("QUEUE_LOOP_DELAY_MS")
            .and_then(|ms| ms.parse().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.delay);

        let batch_size = var("QUEUE_BATCH_SIZE")
            .and_then(|n| n.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.batch_size);

        let fire_on_full = match var("QUEUE_STRATEGY").as_deref() {
            None | Some("periodic") => false,
            Some("full-bus") => true,
            Some(other) => {
                return Err(SkinProxyError::Config(format!(
                    "unknown queue strategy \"{}\"",
                    other
                )))
            }
        };

        let http_timeout = var("HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            port,
            database_url,
            textures_enabled,
            batch_uuids_url,
            profile_url,
            queue: BatchConfig {
                batch_size,
                delay,
                fire_on_full,
            },
            http_timeout,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_upstream_url(name: &str, value: Option<String>, default: &str) -> Result<String> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(default.to_string());
    };

    let url = Url::parse(&value)
        .map_err(|e| SkinProxyError::Config(format!("{} is not a valid URL: {}", name, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SkinProxyError::Config(format!(
            "{} must be an http(s) URL",
            name
        )));
    }

    Ok(value)
}
