//! Response bodies of the skin proxy

use mojang_api::{ProfileResponse, TexturesProp};
use mojang_textures::PipelineStats;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    /// Absent when Mojang proxying is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PipelineStats>,
}

/// Decoded textures of a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TexturesSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin: Option<SkinSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cape: Option<CapeSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkinSummary {
    pub url: String,
    /// `"slim"` for Alex-style arms, absent for the default model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapeSummary {
    pub url: String,
}

impl TexturesSummary {
    /// `None` when the player has neither a skin nor a cape
    pub fn new(profile: &ProfileResponse, textures: Option<&TexturesProp>) -> Option<Self> {
        let textures = &textures?.textures;
        if textures.skin.is_none() && textures.cape.is_none() {
            return None;
        }

        Some(Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            skin: textures.skin.as_ref().map(|skin| SkinSummary {
                url: skin.url.clone(),
                model: skin.metadata.as_ref().map(|m| m.model.clone()),
            }),
            cape: textures.cape.as_ref().map(|cape| CapeSummary {
                url: cape.url.clone(),
            }),
        })
    }
}
