//! Mojang API data types

use std::sync::OnceLock;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::TexturesDecodeError;

const TEXTURES_PROPERTY: &str = "textures";

/// Entry of the batch usernames → UUIDs response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    /// UUID without dashes
    pub id: String,
    pub name: String,
    #[serde(rename = "legacy", default, skip_serializing_if = "is_false")]
    pub is_legacy: bool,
    #[serde(rename = "demo", default, skip_serializing_if = "is_false")]
    pub is_demo: bool,
}

impl ProfileInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_legacy: false,
            is_demo: false,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Signed profile returned by the session server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,

    #[serde(skip)]
    decoded: OnceLock<Result<Option<TexturesProp>, TexturesDecodeError>>,
}

impl ProfileResponse {
    pub fn new(id: impl Into<String>, name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            properties,
            decoded: OnceLock::new(),
        }
    }

    /// The raw `textures` property, if the profile has one
    pub fn textures_property(&self) -> Option<&Property> {
        self.properties
            .iter()
            .find(|prop| prop.name == TEXTURES_PROPERTY)
    }

    /// Decode the `textures` property.
    ///
    /// Decoding happens on first access and the outcome, including a
    /// failure, is kept for the lifetime of this value. `Ok(None)` means the
    /// profile carries no textures property at all.
    pub fn decode_textures(&self) -> Result<Option<&TexturesProp>, TexturesDecodeError> {
        let decoded = self.decoded.get_or_init(|| {
            match self.textures_property() {
                Some(prop) if !prop.value.is_empty() => decode_textures(&prop.value).map(Some),
                _ => Ok(None),
            }
        });

        match decoded {
            Ok(textures) => Ok(textures.as_ref()),
            Err(e) => Err(e.clone()),
        }
    }
}

/// A single profile property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub value: String,
}

/// Decoded content of the `textures` property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TexturesProp {
    /// Unix milliseconds
    pub timestamp: i64,
    pub profile_id: String,
    pub profile_name: String,
    #[serde(default)]
    pub textures: Textures,
}

/// Either texture may be absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Textures {
    #[serde(rename = "SKIN", default, skip_serializing_if = "Option::is_none")]
    pub skin: Option<SkinTexture>,
    #[serde(rename = "CAPE", default, skip_serializing_if = "Option::is_none")]
    pub cape: Option<CapeTexture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinTexture {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SkinMetadata>,
}

/// Only present for the slim ("alex") model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinMetadata {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapeTexture {
    pub url: String,
}

/// Decode a base64 textures property value.
///
/// The URL-safe alphabet is tried first; values produced with the standard
/// alphabet are accepted as well.
pub fn decode_textures(encoded: &str) -> Result<TexturesProp, TexturesDecodeError> {
    let bytes = match URL_SAFE.decode(encoded) {
        Ok(bytes) => bytes,
        Err(url_safe_err) => STANDARD.decode(encoded).map_err(|_| url_safe_err)?,
    };

    Ok(serde_json::from_slice(&bytes)?)
}

/// Encode textures the way they appear inside a profile property
pub fn encode_textures(textures: &TexturesProp) -> String {
    // Serializing plain structs with string keys cannot fail
    let json = serde_json::to_vec(textures).unwrap_or_default();
    URL_SAFE.encode(json)
}
