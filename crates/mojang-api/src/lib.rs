//! Rust client for the Mojang API
//!
//! Type-safe bindings to the two Mojang endpoints needed to proxy player
//! textures: the batch username lookup and the session server profile.
//!
//! # Example
//!
//! ```no_run
//! use mojang_api::MojangClient;
//!
//! # async fn example() -> Result<(), mojang_api::MojangError> {
//! let client = MojangClient::new(reqwest::Client::new());
//!
//! let profiles = client.usernames_to_uuids(&["Notch".to_string()]).await?;
//! if let Some(info) = profiles.first() {
//!     if let Some(profile) = client.uuid_to_textures(&info.id, true).await? {
//!         println!("{:?}", profile.decode_textures());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - `POST https://api.mojang.com/profiles/minecraft` - Usernames to UUIDs
//! - `GET https://sessionserver.mojang.com/session/minecraft/profile/{uuid}` - UUID to profile + textures

mod client;
mod error;
mod types;

pub use client::MojangClient;
pub use error::{MojangError, Result, TexturesDecodeError};
pub use types::{
    decode_textures, encode_textures, CapeTexture, ProfileInfo, ProfileResponse, Property,
    SkinMetadata, SkinTexture, Textures, TexturesProp,
};
