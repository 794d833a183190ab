//! Error types for the skin proxy host process

use std::fmt;

#[derive(Debug)]
pub enum SkinProxyError {
    Config(String),
    Database(sqlx::Error),
    Io(Box<std::io::Error>),
}

impl fmt::Display for SkinProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkinProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SkinProxyError::Database(err) => write!(f, "Database error: {}", err),
            SkinProxyError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for SkinProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SkinProxyError::Database(err) => Some(err),
            SkinProxyError::Io(err) => Some(err.as_ref()),
            SkinProxyError::Config(_) => None,
        }
    }
}

impl From<sqlx::Error> for SkinProxyError {
    fn from(err: sqlx::Error) -> Self {
        SkinProxyError::Database(err)
    }
}

impl From<std::io::Error> for SkinProxyError {
    fn from(err: std::io::Error) -> Self {
        SkinProxyError::Io(Box::new(err))
    }
}

impl From<reqwest::Error> for SkinProxyError {
    fn from(err: reqwest::Error) -> Self {
        SkinProxyError::Config(format!("HTTP client: {}", err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for SkinProxyError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        SkinProxyError::Config(err.to_string())
    }
}

impl From<mojang_textures::ProviderError> for SkinProxyError {
    fn from(err: mojang_textures::ProviderError) -> Self {
        SkinProxyError::Config(format!("Mojang pipeline: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, SkinProxyError>;
