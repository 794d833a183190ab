//! Error types for the Mojang API client

use std::fmt;
use std::sync::Arc;

/// Errors that can occur when interacting with the Mojang API
///
/// Cloneable so a single failed batch request can be reported to every
/// caller that took part in it.
#[derive(Debug, Clone)]
pub enum MojangError {
    /// 400: the request shape was rejected, carries Mojang's error code and message
    BadRequest { error: String, message: String },
    /// 403: returned even for unauthenticated endpoints when Mojang blocks the caller
    Forbidden,
    /// 429: the request quota is exhausted
    TooManyRequests,
    /// Any 5xx response
    ServerError(u16),
    /// Any other non-success status
    UnexpectedStatus(u16),
    /// HTTP request failed
    Http(Arc<reqwest::Error>),
    /// Failed to parse JSON response
    Json(Arc<serde_json::Error>),
}

impl MojangError {
    /// Classify a non-success status. The body is only used for 400 responses.
    pub(crate) fn from_status(status: u16, body: &[u8]) -> Self {
        match status {
            400 => {
                let decoded: BadRequestBody = serde_json::from_slice(body).unwrap_or_default();
                Self::BadRequest {
                    error: decoded.error,
                    message: decoded.error_message,
                }
            }
            403 => Self::Forbidden,
            429 => Self::TooManyRequests,
            s if s >= 500 => Self::ServerError(s),
            s => Self::UnexpectedStatus(s),
        }
    }

    pub fn is_too_many_requests(&self) -> bool {
        matches!(self, Self::TooManyRequests)
    }
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BadRequestBody {
    error: String,
    error_message: String,
}

impl fmt::Display for MojangError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest { error, message } => write!(f, "400 {}: {}", error, message),
            Self::Forbidden => write!(f, "403: Forbidden"),
            Self::TooManyRequests => write!(f, "429: Too Many Requests"),
            Self::ServerError(status) => write!(f, "{}: Server error", status),
            Self::UnexpectedStatus(status) => {
                write!(f, "unexpected response status code: {}", status)
            }
            Self::Http(e) => write!(f, "Mojang HTTP error: {}", e),
            Self::Json(e) => write!(f, "Mojang JSON parse error: {}", e),
        }
    }
}

impl std::error::Error for MojangError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e.as_ref()),
            Self::Json(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MojangError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(Arc::new(e))
    }
}

impl From<serde_json::Error> for MojangError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(Arc::new(e))
    }
}

/// Result type for Mojang API operations
pub type Result<T> = std::result::Result<T, MojangError>;

/// Errors produced while decoding the `textures` property of a profile
#[derive(Debug, Clone)]
pub enum TexturesDecodeError {
    Base64(base64::DecodeError),
    Json(Arc<serde_json::Error>),
}

impl fmt::Display for TexturesDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64(e) => write!(f, "invalid textures encoding: {}", e),
            Self::Json(e) => write!(f, "invalid textures payload: {}", e),
        }
    }
}

impl std::error::Error for TexturesDecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Base64(e) => Some(e),
            Self::Json(e) => Some(e.as_ref()),
        }
    }
}

impl From<base64::DecodeError> for TexturesDecodeError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Base64(e)
    }
}

impl From<serde_json::Error> for TexturesDecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(Arc::new(e))
    }
}
