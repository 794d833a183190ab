//! Error types for the textures resolution pipeline

use std::fmt;
use std::sync::Arc;

use mojang_api::MojangError;

/// Errors surfaced by the resolution pipeline
///
/// Cloneable because one outcome is shared between every caller of a batch
/// and every waiter of a coalesced lookup.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// The username can't exist on Mojang's side; no request was made
    InvalidUsername(String),
    /// Mojang API failure
    Mojang(MojangError),
    /// UUID store failure
    Storage(StoreError),
    /// The caller stopped waiting for its batch
    Cancelled,
    /// The batching queue was stopped before the job got an answer
    QueueStopped,
}

impl ProviderError {
    /// Whether Mojang refused the request because of its rate limit
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Mojang(e) if e.is_too_many_requests())
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUsername(username) => write!(
                f,
                "the username {:?} doesn't meet Mojang's requirements",
                username
            ),
            Self::Mojang(e) => write!(f, "Mojang API error: {}", e),
            Self::Storage(e) => write!(f, "UUID store error: {}", e),
            Self::Cancelled => write!(f, "UUID lookup cancelled"),
            Self::QueueStopped => write!(f, "UUID batching queue is stopped"),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mojang(e) => Some(e),
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MojangError> for ProviderError {
    fn from(e: MojangError) -> Self {
        Self::Mojang(e)
    }
}

impl From<StoreError> for ProviderError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e)
    }
}

/// Error reported by a [`crate::UuidStore`] implementation
#[derive(Debug, Clone)]
pub struct StoreError(Arc<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
