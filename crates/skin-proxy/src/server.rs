//! HTTP server for Mojang textures endpoints
//!
//! Provides /health, /textures/{username} and /textures/signed/{username}.

use crate::pipeline::MojangPipeline;
use crate::types::{HealthResponse, TexturesSummary};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use mojang_api::TexturesDecodeError;
use mojang_textures::{ProfilesProvider, ProviderError};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub profiles: Arc<dyn ProfilesProvider>,
    /// `None` when Mojang proxying is disabled
    pub pipeline: Option<Arc<MojangPipeline>>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        profiles: Arc<dyn ProfilesProvider>,
        pipeline: Option<Arc<MojangPipeline>>,
    ) -> Self {
        Self {
            profiles,
            pipeline,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

enum ApiError {
    NotFound,
    Provider(ProviderError),
    InvalidTextures(TexturesDecodeError),
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidUsername(_) => ApiError::NotFound,
            err => ApiError::Provider(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Profile not found"),
            ApiError::Provider(e) if e.is_rate_limited() => {
                warn!(error = %e, "Mojang rate limit reached");
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests")
            }
            ApiError::Provider(e @ ProviderError::Mojang(_)) => {
                error!(error = %e, "Mojang request failed");
                (StatusCode::BAD_GATEWAY, "Upstream error")
            }
            ApiError::Provider(e) => {
                error!(error = %e, "Textures resolution failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            ApiError::InvalidTextures(e) => {
                error!(error = %e, "Mojang returned undecodable textures");
                (StatusCode::BAD_GATEWAY, "Upstream error")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/textures/{username}", get(get_textures))
        .route("/textures/signed/{username}", get(get_signed_textures))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server, returning once `shutdown` resolves
pub async fn start_server(
    state: SharedState,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        stats: state.pipeline.as_ref().map(|pipeline| pipeline.stats()),
    })
}

/// Decoded skin and cape of a player
async fn get_textures(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let profile = state
        .profiles
        .find_or_resolve_textures(&username)
        .await?
        .ok_or(ApiError::NotFound)?;

    let textures = profile
        .decode_textures()
        .map_err(ApiError::InvalidTextures)?;

    match TexturesSummary::new(&profile, textures) {
        Some(summary) => Ok(Json(summary).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Signed profile exactly as the session server returned it
async fn get_signed_textures(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let profile = state
        .profiles
        .find_or_resolve_textures(&username)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(&*profile).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use mojang_api::{
        encode_textures, MojangError, ProfileInfo, ProfileResponse, Property, SkinTexture,
        Textures, TexturesProp,
    };
    use mojang_textures::{
        BatchConfig, MemoryUuidStore, NilProfilesProvider, UsernamesToUuids, UuidToTextures,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedProfiles(mojang_textures::Result<Option<Arc<ProfileResponse>>>);

    #[async_trait]
    impl ProfilesProvider for FixedProfiles {
        async fn find_or_resolve_textures(
            &self,
            _username: &str,
        ) -> mojang_textures::Result<Option<Arc<ProfileResponse>>> {
            self.0.clone()
        }
    }

    fn textures_property(skin: Option<&str>) -> Property {
        let prop = TexturesProp {
            timestamp: 1555856307412,
            profile_id: "069a79f444e94726a5befca90e38aaf".to_string(),
            profile_name: "Notch".to_string(),
            textures: Textures {
                skin: skin.map(|url| SkinTexture {
                    url: url.to_string(),
                    metadata: None,
                }),
                cape: None,
            },
        };

        Property {
            name: "textures".to_string(),
            signature: Some("signature".to_string()),
            value: encode_textures(&prop),
        }
    }

    fn notch(properties: Vec<Property>) -> Arc<ProfileResponse> {
        Arc::new(ProfileResponse::new(
            "069a79f444e94726a5befca90e38aaf",
            "Notch",
            properties,
        ))
    }

    fn router_with(profiles: impl ProfilesProvider + 'static) -> Router {
        create_router(Arc::new(ServerState::new(Arc::new(profiles), None)))
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_textures_summary() {
        let profile = notch(vec![textures_property(Some(
            "http://textures.minecraft.net/texture/skin",
        ))]);
        let router = router_with(FixedProfiles(Ok(Some(profile))));

        let (status, body) = get(router, "/textures/Notch").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "069a79f444e94726a5befca90e38aaf",
                "name": "Notch",
                "skin": {"url": "http://textures.minecraft.net/texture/skin"}
            })
        );
    }

    #[tokio::test]
    async fn test_textures_without_skin_or_cape() {
        let router = router_with(FixedProfiles(Ok(Some(notch(vec![textures_property(None)])))));
        let (status, body) = get(router, "/textures/Notch").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        let router = router_with(FixedProfiles(Ok(Some(notch(vec![])))));
        let (status, _) = get(router, "/textures/Notch").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unknown_player() {
        let (status, body) = get(router_with(NilProfilesProvider), "/textures/Notch").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Profile not found");

        let (status, _) = get(router_with(NilProfilesProvider), "/textures/signed/Notch").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_username_is_not_found() {
        let router = router_with(FixedProfiles(Err(ProviderError::InvalidUsername(
            "not valid".to_string(),
        ))));
        let (status, _) = get(router, "/textures/not%20valid").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let cases = [
            (
                ProviderError::Mojang(MojangError::TooManyRequests),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ProviderError::Mojang(MojangError::ServerError(503)),
                StatusCode::BAD_GATEWAY,
            ),
            (ProviderError::QueueStopped, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let router = router_with(FixedProfiles(Err(err)));
            let (status, _) = get(router, "/textures/signed/Notch").await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_undecodable_textures() {
        let profile = notch(vec![Property {
            name: "textures".to_string(),
            signature: None,
            value: "!!!not base64!!!".to_string(),
        }]);
        let router = router_with(FixedProfiles(Ok(Some(profile))));

        let (status, _) = get(router, "/textures/Notch").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_signed_textures_passthrough() {
        let property = textures_property(Some("http://textures.minecraft.net/texture/skin"));
        let router = router_with(FixedProfiles(Ok(Some(notch(vec![property.clone()])))));

        let (status, body) = get(router, "/textures/signed/Notch").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "069a79f444e94726a5befca90e38aaf",
                "name": "Notch",
                "properties": [{
                    "name": "textures",
                    "signature": "signature",
                    "value": property.value
                }]
            })
        );
    }

    /// Upstream double for a full pipeline behind the router
    #[derive(Default)]
    struct FakeMojang {
        uuid_calls: AtomicUsize,
        profile_calls: AtomicUsize,
    }

    #[async_trait]
    impl UsernamesToUuids for FakeMojang {
        async fn usernames_to_uuids(
            &self,
            usernames: &[String],
        ) -> mojang_api::Result<Vec<ProfileInfo>> {
            self.uuid_calls.fetch_add(1, Ordering::SeqCst);
            Ok(usernames
                .iter()
                .filter(|name| name.eq_ignore_ascii_case("notch"))
                .map(|_| ProfileInfo::new("069a79f444e94726a5befca90e38aaf", "Notch"))
                .collect())
        }
    }

    #[async_trait]
    impl UuidToTextures for FakeMojang {
        async fn uuid_to_textures(
            &self,
            uuid: &str,
            _signed: bool,
        ) -> mojang_api::Result<Option<ProfileResponse>> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(ProfileResponse::new(
                uuid,
                "Notch",
                vec![textures_property(Some("http://textures.minecraft.net/texture/skin"))],
            )))
        }
    }

    #[tokio::test]
    async fn test_health_reports_pipeline_stats() {
        let mojang = Arc::new(FakeMojang::default());
        let pipeline = Arc::new(MojangPipeline::with_upstream(
            mojang.clone(),
            mojang.clone(),
            Arc::new(MemoryUuidStore::new()),
            BatchConfig {
                batch_size: 10,
                delay: Duration::from_millis(10),
                fire_on_full: false,
            },
        ));
        let state = Arc::new(ServerState::new(pipeline.provider(), Some(pipeline.clone())));

        for _ in 0..2 {
            let (status, _) = get(create_router(state.clone()), "/textures/notch").await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = get(create_router(state.clone()), "/textures/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(create_router(state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["stats"]["uuid_cache"]["hits"], 1);
        assert_eq!(json["stats"]["uuid_cache"]["misses"], 2);
        assert_eq!(json["stats"]["batch"]["rounds"], 2);
        assert_eq!(json["stats"]["textures_cache"]["hits"], 1);
        assert_eq!(json["stats"]["textures_requests"], 1);
        assert_eq!(json["stats"]["resolver"]["found"], 2);
        assert_eq!(json["stats"]["resolver"]["missed"], 1);

        assert_eq!(mojang.uuid_calls.load(Ordering::SeqCst), 2);
        assert_eq!(mojang.profile_calls.load(Ordering::SeqCst), 1);
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_health_without_pipeline() {
        let (status, body) = get(router_with(NilProfilesProvider), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json.get("stats").is_none());
    }
}
