use std::collections::HashSet;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::filters::{Category, FilterState, SortMode};
use crate::models::{NormalizedEvent, SourceType, Video};
use crate::playback::{NowPlaying, PlaybackController};
use crate::scraping::{self, SourceError, SourceInfo};
use crate::videos::{VideoError, VideoLookup, YouTubeClient};

/// Shared across handlers; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub videos: Arc<VideoLookup>,
    pub youtube: Option<Arc<YouTubeClient>>,
    pub youtube_limiter: Arc<DefaultKeyedRateLimiter<String>>,
    pub playback: Arc<PlaybackController>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let youtube = match YouTubeClient::from_config(&config) {
            Ok(client) => Some(Arc::new(client)),
            Err(VideoError::MissingKey) => None,
            Err(err) => {
                warn!("youtube search disabled: {err}");
                None
            }
        };
        let per_hour =
            NonZeroU32::new(config.youtube_requests_per_hour).unwrap_or(NonZeroU32::MIN);
        Self {
            config: Arc::new(config),
            videos: Arc::new(VideoLookup::new()),
            youtube,
            youtube_limiter: Arc::new(RateLimiter::keyed(Quota::per_hour(per_hour))),
            playback: Arc::new(PlaybackController::new()),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/sources", get(list_sources))
        .route("/api/sources/:id", get(scrape_source))
        .route("/api/feed", get(feed))
        .route("/api/youtube", get(youtube))
        .route("/api/playback", get(now_playing).post(start_playback))
        .route("/api/playback/:event_id", delete(stop_playback))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("clt-show listening on http://{bind}");
    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .await
        .context("http server stopped")?;
    Ok(())
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Upstream(String),
    VideoSearch(String),
    Unavailable(String),
    TooManyRequests,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::BadRequest(details) => (StatusCode::BAD_REQUEST, "Bad request", details),
            ApiError::NotFound(details) => (StatusCode::NOT_FOUND, "Unknown source", details),
            ApiError::Upstream(details) => {
                (StatusCode::BAD_GATEWAY, "Failed to scrape source", details)
            }
            ApiError::VideoSearch(details) => {
                (StatusCode::BAD_GATEWAY, "Failed to fetch YouTube videos", details)
            }
            ApiError::Unavailable(details) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", details)
            }
            ApiError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                "Too many requests. Please try again later.".to_string(),
            ),
        };
        (status, Json(json!({ "error": error, "details": details }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    Json(scraping::list_sources(&state.config))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceResponse {
    events: Vec<NormalizedEvent>,
    source: String,
    source_type: Option<SourceType>,
    scraped_at: String,
}

async fn scrape_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SourceResponse>, ApiError> {
    let source_type = scraping::find_source(&id)
        .ok_or_else(|| ApiError::NotFound(format!("no source with id {id}")))?
        .source_type();
    let result = scraping::run_single(&id, &state.config)
        .await
        .map_err(|err| match err {
            SourceError::UnknownSource(id) => ApiError::NotFound(format!("no source with id {id}")),
            other => ApiError::Upstream(other.to_string()),
        })?;
    Ok(Json(SourceResponse {
        events: result.events,
        source: result.name,
        source_type,
        scraped_at: result.scraped_at,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub category: Option<String>,
    pub genres: Option<String>,
    pub sources: Option<String>,
    pub sort: Option<String>,
    pub favorites: Option<String>,
    pub hidden: Option<String>,
}

impl FeedQuery {
    pub fn into_state(self) -> Result<FilterState, String> {
        let category = match self.category.as_deref() {
            Some(value) => value.parse::<Category>()?,
            None => Category::All,
        };
        let sort = match self.sort.as_deref() {
            Some(value) => value.parse::<SortMode>()?,
            None => SortMode::Date,
        };
        Ok(FilterState {
            category,
            genres: split_list(self.genres.as_deref()),
            sources: split_list(self.sources.as_deref()),
            sort,
            favorites: split_list(self.favorites.as_deref()),
            hidden: split_list(self.hidden.as_deref()),
        })
    }
}

fn split_list(value: Option<&str>) -> HashSet<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<crate::Feed>, ApiError> {
    let filter = query.into_state().map_err(ApiError::BadRequest)?;
    let snapshot = crate::collect(Arc::clone(&state.config), &state.videos).await;
    Ok(Json(crate::build_feed(&snapshot, &filter, &state.config)))
}

#[derive(Debug, Deserialize)]
struct YouTubeQuery {
    query: Option<String>,
}

#[derive(Debug, Serialize)]
struct YouTubeResponse {
    videos: Vec<Video>,
}

/// First `x-forwarded-for` hop, then `x-real-ip`, then the peer address.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn youtube(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Query(params): Query<YouTubeQuery>,
) -> Result<Json<YouTubeResponse>, ApiError> {
    let client = client_key(&headers, peer.map(|ConnectInfo(addr)| addr));
    if state.youtube_limiter.check_key(&client).is_err() {
        warn!(client = %client, "youtube rate limit exceeded");
        return Err(ApiError::TooManyRequests);
    }

    let query = params
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter is required".to_string()))?;
    let youtube = state
        .youtube
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable(VideoError::MissingKey.to_string()))?;

    if let Some(videos) = state.videos.cached(&query) {
        return Ok(Json(YouTubeResponse { videos }));
    }
    let videos = youtube
        .search(&query)
        .await
        .map_err(|err| ApiError::VideoSearch(err.to_string()))?;
    state.videos.store(&query, videos.clone());
    Ok(Json(YouTubeResponse { videos }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackBody {
    pub event_id: String,
    #[serde(default)]
    pub video_index: usize,
}

impl From<NowPlaying> for PlaybackBody {
    fn from(playing: NowPlaying) -> Self {
        Self {
            event_id: playing.event_id,
            video_index: playing.video_index,
        }
    }
}

async fn now_playing(State(state): State<AppState>) -> Json<Option<PlaybackBody>> {
    Json(state.playback.current().map(PlaybackBody::from))
}

async fn start_playback(
    State(state): State<AppState>,
    Json(body): Json<PlaybackBody>,
) -> Result<Json<Option<PlaybackBody>>, ApiError> {
    if body.event_id.trim().is_empty() {
        return Err(ApiError::BadRequest("eventId is required".to_string()));
    }
    state.playback.play(&body.event_id, body.video_index);
    Ok(Json(state.playback.current().map(PlaybackBody::from)))
}

async fn stop_playback(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> StatusCode {
    state.playback.stop(&event_id);
    StatusCode::NO_CONTENT
}
