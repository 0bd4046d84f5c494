use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::models::{NormalizedEvent, SourceResult, Video};
use crate::scraping::base;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const WATCH_URL: &str = "https://youtube.com/watch?v=";
const MUSIC_CATEGORY: &str = "10";
const MAX_RESULTS: &str = "3";

static QUERY_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(live|concert|tour|at|presents|featuring)\s+.*").expect("query noise regex")
});
static TITLE_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\s*\(Official.*?\)",
        r"(?i)\s*\[Official.*?\]",
        r"(?i)\s*-\s*Official.*$",
        r"(?i)\s*\|\s*Official.*$",
        r"(?i)\s+LIVE\s+AT\s+.*$",
        r"(?i)\s+at\s+.*(tavern|bar|venue|club|theater|hall).*$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("title noise regex"))
    .collect()
});

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("YOUTUBE_API_KEY is not configured")]
    MissingKey,
    #[error("youtube request failed: {0}")]
    Http(String),
    #[error("youtube answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected youtube response: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<SearchId>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: Option<String>,
}

/// Strips tour and billing noise so the query is just the artist.
pub fn clean_search_query(query: &str) -> String {
    QUERY_NOISE_RE.replace(query, "").trim().to_string()
}

pub fn clean_video_title(title: &str) -> String {
    let mut cleaned = base::decode_entities(title);
    for pattern in TITLE_NOISE.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}

pub fn parse_search_response(raw: &str) -> Result<Vec<Video>, VideoError> {
    let response: SearchResponse =
        serde_json::from_str(raw).map_err(|err| VideoError::Parse(err.to_string()))?;
    let videos = response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id?.video_id?;
            let title = item
                .snippet
                .and_then(|snippet| snippet.title)
                .map(|title| clean_video_title(&title))
                .unwrap_or_default();
            Some(Video {
                title,
                url: format!("{WATCH_URL}{id}"),
            })
        })
        .collect();
    Ok(videos)
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Upstream error message from a failed search, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|response| response.error)
        .and_then(|error| error.message)
        .unwrap_or_else(|| body.trim().to_string())
}

pub struct YouTubeClient {
    client: Client,
    api_key: String,
    search_url: String,
}

impl YouTubeClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, VideoError> {
        let api_key = config
            .youtube_api_key
            .clone()
            .ok_or(VideoError::MissingKey)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| VideoError::Http(err.to_string()))?;
        Ok(Self::with_client(client, api_key, SEARCH_URL))
    }

    pub fn with_client(client: Client, api_key: String, search_url: &str) -> Self {
        Self {
            client,
            api_key,
            search_url: search_url.to_string(),
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Video>, VideoError> {
        let query = clean_search_query(query);
        debug!(query = %query, "youtube search");
        let response = self
            .client
            .get(self.search_url.as_str())
            .query(&[
                ("part", "snippet"),
                ("q", query.as_str()),
                ("type", "video"),
                ("videoCategoryId", MUSIC_CATEGORY),
                ("maxResults", MAX_RESULTS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|err| VideoError::Http(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| VideoError::Http(err.to_string()))?;
        if !status.is_success() {
            return Err(VideoError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        parse_search_response(&body)
    }
}

/// Memoizes artist lookups for the life of the process. A failed or empty
/// lookup is cached as an empty list and never retried.
#[derive(Default)]
pub struct VideoLookup {
    cache: Mutex<HashMap<String, Vec<Video>>>,
}

impl VideoLookup {
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_key(artist: &str) -> String {
        artist.trim().to_lowercase()
    }

    pub fn cached(&self, artist: &str) -> Option<Vec<Video>> {
        let cache = self.cache.lock().ok()?;
        cache.get(&Self::cache_key(artist)).cloned()
    }

    pub fn store(&self, artist: &str, videos: Vec<Video>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(Self::cache_key(artist), videos);
        }
    }

    /// Cached list or a fresh fetch. Enrichment path only: a failed fetch
    /// is logged and cached as an empty list.
    pub async fn get_or_fetch<F, Fut>(&self, artist: &str, fetch: F) -> Vec<Video>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Vec<Video>, VideoError>>,
    {
        if let Some(hit) = self.cached(artist) {
            return hit;
        }
        let videos = match fetch(artist.to_string()).await {
            Ok(videos) => videos,
            Err(err) => {
                warn!(artist, "video lookup failed: {err}");
                Vec::new()
            }
        };
        self.store(artist, videos.clone());
        videos
    }

    pub async fn lookup(&self, youtube: &YouTubeClient, artist: &str) -> Vec<Video> {
        self.get_or_fetch(artist, |query| async move { youtube.search(&query).await })
            .await
    }
}

/// Ticketmaster music shows at small rooms and every Smokey Joe's show get
/// video links.
pub fn wants_videos(event: &NormalizedEvent, config: &AppConfig) -> bool {
    match event.source.as_str() {
        "smokeyjoes" => true,
        "ticketmaster" => {
            event
                .genres
                .iter()
                .any(|genre| genre.to_lowercase().contains("music"))
                && config.is_video_venue(&event.venue)
        }
        _ => false,
    }
}

pub async fn enrich_results(
    results: &mut [SourceResult],
    lookup: &VideoLookup,
    youtube: &YouTubeClient,
    config: &AppConfig,
) {
    let mut enriched = 0usize;
    for result in results.iter_mut() {
        for event in result.events.iter_mut() {
            if !wants_videos(event, config) {
                continue;
            }
            let videos = lookup.lookup(youtube, &event.name).await;
            if !videos.is_empty() {
                enriched += 1;
            }
            event.youtube_links = Some(videos);
        }
    }
    info!(enriched, "video enrichment finished");
}
