pub mod base;
pub mod clttoday_rss;
pub mod comet_grill_html;
pub mod eternally_grateful_html;
pub mod fillmore_jsonld;
pub mod smokey_joes_html;
pub mod snug_harbor_html;
pub mod ticketmaster_api;

use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::{NormalizedEvent, SourceResult, SourceType};
use crate::utils;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0} is not configured")]
    MissingKey(&'static str),
    #[error("http error: {0}")]
    Http(String),
    #[error("non-success status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown source id: {0}")]
    UnknownSource(String),
}

/// Inputs every adapter may consult while parsing. Passing `today` in keeps
/// parsing deterministic.
pub struct ParseContext<'a> {
    pub today: NaiveDate,
    pub config: &'a AppConfig,
}

pub trait EventSource: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn url(&self) -> &'static str;

    fn source_type(&self) -> Option<SourceType> {
        None
    }

    fn request_url(&self, _config: &AppConfig) -> Result<String, SourceError> {
        Ok(self.url().to_string())
    }

    /// Converts one raw response into events. Broken records are skipped;
    /// only an unreadable document as a whole is an error.
    fn parse(&self, raw: &str, ctx: &ParseContext<'_>) -> Result<Vec<NormalizedEvent>, SourceError>;
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub id: String,
    pub name: String,
    pub url: String,
    pub source_type: Option<SourceType>,
    pub enabled: bool,
}

fn all_sources() -> Vec<Box<dyn EventSource>> {
    vec![
        Box::new(ticketmaster_api::Ticketmaster),
        Box::new(smokey_joes_html::SmokeyJoes),
        Box::new(clttoday_rss::CltToday),
        Box::new(fillmore_jsonld::Fillmore),
        Box::new(eternally_grateful_html::EternallyGrateful),
        Box::new(snug_harbor_html::SnugHarbor),
        Box::new(comet_grill_html::CometGrill),
    ]
}

fn active_sources(config: &AppConfig) -> Vec<Box<dyn EventSource>> {
    all_sources()
        .into_iter()
        .filter(|source| config.source_enabled(source.id()))
        .collect()
}

pub fn list_sources(config: &AppConfig) -> Vec<SourceInfo> {
    all_sources()
        .into_iter()
        .map(|source| SourceInfo {
            id: source.id().to_string(),
            name: source.name().to_string(),
            url: source.url().to_string(),
            source_type: source.source_type(),
            enabled: config.source_enabled(source.id()),
        })
        .collect()
}

pub fn find_source(id: &str) -> Option<Box<dyn EventSource>> {
    all_sources().into_iter().find(|source| source.id() == id)
}

pub async fn fetch_and_parse(
    source: &dyn EventSource,
    client: &Client,
    config: &AppConfig,
    today: NaiveDate,
) -> Result<Vec<NormalizedEvent>, SourceError> {
    let url = source.request_url(config)?;
    let raw = base::fetch_text(client, &url).await?;
    let ctx = ParseContext { today, config };
    let events = source.parse(&raw, &ctx)?;
    info!(source = source.id(), count = events.len(), "parsed events");
    Ok(events)
}

fn settle(
    id: &str,
    name: &str,
    outcome: Result<Vec<NormalizedEvent>, SourceError>,
) -> SourceResult {
    match outcome {
        Ok(events) => SourceResult {
            source: id.to_string(),
            name: name.to_string(),
            events,
            scraped_at: utils::now_rfc3339(),
            error: None,
        },
        Err(err) => {
            warn!(source = id, "source failed: {err}");
            SourceResult {
                source: id.to_string(),
                name: name.to_string(),
                events: Vec::new(),
                scraped_at: utils::now_rfc3339(),
                error: Some(err.to_string()),
            }
        }
    }
}

/// Runs every enabled adapter concurrently and waits for all of them. A
/// failing adapter degrades to an empty result; it never affects the others.
pub async fn run_all(config: Arc<AppConfig>) -> Vec<SourceResult> {
    let sources = active_sources(&config);
    match base::build_client(&config) {
        Ok(client) => run_sources(sources, client, config).await,
        Err(err) => sources
            .iter()
            .map(|source| settle(source.id(), source.name(), Err(SourceError::Http(err.to_string()))))
            .collect(),
    }
}

async fn run_sources(
    sources: Vec<Box<dyn EventSource>>,
    client: Client,
    config: Arc<AppConfig>,
) -> Vec<SourceResult> {
    let today = utils::today();
    let mut handles = Vec::new();
    for source in sources {
        let id = source.id();
        let name = source.name();
        let client = client.clone();
        let config = Arc::clone(&config);
        let handle = tokio::spawn(async move {
            fetch_and_parse(source.as_ref(), &client, &config, today).await
        });
        handles.push((id, name, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (id, name, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(err) => Err(SourceError::Parse(format!("adapter task aborted: {err}"))),
        };
        results.push(settle(id, name, outcome));
    }

    let total: usize = results.iter().map(|result| result.events.len()).sum();
    let failed = results.iter().filter(|result| !result.is_ok()).count();
    info!(total, failed, "aggregation finished");
    results
}

pub async fn run_single(id: &str, config: &AppConfig) -> Result<SourceResult, SourceError> {
    let source = find_source(id).ok_or_else(|| SourceError::UnknownSource(id.to_string()))?;
    let client = base::build_client(config)?;
    let events = fetch_and_parse(source.as_ref(), &client, config, utils::today()).await?;
    Ok(settle(source.id(), source.name(), Ok(events)))
}
