pub mod calendar;
pub mod config;
pub mod filters;
pub mod models;
pub mod normalize;
pub mod playback;
pub mod scraping;
pub mod server;
pub mod substitutions;
pub mod utils;
pub mod videos;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use filters::FilterState;
use models::{GroupedEvent, NormalizedEvent, SourceResult};
use videos::{VideoError, VideoLookup, YouTubeClient};

/// Installs the fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// One aggregation pass: every adapter's outcome, the cleaned listings the
/// filters run over, and those listings grouped for lookups by name.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub results: Vec<SourceResult>,
    pub records: Vec<NormalizedEvent>,
    pub events: Vec<GroupedEvent>,
    pub scraped_at: String,
}

impl Snapshot {
    pub fn from_results(results: Vec<SourceResult>, config: &AppConfig) -> Self {
        let records = normalize::clean_events(&results, config);
        let events = normalize::group_events(records.clone());
        debug!(records = records.len(), grouped = events.len(), "snapshot built");
        Self {
            results,
            records,
            events,
            scraped_at: utils::now_rfc3339(),
        }
    }

    pub fn failed_sources(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|result| !result.is_ok())
            .map(|result| result.source.clone())
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub events: Vec<GroupedEvent>,
    pub available_genres: Vec<String>,
    pub failed_sources: Vec<String>,
    pub scraped_at: String,
}

/// Runs every enabled adapter, attaches videos where wanted and merges.
pub async fn collect(config: Arc<AppConfig>, lookup: &VideoLookup) -> Snapshot {
    let mut results = scraping::run_all(Arc::clone(&config)).await;

    match YouTubeClient::from_config(&config) {
        Ok(youtube) => videos::enrich_results(&mut results, lookup, &youtube, &config).await,
        Err(VideoError::MissingKey) => debug!("no youtube key; skipping video enrichment"),
        Err(err) => warn!("video enrichment unavailable: {err}"),
    }

    Snapshot::from_results(results, &config)
}

/// Applies one filter state to a snapshot. Genres offered to the picker come
/// from the whole snapshot, not the filtered slice.
pub fn build_feed(snapshot: &Snapshot, state: &FilterState, config: &AppConfig) -> Feed {
    let available_genres =
        filters::available_genres(&snapshot.records, &config.hidden_genre_labels);
    let events = filters::apply_filters(snapshot.records.clone(), state, config, utils::today());
    Feed {
        events,
        available_genres,
        failed_sources: snapshot.failed_sources(),
        scraped_at: snapshot.scraped_at.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordRule;
    use crate::models::NormalizedEvent;

    fn listing(id: &str, name: &str, date: &str, source: &str) -> NormalizedEvent {
        NormalizedEvent {
            id: id.to_string(),
            name: name.to_string(),
            date: date.to_string(),
            venue: "Bojangles Coliseum".to_string(),
            source: source.to_string(),
            match_score: 70,
            ..Default::default()
        }
    }

    fn result(source: &str, events: Vec<NormalizedEvent>, error: Option<&str>) -> SourceResult {
        SourceResult {
            source: source.to_string(),
            name: source.to_string(),
            events,
            scraped_at: utils::now_rfc3339(),
            error: error.map(str::to_string),
        }
    }

    fn wrestling_snapshot(config: &AppConfig) -> Snapshot {
        Snapshot::from_results(
            vec![
                result(
                    "ticketmaster",
                    vec![
                        listing("tm-old", "WRESTLING NIGHT", "2001-05-01", "ticketmaster"),
                        listing("tm-1", "WRESTLING NIGHT", "2099-03-01", "ticketmaster"),
                    ],
                    None,
                ),
                result(
                    "clttoday",
                    vec![listing("clt-1", "Wrestling Night", "2099-03-08", "clttoday")],
                    None,
                ),
            ],
            config,
        )
    }

    #[test]
    fn scoped_rules_drop_only_their_source_after_merging() {
        let mut config = AppConfig::default();
        config.keyword_exclusions = vec![KeywordRule::new("wrestling", "ticketmaster")];
        let snapshot = wrestling_snapshot(&config);
        assert_eq!(snapshot.events.len(), 1, "one card across both sources");

        let feed = build_feed(&snapshot, &FilterState::default(), &config);
        assert_eq!(feed.events.len(), 1);
        let card = &feed.events[0];
        assert_eq!(card.event.id, "clt-1");
        assert_eq!(card.event.source, "clttoday");
        let dates: Vec<_> = card.dates.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2099-03-08"]);
    }

    #[test]
    fn feed_cards_only_carry_upcoming_dates() {
        let config = AppConfig::default();
        let snapshot = wrestling_snapshot(&config);

        let feed = build_feed(&snapshot, &FilterState::default(), &config);
        assert_eq!(feed.events.len(), 1);
        assert_eq!(feed.events[0].event.name, "Wrestling Night");
        assert_eq!(feed.events[0].first_date(), "2099-03-01");
        assert_eq!(feed.events[0].dates.len(), 2);

        let only_clt = FilterState {
            sources: ["clttoday".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let feed = build_feed(&snapshot, &only_clt, &config);
        assert_eq!(feed.events.len(), 1);
        assert_eq!(feed.events[0].event.id, "clt-1");
    }

    #[test]
    fn every_source_failing_gives_an_empty_feed() {
        let config = AppConfig::default();
        let snapshot = Snapshot::from_results(
            vec![
                result("ticketmaster", Vec::new(), Some("TICKETMASTER_API_KEY is not configured")),
                result(
                    "fillmore",
                    vec![listing("f-1", "Ghost", "2099-01-01", "fillmore")],
                    Some("timeout"),
                ),
                result("clttoday", Vec::new(), Some("non-success status 500")),
            ],
            &config,
        );

        let feed = build_feed(&snapshot, &FilterState::default(), &config);
        assert!(feed.events.is_empty());
        assert!(feed.available_genres.is_empty());
        assert_eq!(feed.failed_sources, vec!["ticketmaster", "fillmore", "clttoday"]);
    }
}
