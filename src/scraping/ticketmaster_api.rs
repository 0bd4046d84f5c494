use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::base;
use super::{EventSource, ParseContext, SourceError};
use crate::config::AppConfig;
use crate::models::NormalizedEvent;

const URL: &str = "https://app.ticketmaster.com/discovery/v2/events.json";
const SOURCE_ID: &str = "ticketmaster";
const SOURCE_NAME: &str = "Ticketmaster";
const UNDEFINED: &str = "Undefined";

pub struct Ticketmaster;

#[derive(Debug, Deserialize)]
struct TmEvent {
    id: String,
    name: Option<String>,
    url: Option<String>,
    info: Option<String>,
    #[serde(rename = "pleaseNote")]
    please_note: Option<String>,
    dates: Option<TmDates>,
    #[serde(default)]
    classifications: Vec<TmClassification>,
    #[serde(rename = "priceRanges", default)]
    price_ranges: Vec<TmPriceRange>,
    #[serde(default)]
    images: Vec<TmImage>,
    #[serde(rename = "_embedded")]
    embedded: Option<TmEmbedded>,
}

#[derive(Debug, Deserialize)]
struct TmDates {
    start: Option<TmStart>,
}

#[derive(Debug, Deserialize)]
struct TmStart {
    #[serde(rename = "localDate")]
    local_date: Option<String>,
    #[serde(rename = "localTime")]
    local_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmClassification {
    segment: Option<TmNamed>,
    genre: Option<TmNamed>,
    #[serde(rename = "subGenre")]
    sub_genre: Option<TmNamed>,
}

#[derive(Debug, Deserialize)]
struct TmNamed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmPriceRange {
    min: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TmImage {
    url: Option<String>,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TmEmbedded {
    #[serde(default)]
    venues: Vec<TmVenue>,
}

#[derive(Debug, Deserialize)]
struct TmVenue {
    name: Option<String>,
    address: Option<TmAddress>,
    city: Option<TmNamed>,
    state: Option<TmState>,
    #[serde(rename = "postalCode")]
    postal_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmAddress {
    line1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmState {
    #[serde(rename = "stateCode")]
    state_code: Option<String>,
}

impl EventSource for Ticketmaster {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn url(&self) -> &'static str {
        URL
    }

    fn request_url(&self, config: &AppConfig) -> Result<String, SourceError> {
        let key = config
            .ticketmaster_api_key
            .as_deref()
            .ok_or(SourceError::MissingKey("TICKETMASTER_API_KEY"))?;
        let url = reqwest::Url::parse_with_params(
            URL,
            [
                ("apikey", key),
                ("city", "Charlotte"),
                ("stateCode", "NC"),
                ("size", "200"),
                ("sort", "date,asc"),
            ],
        )
        .map_err(|err| SourceError::Http(err.to_string()))?;
        Ok(url.into())
    }

    fn parse(&self, raw: &str, ctx: &ParseContext<'_>) -> Result<Vec<NormalizedEvent>, SourceError> {
        let payload: Value =
            serde_json::from_str(raw).map_err(|err| SourceError::Parse(err.to_string()))?;
        let items = payload
            .pointer("/_embedded/events")
            .or_else(|| payload.get("events"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut events = Vec::new();
        for item in items {
            let tm_event: TmEvent = match serde_json::from_value(item) {
                Ok(parsed) => parsed,
                Err(err) => {
                    debug!(source = SOURCE_ID, "skipping malformed event: {err}");
                    continue;
                }
            };
            if let Some(event) = convert(tm_event, ctx) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

fn convert(tm_event: TmEvent, ctx: &ParseContext<'_>) -> Option<NormalizedEvent> {
    let name = tm_event.name.as_deref().map(base::clean_text).filter(|n| !n.is_empty())?;
    let start = tm_event.dates.as_ref().and_then(|dates| dates.start.as_ref());
    let date_text = start.and_then(|s| s.local_date.as_deref())?;
    let date = base::parse_date_text(date_text, ctx.today)?;
    let time = start.and_then(|s| s.local_time.clone());

    let genres = classification_genres(tm_event.classifications.first());
    let is_music = tm_event
        .classifications
        .first()
        .map(|c| {
            let segment = named(c.segment.as_ref()).unwrap_or_default().to_lowercase();
            let genre = named(c.genre.as_ref()).unwrap_or_default().to_lowercase();
            segment.contains("music") || genre.contains("music")
        })
        .unwrap_or(false);

    let venue_data = tm_event
        .embedded
        .as_ref()
        .and_then(|embedded| embedded.venues.first());
    let venue = venue_data
        .and_then(|v| v.name.clone())
        .unwrap_or_else(|| "Venue TBA".to_string());
    let venue_address = venue_data.and_then(format_address);
    let city = venue_data.and_then(|v| named(v.city.as_ref()));

    let price = tm_event
        .price_ranges
        .first()
        .and_then(|range| range.min)
        .unwrap_or(0.0);

    let description = tm_event
        .info
        .clone()
        .or_else(|| tm_event.please_note.clone())
        .unwrap_or_else(|| name.clone());

    Some(NormalizedEvent {
        id: format!("tm-{}", tm_event.id),
        match_score: base::match_score(ctx.config, &venue, is_music),
        image_url: best_image(&tm_event.images),
        date: date.format("%Y-%m-%d").to_string(),
        time,
        venue,
        venue_address,
        city,
        description: Some(description),
        price,
        ticket_url: tm_event.url.clone(),
        genres,
        source: SOURCE_ID.to_string(),
        source_type: None,
        youtube_links: None,
        name,
    })
}

fn named(value: Option<&TmNamed>) -> Option<String> {
    value.and_then(|n| n.name.clone())
}

fn classification_genres(classification: Option<&TmClassification>) -> Vec<String> {
    let Some(classification) = classification else {
        return Vec::new();
    };
    [
        classification.segment.as_ref(),
        classification.genre.as_ref(),
        classification.sub_genre.as_ref(),
    ]
    .into_iter()
    .filter_map(named)
    .filter(|name| name != UNDEFINED)
    .collect()
}

/// Widest image wins; the first one listed wins a tie.
fn best_image(images: &[TmImage]) -> Option<String> {
    let mut best: Option<&TmImage> = None;
    for image in images.iter().filter(|image| image.url.is_some()) {
        let width = image.width.unwrap_or(0);
        match best {
            Some(current) if current.width.unwrap_or(0) >= width => {}
            _ => best = Some(image),
        }
    }
    best.and_then(|image| image.url.clone())
}

fn format_address(venue: &TmVenue) -> Option<String> {
    let line1 = venue.address.as_ref().and_then(|a| a.line1.as_deref())?;
    let city = named(venue.city.as_ref()).unwrap_or_default();
    let state = venue
        .state
        .as_ref()
        .and_then(|s| s.state_code.clone())
        .unwrap_or_default();
    let postal = venue.postal_code.clone().unwrap_or_default();
    Some(format!("{line1}, {city}, {state} {postal}").trim().to_string())
}
