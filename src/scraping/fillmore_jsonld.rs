use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::base;
use super::{EventSource, ParseContext, SourceError};
use crate::models::{NormalizedEvent, SourceType};
use crate::utils;

const URL: &str = "https://www.fillmorenc.com/";
const SOURCE_ID: &str = "fillmore";
const SOURCE_NAME: &str = "The Fillmore Charlotte";
const UNDERGROUND: &str = "The Underground";
const EVENT_TYPES: [&str; 2] = ["MusicEvent", "Event"];

static JSON_LD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("json-ld selector")
});

/// Live Nation venue page; events are only published as schema.org JSON-LD.
pub struct Fillmore;

impl EventSource for Fillmore {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn url(&self) -> &'static str {
        URL
    }

    fn source_type(&self) -> Option<SourceType> {
        Some(SourceType::Venue)
    }

    fn parse(&self, raw: &str, ctx: &ParseContext<'_>) -> Result<Vec<NormalizedEvent>, SourceError> {
        let document = Html::parse_document(raw);
        let mut nodes = Vec::new();
        for (index, script) in document.select(&JSON_LD_SELECTOR).enumerate() {
            let body = script.text().collect::<String>();
            match serde_json::from_str::<Value>(body.trim()) {
                Ok(value) => flatten(value, &mut nodes),
                Err(err) => debug!(source = SOURCE_ID, block = index, "skipping malformed json-ld: {err}"),
            }
        }

        let events: Vec<NormalizedEvent> = nodes
            .iter()
            .filter(|node| is_event(node))
            .filter_map(|node| convert(node, ctx))
            .collect();
        debug!(source = SOURCE_ID, nodes = nodes.len(), parsed = events.len(), "json-ld parsed");
        Ok(events)
    }
}

/// Unwraps top-level arrays and `@graph` containers into individual nodes.
fn flatten(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten(item, out);
            }
        }
        Value::Object(mut map) => match map.remove("@graph") {
            Some(graph) => flatten(graph, out),
            None => out.push(Value::Object(map)),
        },
        _ => {}
    }
}

fn is_event(node: &Value) -> bool {
    match node.get("@type") {
        Some(Value::String(kind)) => EVENT_TYPES.contains(&kind.as_str()),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .any(|kind| EVENT_TYPES.contains(&kind)),
        _ => false,
    }
}

fn str_at<'a>(node: &'a Value, pointer: &str) -> Option<&'a str> {
    node.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn convert(node: &Value, ctx: &ParseContext<'_>) -> Option<NormalizedEvent> {
    let name = str_at(node, "/name").map(base::decode_entities)?;
    let start = str_at(node, "/startDate")?;
    let date = utils::iso_date(base::parse_date_text(start, ctx.today)?);
    let time = start
        .split_once('T')
        .map(|(_, clock)| clock.chars().take(5).collect::<String>())
        .filter(|clock| clock.len() == 5);

    let location_name = str_at(node, "/location/name").unwrap_or(SOURCE_NAME);
    let venue = if location_name.to_lowercase().contains("underground") {
        UNDERGROUND
    } else {
        SOURCE_NAME
    };
    let address = format_address(node);
    let city = str_at(node, "/location/address/addressLocality").map(str::to_string);

    Some(NormalizedEvent {
        id: base::event_id(SOURCE_ID, &name, &date),
        description: Some(name.clone()),
        match_score: base::match_score(ctx.config, venue, true),
        name,
        date,
        time,
        venue: venue.to_string(),
        venue_address: address,
        city,
        price: 0.0,
        ticket_url: str_at(node, "/url").map(str::to_string),
        image_url: image(node),
        genres: Vec::new(),
        source: SOURCE_ID.to_string(),
        source_type: Some(SourceType::Venue),
        youtube_links: None,
    })
}

fn format_address(node: &Value) -> Option<String> {
    let street = str_at(node, "/location/address/streetAddress");
    let city = str_at(node, "/location/address/addressLocality");
    let region = str_at(node, "/location/address/addressRegion");
    let postal = str_at(node, "/location/address/postalCode");

    let region_line = match (region, postal) {
        (Some(region), Some(postal)) => Some(format!("{region} {postal}")),
        (Some(region), None) => Some(region.to_string()),
        (None, Some(postal)) => Some(postal.to_string()),
        (None, None) => None,
    };
    let parts: Vec<String> = [street.map(str::to_string), city.map(str::to_string), region_line]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// `image` may be a URL, a list of URLs or an `ImageObject`.
fn image(node: &Value) -> Option<String> {
    let value = node.get("image")?;
    let url = match value {
        Value::String(url) => Some(url.as_str()),
        Value::Array(items) => items.iter().find_map(|item| match item {
            Value::String(url) => Some(url.as_str()),
            other => other.get("url").and_then(Value::as_str),
        }),
        Value::Object(_) => value.get("url").and_then(Value::as_str),
        _ => None,
    }?;
    let url = url.trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}
