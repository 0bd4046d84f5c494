use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Selector};

use super::SourceError;
use crate::config::AppConfig;
use crate::utils;

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,2})(?::(\d{2}))?\s*(am|pm)").expect("valid time regex"));
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#?\w+;").expect("entity regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));
static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("iso date regex"));
static NUMERIC_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("numeric date regex"));
static MONTH_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s+(\d{4})\b)?",
    )
    .expect("month date regex")
});
static ANY_ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("embedded iso regex"));
static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"h1, h2, h3, h4, h5, h6, [class*="title"]"#).expect("heading selector")
});
static TIME_ELEMENT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time").expect("time selector"));
static SLUG_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").expect("slug regex"));

const ENTITIES: [(&str, &str); 8] = [
    ("&#39;", "'"),
    ("&quot;", "\""),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&nbsp;", " "),
    ("&#x27;", "'"),
    ("&#x2F;", "/"),
];

const FALLBACK_FORMATS: [&str; 6] = [
    "%m/%d/%y",
    "%A, %B %d, %Y",
    "%Y/%m/%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
];

pub const BASE_SCORE: u32 = 70;
pub const PREFERRED_VENUE_BONUS: u32 = 15;
pub const MUSIC_BONUS: u32 = 10;
pub const MAX_SCORE: u32 = 98;

pub fn clean_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().and_then(|node| {
        let cleaned = inner_text(node);
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    })
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn first_attr(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn absolute_url(base: &str, href: Option<String>) -> Option<String> {
    let href = href?;
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href);
    }
    let base_url = reqwest::Url::parse(base).ok()?;
    base_url.join(&href).ok().map(|u| u.to_string())
}

/// Replaces the handful of entities venue sites actually emit. Unknown
/// entities are left as written.
pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[0];
            ENTITIES
                .iter()
                .find(|(name, _)| *name == entity)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| entity.to_string())
        })
        .into_owned()
}

pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

pub fn find_first_time(text: &str) -> Option<String> {
    let cleaned = clean_text(text);
    let caps = TIME_RE.captures(&cleaned)?;
    let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let minute = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0);
    let period = caps.get(3)?.as_str().to_uppercase();
    Some(format!("{}:{:02} {}", hour, minute, period))
}

/// Parses the date shapes venue pages print. Year-less dates resolve to the
/// next occurrence on or after `today`.
pub fn parse_date_text(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = clean_text(input);
    if cleaned.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_DATE_RE.captures(&cleaned) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = NUMERIC_DATE_RE.captures(&cleaned) {
        let month = caps[1].parse().ok()?;
        let day = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(caps) = MONTH_DATE_RE.captures(&cleaned) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        match caps.get(3) {
            Some(year) => {
                let year = year.as_str().parse().ok()?;
                if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                    return Some(date);
                }
            }
            None => return roll_forward(month, day, today),
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(&cleaned) {
        return Some(dt.date_naive());
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

/// Searches free text (a whole event block) for the first recognizable date.
pub fn find_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = ANY_ISO_DATE_RE.captures(text) {
        if let Some(date) = parse_date_text(&caps[1], today) {
            return Some(date);
        }
    }
    parse_date_text(text, today)
}

/// Title of a loosely structured event block: the first heading or
/// title-classed element with any text.
pub fn block_title(card: &ElementRef<'_>) -> Option<String> {
    card.select(&HEADING_SELECTOR)
        .map(inner_text)
        .find(|text| !text.is_empty())
}

/// Date of a loosely structured event block: `<time datetime>`, then the
/// `<time>` text, then whatever the block's text says.
pub fn block_date(card: &ElementRef<'_>, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(date) = first_attr(card, &TIME_ELEMENT_SELECTOR, "datetime")
        .and_then(|value| parse_date_text(&value, today))
    {
        return Some(date);
    }
    if let Some(date) =
        first_text(card, &TIME_ELEMENT_SELECTOR).and_then(|value| parse_date_text(&value, today))
    {
        return Some(date);
    }
    find_date(&inner_text(*card), today)
}

fn roll_forward(month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
    match this_year {
        Some(date) if date >= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let prefix = lower.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

pub fn is_upcoming(date: &str, today: NaiveDate) -> bool {
    date >= utils::iso_date(today).as_str()
}

pub fn event_id(prefix: &str, name: &str, date: &str) -> String {
    let joined = format!("{prefix}-{name}-{date}").to_lowercase();
    let dashed = joined.split_whitespace().collect::<Vec<_>>().join("-");
    SLUG_STRIP_RE.replace_all(&dashed, "").into_owned()
}

pub fn match_score(config: &AppConfig, venue: &str, is_music: bool) -> u32 {
    let mut score = BASE_SCORE;
    if config.is_preferred_venue(venue) {
        score += PREFERRED_VENUE_BONUS;
    }
    if is_music {
        score += MUSIC_BONUS;
    }
    score.min(MAX_SCORE)
}

pub fn build_client(config: &AppConfig) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|err| SourceError::Http(err.to_string()))
}

pub async fn fetch_text(client: &Client, url: &str) -> Result<String, SourceError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| SourceError::Http(format!("request failed for {url}: {err}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response
        .text()
        .await
        .map_err(|err| SourceError::Http(format!("unable to read response body for {url}: {err}")))
}
