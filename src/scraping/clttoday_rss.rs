use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::base;
use super::{EventSource, ParseContext, SourceError};
use crate::models::NormalizedEvent;
use crate::utils;

const URL: &str = "https://clttoday.6amcity.com/events.rss";
const SOURCE_ID: &str = "clttoday";
const SOURCE_NAME: &str = "CLTtoday";
const VENUE: &str = "CLTtoday Article";
const BASE_SCORE: u32 = 60;
const EVENT_CATEGORY_BONUS: u32 = 10;
const DESCRIPTION_LIMIT: usize = 300;

static ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<item>(.*?)</item>").expect("rss item regex"));
static DETAIL_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"clttoday\.6amcity\.com/events#/details/[^/]+/\d+/(\d{4}-\d{2}-\d{2})")
        .expect("detail link regex")
});
static IMG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]+src="([^"]+)""#).expect("img regex"));

pub struct CltToday;

/// Article-level fields pulled from one `<item>`.
#[derive(Debug)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    category: Option<String>,
    content: Option<String>,
}

impl EventSource for CltToday {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn url(&self) -> &'static str {
        URL
    }

    fn parse(&self, raw: &str, ctx: &ParseContext<'_>) -> Result<Vec<NormalizedEvent>, SourceError> {
        let mut events = Vec::new();
        let mut item_count = 0;
        for caps in ITEM_RE.captures_iter(raw) {
            item_count += 1;
            let item = read_item(&caps[1]);
            match convert(item, ctx) {
                Some(event) => events.push(event),
                None => debug!(source = SOURCE_ID, item = item_count, "skipping article without title or dates"),
            }
        }
        debug!(source = SOURCE_ID, item_count, parsed = events.len(), "rss parsed");
        Ok(events)
    }
}

static TITLE_FIELD: Lazy<RssField> = Lazy::new(|| RssField::new("title"));
static LINK_FIELD: Lazy<RssField> = Lazy::new(|| RssField::new("link"));
static DESCRIPTION_FIELD: Lazy<RssField> = Lazy::new(|| RssField::new("description"));
static CATEGORY_FIELD: Lazy<RssField> = Lazy::new(|| RssField::new("category"));
static CONTENT_FIELD: Lazy<RssField> = Lazy::new(|| RssField::new("content:encoded"));

/// Patterns for one child element of `<item>`: CDATA-wrapped value first,
/// then the plain element body.
struct RssField {
    cdata: Regex,
    plain: Regex,
}

impl RssField {
    fn new(name: &str) -> Self {
        let tag = regex::escape(name);
        Self {
            cdata: Regex::new(&format!(
                r"(?is)<{tag}[^>]*>\s*<!\[CDATA\[(.*?)\]\]>\s*</{tag}>"
            ))
            .expect("rss cdata field regex"),
            plain: Regex::new(&format!(r"(?is)<{tag}[^>]*>(.*?)</{tag}>"))
                .expect("rss field regex"),
        }
    }

    fn read(&self, xml: &str) -> Option<String> {
        self.cdata
            .captures(xml)
            .or_else(|| self.plain.captures(xml))
            .map(|caps| caps[1].trim().to_string())
    }
}

fn read_item(xml: &str) -> RssItem {
    RssItem {
        title: TITLE_FIELD.read(xml),
        link: LINK_FIELD.read(xml),
        description: DESCRIPTION_FIELD.read(xml),
        category: CATEGORY_FIELD.read(xml),
        content: CONTENT_FIELD.read(xml),
    }
}

fn convert(item: RssItem, ctx: &ParseContext<'_>) -> Option<NormalizedEvent> {
    let title = item
        .title
        .as_deref()
        .map(|t| base::clean_text(&base::decode_entities(t)))
        .filter(|t| !t.is_empty())?;

    let haystack = item
        .content
        .as_deref()
        .or(item.description.as_deref())
        .unwrap_or_default();
    let mut dates: Vec<String> = DETAIL_LINK_RE
        .captures_iter(haystack)
        .map(|caps| caps[1].to_string())
        .filter(|date| base::parse_date_text(date, ctx.today).is_some())
        .collect();
    if dates.is_empty() {
        return None;
    }
    dates.sort();
    let today = utils::iso_date(ctx.today);
    let date = dates
        .iter()
        .find(|date| date.as_str() >= today.as_str())
        .unwrap_or(&dates[0])
        .clone();

    let image_url = item
        .description
        .as_deref()
        .and_then(|d| IMG_RE.captures(d))
        .map(|caps| caps[1].to_string());
    let description = item
        .description
        .as_deref()
        .map(|d| base::clean_text(&base::decode_entities(&base::strip_tags(d))))
        .map(|d| d.chars().take(DESCRIPTION_LIMIT).collect::<String>())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| title.clone());

    let category = item
        .category
        .as_deref()
        .map(|c| base::clean_text(&base::decode_entities(c)))
        .filter(|c| !c.is_empty());
    let mut match_score = BASE_SCORE;
    if category
        .as_deref()
        .map(|c| c.to_lowercase().contains("event"))
        .unwrap_or(false)
    {
        match_score += EVENT_CATEGORY_BONUS;
    }
    let genres = vec![category.unwrap_or_else(|| "News".to_string())];

    let link = item.link.map(|l| base::decode_entities(l.trim()));
    let id = format!("clt-{}", link.as_deref().unwrap_or(&title));

    debug!(source = SOURCE_ID, title = %title, dates = dates.len(), "article parsed");
    Some(NormalizedEvent {
        id,
        name: title,
        date,
        time: None,
        venue: VENUE.to_string(),
        venue_address: None,
        city: Some("Charlotte".to_string()),
        description: Some(description),
        price: 0.0,
        ticket_url: link,
        image_url,
        genres,
        source: SOURCE_ID.to_string(),
        source_type: None,
        match_score,
        youtube_links: None,
    })
}
