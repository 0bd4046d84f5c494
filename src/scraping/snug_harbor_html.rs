use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::base;
use super::{EventSource, ParseContext, SourceError};
use crate::models::{NormalizedEvent, SourceType};
use crate::utils;

const URL: &str = "https://snugrock.com";
const SOURCE_ID: &str = "snugharbor";
const SOURCE_NAME: &str = "Snug Harbor";
const ADDRESS: &str = "1228 Gordon St, Charlotte, NC 28205";

static ARTICLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"article[class*="event"]"#).expect("snug article selector"));
static DIV_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[class*="event"]"#).expect("snug div selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("snug link selector"));

pub struct SnugHarbor;

impl EventSource for SnugHarbor {
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
        let mut cards: Vec<ElementRef<'_>> = document.select(&ARTICLE_SELECTOR).collect();
        if cards.is_empty() {
            cards = document.select(&DIV_SELECTOR).collect();
        }

        // Nested `event-*` wrappers resolve to the same show; keep the first.
        let mut seen = HashSet::new();
        let mut events = Vec::new();
        for card in cards {
            let Some(event) = parse_card(&card, ctx) else {
                continue;
            };
            if !base::is_upcoming(&event.date, ctx.today) || !seen.insert(event.id.clone()) {
                continue;
            }
            events.push(event);
        }

        if events.is_empty() {
            debug!(source = SOURCE_ID, "no events matched the listing markup");
        }
        Ok(events)
    }
}

fn parse_card(card: &ElementRef<'_>, ctx: &ParseContext<'_>) -> Option<NormalizedEvent> {
    let name = base::block_title(card)?;
    let date = utils::iso_date(base::block_date(card, ctx.today)?);
    let time = base::find_first_time(&base::inner_text(*card));
    let ticket_url = base::absolute_url(URL, base::first_attr(card, &LINK_SELECTOR, "href"));

    Some(NormalizedEvent {
        id: base::event_id(SOURCE_ID, &name, &date),
        description: Some(name.clone()),
        match_score: base::match_score(ctx.config, SOURCE_NAME, true),
        name,
        date,
        time,
        venue: SOURCE_NAME.to_string(),
        venue_address: Some(ADDRESS.to_string()),
        city: Some("Charlotte".to_string()),
        price: 0.0,
        ticket_url,
        image_url: None,
        genres: vec!["Live Music".to_string()],
        source: SOURCE_ID.to_string(),
        source_type: Some(SourceType::Venue),
        youtube_links: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use chrono::NaiveDate;

    fn ctx(config: &AppConfig) -> ParseContext<'_> {
        ParseContext {
            today: NaiveDate::from_ymd_opt(2024, 12, 1).expect("date"),
            config,
        }
    }

    #[test]
    fn parses_event_articles() {
        let html = r#"
        <main>
          <article class="post type-event">
            <h2 class="entry-title">Punk Night &#39;24</h2>
            <time datetime="2024-12-06T21:00:00">Dec 6</time>
            <p>Doors 9pm</p>
            <a href="/events/punk-night">Details</a>
          </article>
          <article class="post type-event">
            <h2>Open Mic</h2>
            <p>Every Monday, next on 12/9/2024</p>
          </article>
          <article class="post type-event">
            <p>No title, 2024-12-10</p>
          </article>
          <article class="post type-event">
            <h2>Last Month</h2>
            <time datetime="2024-11-02">Nov 2</time>
          </article>
        </main>
        "#;
        let config = AppConfig::default();
        let events = SnugHarbor.parse(html, &ctx(&config)).expect("parse html");
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.name, "Punk Night '24");
        assert_eq!(first.date, "2024-12-06");
        assert_eq!(first.time.as_deref(), Some("9:00 PM"));
        assert_eq!(first.ticket_url.as_deref(), Some("https://snugrock.com/events/punk-night"));
        assert_eq!(first.match_score, 95);

        assert_eq!(events[1].name, "Open Mic");
        assert_eq!(events[1].date, "2024-12-09");
    }

    #[test]
    fn falls_back_to_event_divs() {
        let html = r#"
        <div class="event-list">
          <div class="event-card">
            <div class="event-title">Surf Rock Sunday</div>
            <div class="event-date">December 15, 2024</div>
          </div>
        </div>
        "#;
        let config = AppConfig::default();
        let events = SnugHarbor.parse(html, &ctx(&config)).expect("parse html");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Surf Rock Sunday");
        assert_eq!(events[0].date, "2024-12-15");
    }
}
