use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::base;
use super::{EventSource, ParseContext, SourceError};
use crate::models::{NormalizedEvent, SourceType};
use crate::utils;

const URL: &str = "https://www.cometgrillcharlotte.com/music";
const SOURCE_ID: &str = "comet-grill";
const SOURCE_NAME: &str = "Comet Grill";
const ADDRESS: &str = "2224 Park Road, Charlotte, NC 28203";
const DIVIDER_CLASS: &str = "eventlist-past-upcoming-divider";

static LIST_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[class*="events-list"]"#).expect("comet list selector"));
static ITEM_OR_DIVIDER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("article.eventlist-event, .eventlist-past-upcoming-divider")
        .expect("comet item selector")
});
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.eventlist-title-link").expect("comet title"));
static DATE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time.event-date").expect("comet date"));
static START_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".event-time-localized-start").expect("comet start"));
static VENUE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".eventlist-meta-address-maplink").expect("comet venue"));

pub struct CometGrill;

impl EventSource for CometGrill {
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
        let scope = document
            .select(&LIST_SELECTOR)
            .next()
            .unwrap_or_else(|| document.root_element());

        let mut events = Vec::new();
        for node in scope.select(&ITEM_OR_DIVIDER_SELECTOR) {
            // Squarespace renders past events after the divider.
            if has_class(&node, DIVIDER_CLASS) {
                break;
            }
            match parse_item(&node, ctx) {
                Some(event) if base::is_upcoming(&event.date, ctx.today) => events.push(event),
                Some(event) => debug!(source = SOURCE_ID, date = %event.date, "dropping past event"),
                None => debug!(source = SOURCE_ID, "skipping item without title or date"),
            }
        }
        Ok(events)
    }
}

fn has_class(node: &ElementRef<'_>, class: &str) -> bool {
    node.value().classes().any(|c| c == class)
}

fn parse_item(card: &ElementRef<'_>, ctx: &ParseContext<'_>) -> Option<NormalizedEvent> {
    let name = base::first_text(card, &TITLE_SELECTOR)?;
    let date_text = base::first_attr(card, &DATE_SELECTOR, "datetime")
        .or_else(|| base::first_text(card, &DATE_SELECTOR))?;
    let date = utils::iso_date(base::parse_date_text(&date_text, ctx.today)?);

    let time = base::first_text(card, &START_SELECTOR);
    let venue = base::first_text(card, &VENUE_SELECTOR).unwrap_or_else(|| SOURCE_NAME.to_string());

    Some(NormalizedEvent {
        id: base::event_id(SOURCE_ID, &name, &date),
        description: Some(format!("{name} at {SOURCE_NAME}")),
        match_score: base::match_score(ctx.config, &venue, true),
        name,
        date,
        time,
        venue,
        venue_address: Some(ADDRESS.to_string()),
        city: Some("Charlotte".to_string()),
        price: 0.0,
        ticket_url: None,
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

    const SAMPLE_HTML: &str = r#"
    <html><body>
    <div class="eventlist eventlist--upcoming events-list">
      <article class="eventlist-event eventlist-event--upcoming">
        <h1 class="eventlist-title"><a href="/music/a" class="eventlist-title-link">The Loud &amp; Proud</a></h1>
        <ul class="eventlist-meta">
          <li><time class="event-date" datetime="2024-11-02">Saturday, November 2, 2024</time></li>
          <li><time class="event-time-localized-start">8:00 PM</time></li>
          <li><span class="eventlist-meta-address-maplink">Comet Grill</span></li>
        </ul>
      </article>
      <article class="eventlist-event eventlist-event--upcoming">
        <h1 class="eventlist-title"><a class="eventlist-title-link">Trivia <em>Night</em></a></h1>
        <ul class="eventlist-meta">
          <li><time class="event-date">November 9, 2024</time></li>
        </ul>
      </article>
      <article class="eventlist-event eventlist-event--upcoming">
        <h1 class="eventlist-title"><a class="eventlist-title-link">No Date Band</a></h1>
      </article>
      <article class="eventlist-event eventlist-event--upcoming">
        <h1 class="eventlist-title"><a class="eventlist-title-link">Yesterday's Jam</a></h1>
        <time class="event-date" datetime="2024-10-30">October 30, 2024</time>
      </article>
      <div class="eventlist-past-upcoming-divider">Past Events</div>
      <article class="eventlist-event eventlist-event--past">
        <h1 class="eventlist-title"><a class="eventlist-title-link">Past Show</a></h1>
        <time class="event-date" datetime="2025-01-01">January 1, 2025</time>
      </article>
    </div>
    </body></html>
    "#;

    #[test]
    fn parses_upcoming_events_before_divider() {
        let config = AppConfig::default();
        let ctx = ParseContext {
            today: NaiveDate::from_ymd_opt(2024, 10, 31).expect("date"),
            config: &config,
        };
        let events = CometGrill.parse(SAMPLE_HTML, &ctx).expect("parse html");
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["The Loud & Proud", "Trivia Night"]);

        let first = &events[0];
        assert_eq!(first.date, "2024-11-02");
        assert_eq!(first.time.as_deref(), Some("8:00 PM"));
        assert_eq!(first.id, "comet-grill-the-loud--proud-2024-11-02");
        assert!(first.ticket_url.is_none());
        assert_eq!(first.price, 0.0);
        assert_eq!(first.source_type, Some(SourceType::Venue));
        assert_eq!(first.match_score, 80);

        let second = &events[1];
        assert_eq!(second.date, "2024-11-09");
        assert!(second.time.is_none());
        assert_eq!(second.venue, "Comet Grill");
    }
}
