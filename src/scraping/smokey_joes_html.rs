use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::base;
use super::{EventSource, ParseContext, SourceError};
use crate::models::{NormalizedEvent, SourceType};
use crate::utils;

const URL: &str = "https://www.smokeyjoes.cafe/events";
const TICKET_URL: &str = "https://smokeyjoes.cafe";
const SOURCE_ID: &str = "smokeyjoes";
const SOURCE_NAME: &str = "Smokey Joe's Cafe";
const ADDRESS: &str = "510 Briar Creek Rd, Charlotte, NC 28205";
const HOUSE_SCORE: u32 = 95;

static ITEM_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#".eventlist-event, .event-item, article[class*="event"]"#)
        .expect("smokey joes item selector")
});
static IMAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[src]").expect("smokey joes image selector"));

pub struct SmokeyJoes;

impl EventSource for SmokeyJoes {
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
        let mut events: Vec<NormalizedEvent> = Vec::new();

        for item in document.select(&ITEM_SELECTOR) {
            let event = match parse_item(&item, ctx) {
                Some(event) => event,
                None => continue,
            };
            if !base::is_upcoming(&event.date, ctx.today) {
                continue;
            }
            // `.eventlist-event` articles also match the class-substring rule.
            if events.iter().any(|existing| existing.id == event.id) {
                continue;
            }
            events.push(event);
        }

        debug!(source = SOURCE_ID, parsed = events.len(), "event blocks parsed");
        Ok(events)
    }
}

fn parse_item(item: &ElementRef<'_>, ctx: &ParseContext<'_>) -> Option<NormalizedEvent> {
    let name = base::block_title(item)?;
    let date = utils::iso_date(base::block_date(item, ctx.today)?);
    let time = base::find_first_time(&base::inner_text(*item));
    let image_url = base::absolute_url(URL, base::first_attr(item, &IMAGE_SELECTOR, "src"));

    Some(NormalizedEvent {
        id: base::event_id("sj", &name, &date),
        description: Some(format!("{name} live at {SOURCE_NAME}")),
        name,
        date,
        time,
        venue: SOURCE_NAME.to_string(),
        venue_address: Some(ADDRESS.to_string()),
        city: Some("Charlotte".to_string()),
        price: 0.0,
        ticket_url: Some(TICKET_URL.to_string()),
        image_url,
        genres: vec!["Music".to_string(), "Live".to_string()],
        source: SOURCE_ID.to_string(),
        source_type: Some(SourceType::Venue),
        match_score: HOUSE_SCORE,
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
      <article class="eventlist-event">
        <h2 class="eventlist-title">Blues Jam w/ The Rhythm Kings</h2>
        <time class="event-date" datetime="2025-03-08">Saturday, March 8, 2025</time>
        <span class="event-time">8:30 pm</span>
        <img src="/images/rhythm-kings.jpg">
      </article>
      <div class="event-item">
        <h3>Honky Tonk Tuesday</h3>
        <p>Tuesday, March 11 - music at 7pm</p>
      </div>
      <div class="event-item">
        <p>Untitled happening 3/12/2025</p>
      </div>
      <div class="event-item">
        <h3>Last Week's Show</h3>
        <p>3/1/2025</p>
      </div>
    </body></html>
    "#;

    #[test]
    fn parses_event_blocks() {
        let config = AppConfig::default();
        let ctx = ParseContext {
            today: NaiveDate::from_ymd_opt(2025, 3, 5).expect("date"),
            config: &config,
        };
        let events = SmokeyJoes.parse(SAMPLE_HTML, &ctx).expect("parse html");
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Blues Jam w/ The Rhythm Kings", "Honky Tonk Tuesday"]);

        let first = &events[0];
        assert_eq!(first.date, "2025-03-08");
        assert_eq!(first.time.as_deref(), Some("8:30 PM"));
        assert_eq!(first.id, "sj-blues-jam-w-the-rhythm-kings-2025-03-08");
        assert_eq!(first.ticket_url.as_deref(), Some("https://smokeyjoes.cafe"));
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://www.smokeyjoes.cafe/images/rhythm-kings.jpg")
        );
        assert_eq!(first.match_score, 95);
        assert_eq!(first.genres, vec!["Music".to_string(), "Live".to_string()]);

        let second = &events[1];
        assert_eq!(second.date, "2025-03-11");
        assert_eq!(second.time.as_deref(), Some("7:00 PM"));
    }
}
