use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::base;
use super::{EventSource, ParseContext, SourceError};
use crate::models::{NormalizedEvent, SourceType};
use crate::utils;

const URL: &str = "https://eternallygratefulmusic.com/live-shows";
const SOURCE_ID: &str = "eternally-grateful";
const SOURCE_NAME: &str = "Eternally Grateful";
const DEFAULT_CITY: &str = "Charlotte";
const TRACKED_ARTIST_SCORE: u32 = 95;
const GENRES: [&str; 3] = ["Grateful Dead", "Americana", "Jam Band"];

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr.border-accent").expect("eg row selector"));
static DATE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td.event-date span.date").expect("eg date"));
static START_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time.from span.time").expect("eg start"));
static END_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time.to span.time").expect("eg end"));
static NAME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td.event-name span.text").expect("eg name"));
static LOCATION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td.event-location span.text").expect("eg location"));

/// Bandzoogle calendar for a tracked artist; every row is one of their gigs.
pub struct EternallyGrateful;

impl EventSource for EternallyGrateful {
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
        Some(SourceType::Artist)
    }

    fn parse(&self, raw: &str, ctx: &ParseContext<'_>) -> Result<Vec<NormalizedEvent>, SourceError> {
        let document = Html::parse_document(raw);
        let mut events = Vec::new();
        let mut row_count = 0;

        for row in document.select(&ROW_SELECTOR) {
            row_count += 1;
            match parse_row(&row, ctx) {
                Some(event) if base::is_upcoming(&event.date, ctx.today) => events.push(event),
                Some(_) => {}
                None => debug!(source = SOURCE_ID, row = row_count, "skipping incomplete row"),
            }
        }

        debug!(source = SOURCE_ID, row_count, parsed = events.len(), "calendar parsed");
        Ok(events)
    }
}

fn parse_row(row: &ElementRef<'_>, ctx: &ParseContext<'_>) -> Option<NormalizedEvent> {
    let date_text = base::first_text(row, &DATE_SELECTOR)?;
    let name = base::first_text(row, &NAME_SELECTOR)?;
    let location = base::first_text(row, &LOCATION_SELECTOR)?;
    let date = utils::iso_date(base::parse_date_text(&date_text, ctx.today)?);

    let time = base::first_text(row, &START_SELECTOR);
    let end_time = base::first_text(row, &END_SELECTOR);
    let (venue, city) = split_location(&location);
    let description = match end_time {
        Some(end) => format!("{name} at {venue} (until {end})"),
        None => format!("{name} at {venue}"),
    };

    Some(NormalizedEvent {
        id: base::event_id("eg", &name, &date),
        name,
        date,
        time,
        venue_address: Some(city.clone()),
        venue,
        city: Some(city),
        description: Some(description),
        price: 0.0,
        ticket_url: None,
        image_url: None,
        genres: GENRES.iter().map(|g| g.to_string()).collect(),
        source: SOURCE_ID.to_string(),
        source_type: Some(SourceType::Artist),
        match_score: TRACKED_ARTIST_SCORE,
        youtube_links: None,
    })
}

/// `"Thomas Street Tavern, Charlotte"` -> venue and city.
fn split_location(text: &str) -> (String, String) {
    let mut parts = text.split(',').map(str::trim);
    let venue = parts
        .next()
        .filter(|part| !part.is_empty())
        .unwrap_or(text)
        .to_string();
    let city = parts
        .next()
        .filter(|part| !part.is_empty())
        .unwrap_or(DEFAULT_CITY)
        .to_string();
    (venue, city)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use chrono::NaiveDate;

    const SAMPLE_HTML: &str = r##"
    <table class="events-table">
      <tbody>
        <tr class="border-accent">
          <td class="event-date"><span class="weekday">Wed</span> <span class="date">Wednesday, October 8</span></td>
          <td class="event-time">
            <time class="from"><span class="time">7:00 PM</span></time>
            <time class="to"><span class="time">10:00 PM</span></time>
          </td>
          <td class="event-name"><a href="#"><span class="text">Dead Night &amp; Friends</span></a></td>
          <td class="event-location"><span class="text location">Thomas Street Tavern, Charlotte</span></td>
        </tr>
        <tr class="border-accent">
          <td class="event-date"><span class="date">Friday, October 17</span></td>
          <td class="event-name"><span class="text">Brewery Set</span></td>
          <td class="event-location"><span class="text">Salud Cerveceria</span></td>
        </tr>
        <tr class="border-accent">
          <td class="event-date"><span class="date">Someday</span></td>
          <td class="event-name"><span class="text">Unparseable</span></td>
          <td class="event-location"><span class="text">Nowhere</span></td>
        </tr>
        <tr class="border-accent">
          <td class="event-date"><span class="date">Saturday, October 18</span></td>
          <td class="event-name"><span class="text">No Location</span></td>
        </tr>
      </tbody>
    </table>
    "##;

    #[test]
    fn parses_bandzoogle_rows() {
        let config = AppConfig::default();
        let ctx = ParseContext {
            today: NaiveDate::from_ymd_opt(2025, 10, 1).expect("date"),
            config: &config,
        };
        let events = EternallyGrateful.parse(SAMPLE_HTML, &ctx).expect("parse html");
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.name, "Dead Night & Friends");
        assert_eq!(first.date, "2025-10-08");
        assert_eq!(first.time.as_deref(), Some("7:00 PM"));
        assert_eq!(first.venue, "Thomas Street Tavern");
        assert_eq!(first.city.as_deref(), Some("Charlotte"));
        assert_eq!(first.source_type, Some(SourceType::Artist));
        assert_eq!(first.match_score, 95);
        assert_eq!(first.genres.len(), 3);

        let second = &events[1];
        assert_eq!(second.venue, "Salud Cerveceria");
        assert_eq!(second.city.as_deref(), Some("Charlotte"));
        assert_eq!(second.date, "2025-10-17");
    }

    #[test]
    fn yearless_dates_before_today_move_to_next_year() {
        let config = AppConfig::default();
        let ctx = ParseContext {
            today: NaiveDate::from_ymd_opt(2025, 10, 10).expect("date"),
            config: &config,
        };
        let events = EternallyGrateful.parse(SAMPLE_HTML, &ctx).expect("parse html");
        assert_eq!(events[0].date, "2026-10-08");
    }
}
