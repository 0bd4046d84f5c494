use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::models::GroupedEvent;
use crate::utils::TIMEZONE;

const SHOW_LENGTH_HOURS: i64 = 3;
const LINE_LIMIT: usize = 75;
const TIME_FORMATS: [&str; 4] = ["%I:%M %p", "%I %p", "%H:%M:%S", "%H:%M"];

/// iCalendar file for the first date of a grouped event.
pub fn to_ics(event: &GroupedEvent) -> Option<String> {
    render(event, Utc::now())
}

fn render(event: &GroupedEvent, stamp: DateTime<Utc>) -> Option<String> {
    let first = event.dates.first()?;
    let day = NaiveDate::parse_from_str(&first.date, "%Y-%m-%d").ok()?;
    let start = start_of(day, event.event.time.as_deref())?;
    let end = start + Duration::hours(SHOW_LENGTH_HOURS);

    let description = event
        .event
        .description
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(&event.event.name);
    let url = event
        .event
        .ticket_url
        .as_deref()
        .or(first.ticket_url.as_deref())
        .unwrap_or_default();

    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//clt.show//events//EN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@clt.show", first.id),
        format!("DTSTAMP:{}", ics_time(stamp)),
        format!("DTSTART:{}", ics_time(start)),
        format!("DTEND:{}", ics_time(end)),
        format!("SUMMARY:{}", escape(&event.event.name)),
        format!("LOCATION:{}", escape(&location(event))),
        format!("DESCRIPTION:{}", escape(description)),
        format!("URL:{url}"),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];
    let folded: Vec<String> = lines.iter().map(|line| fold(line)).collect();
    Some(folded.join("\r\n") + "\r\n")
}

/// Listed clock time in Charlotte, or 8 PM when the listing has none.
fn start_of(day: NaiveDate, time: Option<&str>) -> Option<DateTime<Utc>> {
    let clock = time
        .map(str::trim)
        .and_then(|text| {
            TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(&text.to_uppercase(), fmt).ok())
        })
        .or_else(|| NaiveTime::from_hms_opt(20, 0, 0))?;
    let local = TIMEZONE
        .from_local_datetime(&NaiveDateTime::new(day, clock))
        .earliest()?;
    Some(local.with_timezone(&Utc))
}

fn location(event: &GroupedEvent) -> String {
    match event.event.venue_address.as_deref() {
        Some(address) if !address.contains(&event.event.venue) => {
            format!("{}, {}", event.event.venue, address)
        }
        _ => event.event.venue.clone(),
    }
}

fn ics_time(moment: DateTime<Utc>) -> String {
    moment.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Splits a content line into 75-octet pieces; continuation lines start
/// with a single space. Never splits inside a UTF-8 sequence.
fn fold(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + line.len() / LINE_LIMIT * 3);
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > LINE_LIMIT {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += len;
    }
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
