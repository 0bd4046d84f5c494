use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Venue,
    Artist,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Video {
    pub title: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub id: String, // unique within source, usually slug(prefix|name|date)
    pub name: String,
    pub date: String, // YYYY-MM-DD, no zone
    pub time: Option<String>,
    pub venue: String,
    pub venue_address: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub price: f64,
    pub ticket_url: Option<String>,
    pub image_url: Option<String>,
    pub genres: Vec<String>,
    pub source: String,
    pub source_type: Option<SourceType>,
    pub match_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_links: Option<Vec<Video>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventDate {
    pub date: String,
    pub id: String,
    pub ticket_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GroupedEvent {
    #[serde(flatten)]
    pub event: NormalizedEvent,
    pub dates: Vec<EventDate>,
}

impl GroupedEvent {
    pub fn first_date(&self) -> &str {
        self.dates
            .first()
            .map(|d| d.date.as_str())
            .unwrap_or(self.event.date.as_str())
    }
}

impl From<NormalizedEvent> for GroupedEvent {
    fn from(event: NormalizedEvent) -> Self {
        let dates = vec![EventDate {
            date: event.date.clone(),
            id: event.id.clone(),
            ticket_url: event.ticket_url.clone(),
        }];
        Self { event, dates }
    }
}

/// Outcome of one adapter run. A failed source carries an error and no events.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult {
    pub source: String,
    pub name: String,
    pub events: Vec<NormalizedEvent>,
    pub scraped_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
