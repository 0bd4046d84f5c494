use std::collections::HashMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::AppConfig;
use crate::models::{GroupedEvent, NormalizedEvent, SourceResult};
use crate::substitutions;

static PARENTHETICAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)").expect("parenthetical regex"));
static SHOUTING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]{4,}").expect("caps regex"));

const TOUR_SEPARATOR: &str = " - ";

/// Display form shared by every occurrence of an event: parentheticals and
/// any `" - tour name"` suffix removed.
pub fn canonical_name(name: &str) -> String {
    let stripped = PARENTHETICAL_RE.replace_all(name, "");
    let stripped = stripped.trim();
    match stripped.find(TOUR_SEPARATOR) {
        Some(index) if index > 0 => stripped[..index].trim().to_string(),
        _ => stripped.to_string(),
    }
}

pub fn grouping_key(name: &str) -> String {
    canonical_name(name).to_lowercase()
}

/// Folds events with the same grouping key into one multi-date event. The
/// first occurrence supplies every scalar field.
pub fn group_events(events: Vec<NormalizedEvent>) -> Vec<GroupedEvent> {
    let singles = events
        .into_iter()
        .filter(is_well_formed)
        .map(GroupedEvent::from)
        .collect();
    merge_groups(singles)
}

/// Same fold over events that may already carry several dates.
pub fn merge_groups(groups: Vec<GroupedEvent>) -> Vec<GroupedEvent> {
    let mut merged: Vec<GroupedEvent> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for group in groups {
        let key = grouping_key(&group.event.name);
        match index.get(&key) {
            Some(&slot) => {
                let target = &mut merged[slot];
                for date in group.dates {
                    if !target.dates.iter().any(|existing| existing.date == date.date) {
                        target.dates.push(date);
                    }
                }
            }
            None => {
                let mut group = group;
                group.event.name = canonical_name(&group.event.name);
                index.insert(key, merged.len());
                merged.push(group);
            }
        }
    }

    for group in &mut merged {
        group.dates.sort_by(|a, b| a.date.cmp(&b.date));
    }
    merged
}

/// Every successful adapter's events with substitutions applied and
/// shouting names title-cased. No grouping yet.
pub fn clean_events(results: &[SourceResult], config: &AppConfig) -> Vec<NormalizedEvent> {
    results
        .iter()
        .filter(|result| result.is_ok())
        .flat_map(|result| result.events.iter().cloned())
        .map(|event| {
            let mut event = substitutions::apply_event_substitutions(event, &config.substitutions);
            event.name = to_title_case(&event.name);
            event
        })
        .collect()
}

/// Concatenates every successful adapter run, cleans up names and groups.
pub fn merge_and_group(results: &[SourceResult], config: &AppConfig) -> Vec<GroupedEvent> {
    let events = clean_events(results, config);
    let input = events.len();
    let grouped = group_events(events);
    debug!(input, grouped = grouped.len(), "merged source results");
    grouped
}

fn is_well_formed(event: &NormalizedEvent) -> bool {
    if event.name.trim().is_empty() {
        debug!(id = %event.id, "dropping event without a name");
        return false;
    }
    if NaiveDate::parse_from_str(&event.date, "%Y-%m-%d").is_err() {
        debug!(id = %event.id, date = %event.date, "dropping event with unparseable date");
        return false;
    }
    true
}

/// False when the description only repeats the name or the venue.
pub fn has_useful_description(event: &NormalizedEvent) -> bool {
    let Some(description) = event.description.as_deref() else {
        return false;
    };
    let description = description.trim().to_lowercase();
    if description.is_empty() {
        return false;
    }
    let name = PARENTHETICAL_RE
        .replace_all(&event.name, "")
        .trim()
        .to_lowercase();
    let venue = event.venue.trim().to_lowercase();

    if description == name || description == venue {
        return false;
    }
    !(description.contains(&venue) && description.len() < venue.len() + 20)
}

/// `"THE ROLLING STONES"` -> `"The Rolling Stones"`. Names without a run of
/// four capitals are returned as is.
pub fn to_title_case(input: &str) -> String {
    if !SHOUTING_RE.is_match(input) {
        return input.to_string();
    }
    let mut output = String::with_capacity(input.len());
    let mut previous_is_word = false;
    for ch in input.to_lowercase().chars() {
        let is_word = ch.is_alphanumeric() || ch == '_';
        if is_word && !previous_is_word {
            output.extend(ch.to_uppercase());
        } else {
            output.push(ch);
        }
        previous_is_word = is_word;
    }
    output
}
