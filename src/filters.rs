use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::models::{GroupedEvent, NormalizedEvent};
use crate::normalize;
use crate::utils;

const VENUE_BOOST: u32 = 10;
const FOOD_KEYWORDS: [&str; 3] = ["food", "wine", "beer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    All,
    Favorites,
    Divebars,
    Music,
    Sports,
    Food,
    Hidden,
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "favorites" => Ok(Self::Favorites),
            "divebars" => Ok(Self::Divebars),
            "music" => Ok(Self::Music),
            "sports" => Ok(Self::Sports),
            "food" => Ok(Self::Food),
            "hidden" => Ok(Self::Hidden),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::All => "all",
            Self::Favorites => "favorites",
            Self::Divebars => "divebars",
            Self::Music => "music",
            Self::Sports => "sports",
            Self::Food => "food",
            Self::Hidden => "hidden",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Date,
    Score,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "" | "date" => Ok(Self::Date),
            // Older clients send `match`.
            "score" | "match" => Ok(Self::Score),
            other => Err(format!("unknown sort mode: {other}")),
        }
    }
}

/// Viewer-side selections. The filter engine only reads it.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub category: Category,
    pub genres: HashSet<String>,
    pub sources: HashSet<String>,
    pub sort: SortMode,
    pub favorites: HashSet<String>,
    pub hidden: HashSet<String>,
}

impl FilterState {
    fn hidden_keys(&self) -> HashSet<String> {
        self.hidden
            .iter()
            .map(|name| normalize::grouping_key(name))
            .collect()
    }
}

/// Turns raw listings into the final, ordered feed for one filter state.
/// Every rule looks at a single listing; grouping happens only afterwards,
/// so a multi-date card carries just the dates that passed.
pub fn apply_filters(
    events: Vec<NormalizedEvent>,
    state: &FilterState,
    config: &AppConfig,
    today: NaiveDate,
) -> Vec<GroupedEvent> {
    let today = utils::iso_date(today);
    let hidden = state.hidden_keys();

    let kept: Vec<NormalizedEvent> = events
        .into_iter()
        .filter(|event| event.date.as_str() >= today.as_str())
        .filter(|event| !is_keyword_excluded(event, config))
        .filter(|event| !is_genre_excluded(event, config))
        .filter(|event| matches_category(event, state, config, &hidden))
        .filter(|event| matches_genres(event, &state.genres))
        .filter(|event| state.sources.is_empty() || state.sources.contains(&event.source))
        .collect();

    let mut grouped = normalize::group_events(kept);
    sort_events(&mut grouped, state.sort, config);
    grouped
}

fn is_keyword_excluded(event: &NormalizedEvent, config: &AppConfig) -> bool {
    let text = format!(
        "{} {}",
        event.name,
        event.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    config.keyword_exclusions.iter().any(|rule| {
        !rule.keyword.trim().is_empty()
            && rule.applies_to(&event.source)
            && text.contains(&rule.keyword.to_lowercase())
    })
}

fn is_genre_excluded(event: &NormalizedEvent, config: &AppConfig) -> bool {
    if event.genres.is_empty() || config.excluded_genres.is_empty() {
        return false;
    }
    event.genres.iter().all(|genre| {
        config
            .excluded_genres
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(genre))
    })
}

fn matches_category(
    event: &NormalizedEvent,
    state: &FilterState,
    config: &AppConfig,
    hidden: &HashSet<String>,
) -> bool {
    let is_hidden = hidden.contains(&normalize::grouping_key(&event.name));
    match state.category {
        Category::All => !is_hidden,
        Category::Favorites => state.favorites.contains(&event.id),
        Category::Divebars => config.is_preferred_venue(&event.venue),
        Category::Music => !event.genres.is_empty() && !is_hidden,
        Category::Sports => event.genres.is_empty() && !is_hidden,
        Category::Food => {
            let name = event.name.to_lowercase();
            FOOD_KEYWORDS.iter().any(|keyword| name.contains(keyword))
        }
        Category::Hidden => is_hidden,
    }
}

fn matches_genres(event: &NormalizedEvent, selected: &HashSet<String>) -> bool {
    selected.is_empty() || event.genres.iter().any(|genre| selected.contains(genre))
}

pub fn boosted_score(event: &GroupedEvent, config: &AppConfig) -> u32 {
    let boost = if config.is_preferred_venue(&event.event.venue) {
        VENUE_BOOST
    } else {
        0
    };
    event.event.match_score + boost
}

fn sort_events(events: &mut [GroupedEvent], mode: SortMode, config: &AppConfig) {
    match mode {
        SortMode::Date => events.sort_by(|a, b| {
            a.first_date()
                .cmp(b.first_date())
                .then_with(|| boosted_score(b, config).cmp(&boosted_score(a, config)))
        }),
        SortMode::Score => {
            events.sort_by(|a, b| boosted_score(b, config).cmp(&boosted_score(a, config)))
        }
    }
}

/// Sorted, de-duplicated genre labels for a genre picker, minus filler
/// labels such as "Undefined".
pub fn available_genres(events: &[NormalizedEvent], hidden_labels: &[String]) -> Vec<String> {
    let hidden: Vec<String> = hidden_labels.iter().map(|label| label.to_lowercase()).collect();
    events
        .iter()
        .flat_map(|event| event.genres.iter())
        .filter(|genre| {
            let lower = genre.to_lowercase();
            !hidden.iter().any(|label| lower.contains(label.as_str()))
        })
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordRule;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 1).expect("date")
    }

    fn single(id: &str, name: &str, date: &str, venue: &str, score: u32) -> NormalizedEvent {
        NormalizedEvent {
            id: id.to_string(),
            name: name.to_string(),
            date: date.to_string(),
            venue: venue.to_string(),
            source: "ticketmaster".to_string(),
            match_score: score,
            genres: vec!["Rock".to_string()],
            ..Default::default()
        }
    }

    fn ids(events: &[GroupedEvent]) -> Vec<&str> {
        events.iter().map(|e| e.event.id.as_str()).collect()
    }

    fn dates(event: &GroupedEvent) -> Vec<&str> {
        event.dates.iter().map(|d| d.date.as_str()).collect()
    }

    #[test]
    fn preferred_venue_wins_date_ties() {
        let config = AppConfig::default();
        let events = vec![
            single("other", "Arena Show", "2024-12-10", "Spectrum Center", 8),
            single("dive", "Dive Show", "2024-12-10", "Snug Harbor", 3),
            single("early", "Early Show", "2024-12-05", "Spectrum Center", 1),
        ];
        let sorted = apply_filters(events, &FilterState::default(), &config, today());
        assert_eq!(ids(&sorted), vec!["early", "dive", "other"]);
    }

    #[test]
    fn score_sort_uses_boosted_score() {
        let config = AppConfig::default();
        let events = vec![
            single("a", "A", "2024-12-02", "Spectrum Center", 80),
            single("b", "B", "2024-12-20", "Smokey Joe's Cafe", 75),
            single("c", "C", "2024-12-03", "Ovens Auditorium", 84),
        ];
        let state = FilterState {
            sort: SortMode::Score,
            ..Default::default()
        };
        let sorted = apply_filters(events, &state, &config, today());
        assert_eq!(ids(&sorted), vec!["b", "c", "a"]);
    }

    #[test]
    fn all_and_hidden_partition_upcoming_events() {
        let config = AppConfig::default();
        let events = vec![
            single("1", "Concert (Night 1)", "2024-12-10", "Visulite", 70),
            single("2", "Another Band - World Tour", "2024-12-11", "Visulite", 70),
            single("3", "Quiet Night", "2024-12-12", "Visulite", 70),
            single("4", "Ancient History", "2020-01-01", "Visulite", 70),
        ];
        let hidden: HashSet<String> = ["Concert (Night 2)", "another band"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let all = FilterState {
            hidden: hidden.clone(),
            ..Default::default()
        };
        let hidden_state = FilterState {
            category: Category::Hidden,
            hidden,
            ..Default::default()
        };
        let visible = apply_filters(events.clone(), &all, &config, today());
        let hidden = apply_filters(events, &hidden_state, &config, today());

        assert_eq!(ids(&visible), vec!["3"]);
        let mut hidden_ids = ids(&hidden);
        hidden_ids.sort();
        assert_eq!(hidden_ids, vec!["1", "2"]);
    }

    #[test]
    fn keyword_rules_respect_source_scope() {
        let mut config = AppConfig::default();
        config.keyword_exclusions = vec![KeywordRule::new("wrestling", "ticketmaster")];

        let tm = single("tm", "Wrestling Night", "2024-12-10", "Bojangles Coliseum", 70);
        let mut clt = single("clt", "Wrestling Night", "2024-12-11", "CLTtoday Article", 60);
        clt.source = "clttoday".to_string();

        let kept = apply_filters(vec![tm, clt], &FilterState::default(), &config, today());
        assert_eq!(ids(&kept), vec!["clt"]);
        assert_eq!(dates(&kept[0]), vec!["2024-12-11"]);
    }

    #[test]
    fn keyword_matches_description_too() {
        let config = AppConfig::default();
        let mut lot = single("lot", "Game Day", "2024-12-10", "Bank of America Stadium", 70);
        lot.description = Some("Official PARKING pass".to_string());
        let kept = apply_filters(vec![lot], &FilterState::default(), &config, today());
        assert!(kept.is_empty());
    }

    #[test]
    fn past_occurrences_are_dropped_before_grouping() {
        let config = AppConfig::default();
        let past = single("past", "Old Show", "2020-01-01", "Visulite", 90);
        let old_night = single("res-1", "Residency", "2020-01-01", "Visulite", 90);
        let new_night = single("res-2", "Residency (Night 2)", "2024-12-20", "Visulite", 90);
        let soon = single("soon", "Soon", "2024-12-05", "Visulite", 90);

        for category in [Category::All, Category::Music, Category::Favorites, Category::Hidden] {
            let state = FilterState {
                category,
                favorites: ["past".to_string(), "res-1".to_string()].into_iter().collect(),
                hidden: ["old show".to_string(), "residency".to_string()].into_iter().collect(),
                ..Default::default()
            };
            let events = vec![past.clone(), old_night.clone(), new_night.clone()];
            let kept = apply_filters(events, &state, &config, today());
            assert!(kept.iter().all(|e| e.event.id != "past"), "{category}");
            assert!(kept.iter().all(|e| e.first_date() >= "2024-12-01"), "{category}");
        }

        let kept = apply_filters(
            vec![old_night, new_night, soon],
            &FilterState::default(),
            &config,
            today(),
        );
        assert_eq!(ids(&kept), vec!["soon", "res-2"]);
        assert_eq!(dates(&kept[1]), vec!["2024-12-20"]);
    }

    #[test]
    fn source_filter_keeps_matching_occurrences_of_a_shared_show() {
        let config = AppConfig::default();
        let tm = single("tm", "Jazz Night", "2024-12-10", "Blumenthal", 70);
        let mut clt = single("clt", "Jazz Night", "2024-12-12", "CLTtoday Article", 60);
        clt.source = "clttoday".to_string();

        let state = FilterState {
            sources: ["clttoday".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let kept = apply_filters(vec![tm.clone(), clt.clone()], &state, &config, today());
        assert_eq!(ids(&kept), vec!["clt"]);
        assert_eq!(dates(&kept[0]), vec!["2024-12-12"]);

        let both = apply_filters(vec![tm, clt], &FilterState::default(), &config, today());
        assert_eq!(ids(&both), vec!["tm"]);
        assert_eq!(dates(&both[0]), vec!["2024-12-10", "2024-12-12"]);
    }

    #[test]
    fn genre_filters() {
        let mut config = AppConfig::default();
        config.excluded_genres = vec!["comedy".to_string()];

        let mut standup = single("standup", "Standup", "2024-12-10", "The Comedy Zone", 70);
        standup.genres = vec!["Comedy".to_string()];
        let mut mixed = single("mixed", "Musical Comedy", "2024-12-10", "Knight Theater", 70);
        mixed.genres = vec!["Comedy".to_string(), "Music".to_string()];
        let mut game = single("game", "Hornets", "2024-12-10", "Spectrum Center", 70);
        game.genres.clear();
        let rock = single("rock", "Rock Show", "2024-12-10", "Visulite", 70);

        let events = vec![standup, mixed, game, rock];
        let kept = apply_filters(events.clone(), &FilterState::default(), &config, today());
        let mut kept_ids = ids(&kept);
        kept_ids.sort();
        assert_eq!(kept_ids, vec!["game", "mixed", "rock"]);

        let state = FilterState {
            genres: ["Music".to_string(), "Rock".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let mut picked = ids(&apply_filters(events.clone(), &state, &config, today()))
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        picked.sort();
        assert_eq!(picked, vec!["mixed", "rock"]);

        let sports = FilterState {
            category: Category::Sports,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(events, &sports, &config, today())), vec!["game"]);
    }

    #[test]
    fn category_and_source_selection() {
        let config = AppConfig::default();
        let dive = single("dive", "Punk Night", "2024-12-10", "Snug Harbor", 70);
        let mut beer = single("beer", "Winter Beer Fest", "2024-12-11", "Camp North End", 70);
        beer.source = "clttoday".to_string();

        let divebars = FilterState {
            category: Category::Divebars,
            ..Default::default()
        };
        assert_eq!(
            ids(&apply_filters(vec![dive.clone(), beer.clone()], &divebars, &config, today())),
            vec!["dive"]
        );

        let food = FilterState {
            category: Category::Food,
            ..Default::default()
        };
        assert_eq!(
            ids(&apply_filters(vec![dive.clone(), beer.clone()], &food, &config, today())),
            vec!["beer"]
        );

        let sources = FilterState {
            sources: ["clttoday".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            ids(&apply_filters(vec![dive, beer], &sources, &config, today())),
            vec!["beer"]
        );
    }

    #[test]
    fn genre_list_drops_filler_labels() {
        let mut a = single("a", "A", "2024-12-10", "Visulite", 70);
        a.genres = vec!["Rock".to_string(), "Undefined".to_string(), "Jazz".to_string()];
        let mut b = single("b", "B", "2024-12-10", "Visulite", 70);
        b.genres = vec!["Rock".to_string(), "Other Stuff".to_string(), "Blues".to_string()];

        let labels = AppConfig::default().hidden_genre_labels;
        assert_eq!(available_genres(&[a, b], &labels), vec!["Blues", "Jazz", "Rock"]);
    }

    #[test]
    fn parses_category_and_sort_names() {
        assert_eq!("Hidden".parse::<Category>(), Ok(Category::Hidden));
        assert_eq!("".parse::<Category>(), Ok(Category::All));
        assert!("concerts".parse::<Category>().is_err());
        assert_eq!("match".parse::<SortMode>(), Ok(SortMode::Score));
    }
}
