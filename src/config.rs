use std::{fs, path::PathBuf, sync::Mutex};

use serde::{Deserialize, Serialize};

use crate::utils;

/// `{keyword, source}` exclusion. `source` is an adapter id or `all`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordRule {
    pub keyword: String,
    #[serde(default = "all_sources")]
    pub source: String,
}

impl KeywordRule {
    pub fn new(keyword: &str, source: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            source: source.to_string(),
        }
    }

    pub fn applies_to(&self, source: &str) -> bool {
        self.source.eq_ignore_ascii_case("all") || self.source == source
    }
}

fn all_sources() -> String {
    "all".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Substitution {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ticketmaster_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub bind_address: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    /// Per-client cap on `/api/youtube` calls.
    pub youtube_requests_per_hour: u32,
    pub preferred_venues: Vec<String>,
    pub video_venues: Vec<String>,
    pub keyword_exclusions: Vec<KeywordRule>,
    pub excluded_genres: Vec<String>,
    pub hidden_genre_labels: Vec<String>,
    pub substitutions: Vec<Substitution>,
    pub disabled_sources: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ticketmaster_api_key: None,
            youtube_api_key: None,
            bind_address: "127.0.0.1:3000".to_string(),
            http_timeout_secs: 20,
            user_agent: "clt-show/0.1 (+https://clt.show)".to_string(),
            youtube_requests_per_hour: 50,
            preferred_venues: to_strings(&["smokey", "snug", "neighborhood"]),
            video_venues: to_strings(&[
                "neighborhood theater",
                "visulite",
                "smokey joe",
                "knight theater",
            ]),
            keyword_exclusions: vec![KeywordRule::new("parking", "ticketmaster")],
            excluded_genres: Vec::new(),
            hidden_genre_labels: to_strings(&["undefined", "other", "miscellaneous"]),
            substitutions: vec![
                Substitution {
                    pattern: "cltfc".to_string(),
                    replacement: "Charlotte FC".to_string(),
                },
                Substitution {
                    pattern: "clt fc".to_string(),
                    replacement: "Charlotte FC".to_string(),
                },
            ],
            // The Comet Grill site has been serving stale pages.
            disabled_sources: to_strings(&["comet-grill"]),
        }
    }
}

impl AppConfig {
    pub fn is_preferred_venue(&self, venue: &str) -> bool {
        let venue = venue.to_lowercase();
        self.preferred_venues
            .iter()
            .any(|keyword| venue.contains(&keyword.to_lowercase()))
    }

    pub fn is_video_venue(&self, venue: &str) -> bool {
        let venue = venue.to_lowercase();
        self.video_venues
            .iter()
            .any(|keyword| venue.contains(&keyword.to_lowercase()))
    }

    pub fn source_enabled(&self, id: &str) -> bool {
        !self.disabled_sources.iter().any(|disabled| disabled == id)
    }

}

/// Values taken from the environment at startup. They overlay the file
/// settings on every read and are never written back to disk.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub ticketmaster_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub bind_address: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            ticketmaster_api_key: env_value("TICKETMASTER_API_KEY"),
            youtube_api_key: env_value("YOUTUBE_API_KEY"),
            bind_address: env_value("CLT_SHOW_BIND"),
        }
    }

    fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(key) = &self.ticketmaster_api_key {
            config.ticketmaster_api_key = Some(key.clone());
        }
        if let Some(key) = &self.youtube_api_key {
            config.youtube_api_key = Some(key.clone());
        }
        if let Some(bind) = &self.bind_address {
            config.bind_address = bind.clone();
        }
        config
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<AppConfig>,
    overrides: EnvOverrides,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::open(utils::config_path(), EnvOverrides::from_env())
    }

    pub fn open(path: PathBuf, overrides: EnvOverrides) -> Self {
        let data = match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("ignoring unreadable config {:?}: {err}", path);
                AppConfig::default()
            }
        };
        Self {
            path,
            data: Mutex::new(data),
            overrides,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// File settings with the environment laid over them.
    pub fn read(&self) -> AppConfig {
        let stored = self.data.lock().expect("config mutex poisoned").clone();
        self.overrides.apply(stored)
    }

    /// Changes and persists the file settings only; environment values
    /// stay out of the written file.
    pub fn update<F>(&self, transform: F) -> Result<AppConfig, String>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| "config mutex poisoned".to_string())?;
        transform(&mut guard);
        write_config(&self.path, &guard)?;
        Ok(self.overrides.apply(guard.clone()))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn read_config(path: &PathBuf) -> Result<AppConfig, String> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| err.to_string())
}

fn write_config(path: &PathBuf, config: &AppConfig) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            return Err(err.to_string());
        }
    }
    let contents = serde_json::to_string_pretty(config).map_err(|err| err.to_string())?;
    fs::write(path, contents).map_err(|err| err.to_string())
}
