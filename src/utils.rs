use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use dirs::config_dir;
use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Listings are for Charlotte, NC; "today" is the calendar date there.
pub const TIMEZONE: Tz = chrono_tz::America::New_York;

static CONFIG_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let base = config_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    base.join("clt-show")
});

pub fn config_root() -> PathBuf {
    CONFIG_ROOT.clone()
}

pub fn config_path() -> PathBuf {
    std::env::var("CLT_SHOW_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_root().join("config.json"))
}

pub fn today() -> NaiveDate {
    Utc::now().with_timezone(&TIMEZONE).date_naive()
}

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
