use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use clt_show_lib::config::ConfigStore;
use clt_show_lib::filters::{Category, FilterState, SortMode};
use clt_show_lib::server::{self, AppState};
use clt_show_lib::videos::VideoLookup;
use clt_show_lib::{calendar, normalize, scraping};

/// Charlotte live-music listings, merged from every known source
#[derive(Parser, Debug)]
#[command(name = "clt-show")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (defaults to the configured bind address)
        #[arg(long, env = "CLT_SHOW_BIND")]
        bind: Option<String>,
    },
    /// List registered sources
    Sources,
    /// Scrape one source and print its events as JSON
    Scrape { id: String },
    /// Print the merged, filtered feed
    Feed {
        #[arg(long, default_value = "all")]
        category: Category,
        /// Genre to include; repeat for several
        #[arg(long = "genre")]
        genres: Vec<String>,
        /// Source id to include; repeat for several
        #[arg(long = "source")]
        sources: Vec<String>,
        #[arg(long, default_value = "date")]
        sort: SortMode,
        #[arg(long)]
        json: bool,
    },
    /// Print an iCalendar file for the named event
    Calendar { name: String },
    /// Show the config file location, or write the current settings to it
    Config {
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    clt_show_lib::init_tracing();
    let args = Args::parse();
    let store = ConfigStore::load();

    match args.command {
        Command::Serve { bind } => {
            let config = store.read();
            let bind = bind.unwrap_or_else(|| config.bind_address.clone());
            info!("Starting clt-show v{}", env!("CARGO_PKG_VERSION"));
            server::serve(AppState::new(config), &bind).await?;
        }
        Command::Sources => {
            for source in scraping::list_sources(&store.read()) {
                let status = if source.enabled { "" } else { " (disabled)" };
                println!("{:<20} {}{}  {}", source.id, source.name, status, source.url);
            }
        }
        Command::Scrape { id } => {
            let result = scraping::run_single(&id, &store.read())
                .await
                .with_context(|| format!("scrape of {id} failed"))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Feed {
            category,
            genres,
            sources,
            sort,
            json,
        } => {
            let config = Arc::new(store.read());
            let lookup = VideoLookup::new();
            let snapshot = clt_show_lib::collect(Arc::clone(&config), &lookup).await;
            let state = FilterState {
                category,
                genres: genres.into_iter().collect(),
                sources: sources.into_iter().collect(),
                sort,
                favorites: HashSet::new(),
                hidden: HashSet::new(),
            };
            let feed = clt_show_lib::build_feed(&snapshot, &state, &config);
            if json {
                println!("{}", serde_json::to_string_pretty(&feed)?);
            } else {
                for event in &feed.events {
                    let more = match event.dates.len() {
                        0 | 1 => String::new(),
                        n => format!(" (+{} dates)", n - 1),
                    };
                    println!(
                        "{}  {:>3}  {} @ {}{}",
                        event.first_date(),
                        event.event.match_score,
                        event.event.name,
                        event.event.venue,
                        more
                    );
                }
                if !feed.failed_sources.is_empty() {
                    eprintln!("failed sources: {}", feed.failed_sources.join(", "));
                }
            }
        }
        Command::Calendar { name } => {
            let config = Arc::new(store.read());
            let lookup = VideoLookup::new();
            let snapshot = clt_show_lib::collect(config, &lookup).await;
            let key = normalize::grouping_key(&name);
            let event = snapshot
                .events
                .iter()
                .find(|event| normalize::grouping_key(&event.event.name) == key)
                .ok_or_else(|| anyhow!("no event named {name:?}"))?;
            match calendar::to_ics(event) {
                Some(ics) => print!("{ics}"),
                None => bail!("event {name:?} has no usable date"),
            }
        }
        Command::Config { init } => {
            if init {
                store
                    .update(|_| {})
                    .map_err(|err| anyhow!(err))
                    .context("failed to write config")?;
                println!("wrote {}", store.path().display());
            } else {
                println!("{}", store.path().display());
                println!("{}", serde_json::to_string_pretty(&redacted(store.read()))?);
            }
        }
    }

    Ok(())
}

fn redacted(mut config: clt_show_lib::config::AppConfig) -> clt_show_lib::config::AppConfig {
    let hide = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("********".to_string());
        }
    };
    hide(&mut config.ticketmaster_api_key);
    hide(&mut config.youtube_api_key);
    config
}
