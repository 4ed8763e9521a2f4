use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::adapters::Registry;
use crate::domain::{GeoCandidate, Settings, SettingsUpdate, StatusRecord, TrackedCity};

/// Multi-city weather watcher
#[derive(Parser, Debug)]
#[command(name = "climawatch", version, about)]
pub struct Cli {
    /// Directory holding the registry and per-city data (overrides CLIMAWATCH_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Show settings and tracked cities
    List,
    /// List geocoding candidates for a place
    Search {
        query: String,
        /// ISO 3166-1 alpha-2 filter, e.g. ES
        #[arg(long)]
        country: Option<String>,
    },
    /// Track a city; prints the candidates and adds the one at --pick
    Add {
        query: String,
        #[arg(long)]
        country: Option<String>,
        #[arg(long, default_value_t = 0)]
        pick: usize,
        /// Timezone for this city only; defaults to the global setting
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Stop tracking a city, by id or by list index
    Remove { id_or_index: String },
    /// Refresh all cities in a loop, or once
    Run {
        #[arg(long)]
        once: bool,
        /// Seconds between cycles instead of the persisted interval
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Serve the dashboard with the refresher in the background
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show or update settings
    Settings(SettingsArgs),
    /// Print the Markdown report of a city
    Report { id: String },
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve { port: None }
    }
}

#[derive(Args, Debug, Default, PartialEq)]
pub struct SettingsArgs {
    #[arg(long)]
    pub interval_seconds: Option<i64>,
    #[arg(long)]
    pub forecast_hours: Option<i64>,
    #[arg(long)]
    pub timezone: Option<String>,
    #[arg(long)]
    pub snapshot_retention: Option<i64>,
}

impl From<SettingsArgs> for SettingsUpdate {
    fn from(args: SettingsArgs) -> Self {
        SettingsUpdate {
            interval_seconds: args.interval_seconds,
            forecast_hours: args.forecast_hours,
            timezone: args.timezone,
            snapshot_retention: args.snapshot_retention,
        }
    }
}

pub fn format_settings(settings: &Settings) -> String {
    format!(
        "interval={}s  forecast_hours={}  timezone={}  snapshot_retention={}",
        settings.interval_seconds, settings.forecast_hours, settings.timezone, settings.snapshot_retention
    )
}

pub fn format_candidates(candidates: &[GeoCandidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "[{}] {}  ({:.4}, {:.4})  tz={}",
                i,
                c.label(),
                c.latitude,
                c.longitude,
                c.timezone.as_deref().unwrap_or("?")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_city(index: usize, city: &TrackedCity, status: &StatusRecord) -> String {
    let state = if status.ok { "ok" } else { "--" };
    let updated = status
        .updated_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    let mut line = format!(
        "[{}] {}  {}  ({:.4}, {:.4})",
        index, city.id, city.label, city.latitude, city.longitude
    );
    if let Some(tz) = &city.timezone {
        line.push_str(&format!("  tz={}", tz));
    }
    line.push_str(&format!("\n    {} {} (updated {})", state, status.message, updated));
    line
}

/// `list` output; `status_of` looks up each city's last refresh outcome
pub fn format_registry(registry: &Registry, status_of: impl Fn(&TrackedCity) -> StatusRecord) -> String {
    let mut out = format!("Settings: {}\n", format_settings(&registry.settings));
    if registry.cities.is_empty() {
        out.push_str("No cities tracked.");
        return out;
    }
    let lines: Vec<String> = registry
        .cities
        .iter()
        .enumerate()
        .map(|(i, city)| format_city(i, city, &status_of(city)))
        .collect();
    out.push_str(&lines.join("\n"));
    out
}
