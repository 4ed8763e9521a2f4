use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub geocoding_url: String,
    pub forecast_url: String,
    pub geocoding_count: usize,
    pub geocoding_language: String,
    pub forecast_days: u32,
    pub ui_refresh_seconds: u64,
}

/// Optional TOML overlay, every key may be omitted
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    bind_address: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    log_level: Option<String>,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    geocoding_url: Option<String>,
    forecast_url: Option<String>,
    geocoding_count: Option<usize>,
    geocoding_language: Option<String>,
    forecast_days: Option<u32>,
    ui_refresh_seconds: Option<u64>,
}

impl Config {
    /// Defaults, then the TOML file named by `CLIMAWATCH_CONFIG`, then env vars.
    pub fn load() -> Result<Self, String> {
        let mut config = Self::defaults();
        if let Ok(path) = env::var("CLIMAWATCH_CONFIG") {
            config.merge_file(Path::new(&path))?;
        }
        config.apply_env();
        Ok(config)
    }

    pub(crate) fn defaults() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
            data_dir: PathBuf::from("clima_live"),
            log_level: "info".to_string(),
            request_timeout_secs: 20,
            user_agent: format!("climawatch/{}", env!("CARGO_PKG_VERSION")),
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            geocoding_count: 5,
            geocoding_language: "en".to_string(),
            forecast_days: 7,
            ui_refresh_seconds: 60,
        }
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config file {}: {}", path.display(), e))?;
        let file = parse_file_config(&raw)
            .map_err(|e| format!("invalid config file {}: {}", path.display(), e))?;

        if let Some(v) = file.bind_address {
            self.bind_address = v;
        }
        if let Some(v) = file.port {
            self.port = v;
        }
        if let Some(v) = file.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file.user_agent {
            self.user_agent = v;
        }
        if let Some(v) = file.geocoding_url {
            self.geocoding_url = v;
        }
        if let Some(v) = file.forecast_url {
            self.forecast_url = v;
        }
        if let Some(v) = file.geocoding_count {
            self.geocoding_count = v;
        }
        if let Some(v) = file.geocoding_language {
            self.geocoding_language = v;
        }
        if let Some(v) = file.forecast_days {
            self.forecast_days = v;
        }
        if let Some(v) = file.ui_refresh_seconds {
            self.ui_refresh_seconds = v;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_var("CLIMAWATCH_BIND") {
            self.bind_address = v;
        }
        if let Some(v) = env_parse("CLIMAWATCH_PORT") {
            self.port = v;
        }
        if let Some(v) = env_var("CLIMAWATCH_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("CLIMAWATCH_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = env_parse("CLIMAWATCH_REQUEST_TIMEOUT") {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env_var("CLIMAWATCH_USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = env_var("CLIMAWATCH_GEOCODING_URL") {
            self.geocoding_url = v;
        }
        if let Some(v) = env_var("CLIMAWATCH_FORECAST_URL") {
            self.forecast_url = v;
        }
        if let Some(v) = env_var("CLIMAWATCH_LANGUAGE") {
            self.geocoding_language = v;
        }
    }

    /// Path of the shared settings + registry document
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("cities.json")
    }
}

fn parse_file_config(raw: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(raw)
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
