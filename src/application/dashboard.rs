use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use crate::adapters::{CityDataRepository, CityStore, SnapshotEntry};
use crate::domain::{weather_code, FetchRecord, Forecast, Settings, StatusRecord, TrackedCity, WeeklyStats, MAX_CITIES};
use crate::error::Result;
use crate::ports::CHART_FILES;

pub const DAILY_ROWS: usize = 7;
pub const HOURLY_ROWS: usize = 48;

/// A value with the unit the provider reported for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub value: Option<f64>,
    pub unit: String,
}

impl Reading {
    fn new(value: Option<f64>, unit: Option<&str>) -> Self {
        Self {
            value,
            unit: unit.unwrap_or_default().to_string(),
        }
    }

    /// "12.3°C", or "—" when absent
    pub fn display(&self) -> String {
        match self.value {
            Some(v) => format!("{}{}", trim_number(v), self.unit),
            None => "—".to_string(),
        }
    }
}

/// Whole numbers without a trailing ".0"
pub fn trim_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentSummary {
    pub time: Option<String>,
    pub temperature: Reading,
    pub apparent_temperature: Reading,
    pub humidity: Reading,
    pub precipitation: Reading,
    pub wind_speed: Reading,
    pub wind_direction: Reading,
    pub weather_code: Option<f64>,
    pub weather: String,
}

impl CurrentSummary {
    pub fn from_forecast(forecast: &Forecast) -> Option<Self> {
        if !forecast.has_current() {
            return None;
        }
        let reading = |field: &str| Reading::new(forecast.current_value(field), forecast.current_unit(field));
        let code = forecast.current_value("weather_code");

        Some(Self {
            time: forecast
                .as_value()
                .pointer("/current/time")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            temperature: reading("temperature_2m"),
            apparent_temperature: reading("apparent_temperature"),
            humidity: reading("relative_humidity_2m"),
            precipitation: reading("precipitation"),
            wind_speed: reading("wind_speed_10m"),
            wind_direction: reading("wind_direction_10m"),
            weather_code: code,
            weather: weather_code::describe(code),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow {
    pub day: String,
    pub tmin: Reading,
    pub tmax: Reading,
    pub pprob_max: Reading,
    pub precip_sum: Reading,
    pub weather: String,
}

/// First `DAILY_ROWS` days of the daily block
pub fn daily_rows(forecast: &Forecast) -> Vec<DailyRow> {
    let days = forecast.daily_times();
    let column = |field: &str| {
        let unit = forecast.daily_unit(field);
        forecast
            .daily_series(field)
            .into_iter()
            .map(move |v| Reading::new(v, unit))
            .collect::<Vec<_>>()
    };
    let (tmin, tmax) = (column("temperature_2m_min"), column("temperature_2m_max"));
    let (pprob, psum) = (column("precipitation_probability_max"), column("precipitation_sum"));
    let codes = forecast.daily_series("weather_code");

    days.iter()
        .take(DAILY_ROWS)
        .enumerate()
        .map(|(i, day)| DailyRow {
            day: day.to_string(),
            tmin: tmin[i].clone(),
            tmax: tmax[i].clone(),
            pprob_max: pprob[i].clone(),
            precip_sum: psum[i].clone(),
            weather: weather_code::describe(codes[i]),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRow {
    pub time: String,
    pub temperature: Reading,
    pub apparent_temperature: Reading,
    pub precipitation: Reading,
    pub precipitation_probability: Reading,
    pub wind_speed: Reading,
    pub wind_direction: Reading,
    pub weather: String,
}

/// First `HOURLY_ROWS` hours; a document without a time axis has none
pub fn hourly_rows(forecast: &Forecast) -> Vec<HourlyRow> {
    let Ok(times) = forecast.hourly_times() else {
        return Vec::new();
    };
    let column = |field: &str| {
        let unit = forecast.hourly_unit(field);
        forecast
            .hourly_series(field)
            .into_iter()
            .map(move |v| Reading::new(v, unit))
            .collect::<Vec<_>>()
    };
    let temp = column("temperature_2m");
    let feel = column("apparent_temperature");
    let prec = column("precipitation");
    let pprob = column("precipitation_probability");
    let wspd = column("wind_speed_10m");
    let wdir = column("wind_direction_10m");
    let codes = forecast.hourly_series("weather_code");

    times
        .iter()
        .take(HOURLY_ROWS)
        .enumerate()
        .map(|(i, time)| HourlyRow {
            time: time.to_string(),
            temperature: temp[i].clone(),
            apparent_temperature: feel[i].clone(),
            precipitation: prec[i].clone(),
            precipitation_probability: pprob[i].clone(),
            wind_speed: wspd[i].clone(),
            wind_direction: wdir[i].clone(),
            weather: weather_code::describe(codes[i]),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLink {
    pub file: String,
    pub caption: String,
    pub url: String,
}

/// Everything the dashboard shows for one city
#[derive(Debug, Clone, Serialize)]
pub struct CityOverview {
    pub city: TrackedCity,
    pub status: StatusRecord,
    pub fetched_at: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub current: Option<CurrentSummary>,
    pub stats: Option<WeeklyStats>,
    pub daily: Vec<DailyRow>,
    pub hourly: Vec<HourlyRow>,
    pub charts: Vec<ChartLink>,
    /// Retained snapshot count
    pub snapshots: usize,
}

impl CityOverview {
    /// Assemble from stored artifacts; `graphs_dir` decides which chart links exist
    pub fn build(
        city: TrackedCity,
        status: StatusRecord,
        latest: Option<FetchRecord>,
        graphs_dir: Option<&Path>,
    ) -> Self {
        let version = status.version_tag();
        let charts = graphs_dir
            .map(|dir| {
                CHART_FILES
                    .iter()
                    .filter(|(file, _)| dir.join(file).is_file())
                    .map(|(file, caption)| ChartLink {
                        file: file.to_string(),
                        caption: caption.to_string(),
                        url: format!("/api/cities/{}/charts/{}?v={}", city.id, file, version),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let (fetched_at, timezone, current, stats, daily, hourly) = match &latest {
            Some(record) => {
                let f = &record.payload;
                (
                    Some(record.fetched_at),
                    f.timezone().map(str::to_string),
                    CurrentSummary::from_forecast(f),
                    WeeklyStats::from_forecast(f),
                    daily_rows(f),
                    hourly_rows(f),
                )
            }
            None => (None, None, None, None, Vec::new(), Vec::new()),
        };

        Self {
            city,
            status,
            fetched_at,
            timezone,
            current,
            stats,
            daily,
            hourly,
            charts,
            snapshots: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub settings: Settings,
    pub max_cities: usize,
    pub ui_refresh_seconds: u64,
    pub cities: Vec<CityOverview>,
}

/// Read-only aggregation over the registry and the per-city store
pub struct DashboardService {
    store: Arc<CityStore>,
    repository: Arc<CityDataRepository>,
    ui_refresh_seconds: u64,
}

impl DashboardService {
    pub fn new(store: Arc<CityStore>, repository: Arc<CityDataRepository>, ui_refresh_seconds: u64) -> Self {
        Self {
            store,
            repository,
            ui_refresh_seconds,
        }
    }

    pub fn repository(&self) -> &CityDataRepository {
        &self.repository
    }

    /// Tracked city by exact id
    pub fn find_city(&self, id: &str) -> Result<Option<TrackedCity>> {
        Ok(self.store.load()?.find(id).cloned())
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        let registry = self.store.load()?;

        let overviews = join_all(registry.cities.into_iter().map(|city| {
            let repository = Arc::clone(&self.repository);
            async move {
                let fallback = city.clone();
                // File reads are blocking; keep them off the runtime workers
                match tokio::task::spawn_blocking(move || overview(&repository, city)).await {
                    Ok(overview) => overview,
                    Err(e) => {
                        warn!("Overview task for {} failed: {}", fallback.id, e);
                        CityOverview::build(fallback, StatusRecord::new(false, e.to_string()), None, None)
                    }
                }
            }
        }))
        .await;

        Ok(Dashboard {
            settings: registry.settings,
            max_cities: MAX_CITIES,
            ui_refresh_seconds: self.ui_refresh_seconds,
            cities: overviews,
        })
    }

    /// Latest record for a tracked city; `None` before its first refresh
    pub fn latest(&self, city: &TrackedCity) -> Result<Option<FetchRecord>> {
        self.repository.read_latest(&city.id)
    }

    /// Retained snapshots, newest first
    pub fn snapshots(&self, city: &TrackedCity) -> Result<Vec<SnapshotEntry>> {
        self.repository.list_snapshots(&city.id)
    }

    pub fn snapshot(&self, city: &TrackedCity, seq: u64) -> Result<Option<FetchRecord>> {
        let Some(entry) = self.snapshots(city)?.into_iter().find(|e| e.seq == seq) else {
            return Ok(None);
        };
        self.repository.read_snapshot(&city.id, &entry)
    }
}

fn overview(repository: &CityDataRepository, city: TrackedCity) -> CityOverview {
    let status = repository.read_status(&city.id);
    let latest = repository.read_latest(&city.id).unwrap_or_else(|e| {
        warn!("Unreadable latest record for {}: {}", city.id, e);
        None
    });
    let snapshots = repository.list_snapshots(&city.id).map(|s| s.len()).unwrap_or(0);
    let graphs_dir = repository.graphs_dir(&city.id).ok();

    let mut view = CityOverview::build(city, status, latest, graphs_dir.as_deref());
    view.snapshots = snapshots;
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GeoCandidate;
    use serde_json::json;

    fn city() -> TrackedCity {
        TrackedCity::from_candidate(&GeoCandidate {
            name: "Lima".to_string(),
            admin1: Some("Lima".to_string()),
            country: Some("Peru".to_string()),
            country_code: Some("PE".to_string()),
            latitude: -12.04,
            longitude: -77.03,
            timezone: Some("America/Lima".to_string()),
        })
    }

    fn forecast() -> Forecast {
        let times: Vec<String> = (0..60).map(|h| format!("2025-01-{:02}T{:02}:00", 1 + h / 24, h % 24)).collect();
        let temps: Vec<f64> = (0..60).map(|h| 18.0 + (h % 24) as f64 / 2.0).collect();
        Forecast::new(json!({
            "timezone": "America/Lima",
            "current": { "time": "2025-01-01T10:00", "temperature_2m": 21.5, "weather_code": 2 },
            "current_units": { "temperature_2m": "°C" },
            "hourly": { "time": times, "temperature_2m": temps, "weather_code": [0] },
            "hourly_units": { "temperature_2m": "°C" },
            "daily": {
                "time": ["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-04",
                         "2025-01-05", "2025-01-06", "2025-01-07", "2025-01-08"],
                "temperature_2m_max": [25, 26, 24, 23, 27, 22, 21, 20],
                "temperature_2m_min": [17, 18, 16, 15, 19, 14, 13, 12],
                "weather_code": [61]
            },
            "daily_units": { "temperature_2m_max": "°C" }
        }))
    }

    #[test]
    fn test_overview_rows_are_capped() {
        let record = FetchRecord::new(forecast());
        let view = CityOverview::build(city(), StatusRecord::new(true, "OK"), Some(record), None);

        assert_eq!(view.daily.len(), DAILY_ROWS);
        assert_eq!(view.hourly.len(), HOURLY_ROWS);
        assert_eq!(view.daily[0].weather, "Slight rain");
        assert_eq!(view.daily[1].weather, "—");
        assert_eq!(view.daily[0].tmax.display(), "25°C");
        assert_eq!(view.hourly[1].temperature.display(), "18.5°C");
        assert_eq!(view.timezone.as_deref(), Some("America/Lima"));

        let current = view.current.unwrap();
        assert_eq!(current.weather, "Partly cloudy");
        assert_eq!(current.temperature.display(), "21.5°C");
        assert_eq!(current.humidity.display(), "—");
        assert!(view.stats.is_some());
    }

    #[test]
    fn test_overview_without_data() {
        let view = CityOverview::build(city(), StatusRecord::not_yet_updated(), None, None);
        assert!(view.current.is_none());
        assert!(view.stats.is_none());
        assert!(view.daily.is_empty() && view.hourly.is_empty() && view.charts.is_empty());
    }

    #[test]
    fn test_chart_links_only_for_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("temp.png"), b"png").unwrap();
        std::fs::write(dir.path().join("precip_acum.png"), b"png").unwrap();

        let status = StatusRecord::new(true, "OK");
        let tag = status.version_tag();
        let view = CityOverview::build(city(), status, None, Some(dir.path()));

        let files: Vec<&str> = view.charts.iter().map(|c| c.file.as_str()).collect();
        assert_eq!(files, vec!["temp.png", "precip_acum.png"]);
        assert_eq!(
            view.charts[0].url,
            format!("/api/cities/lima_lima_peru/charts/temp.png?v={}", tag)
        );
    }

    #[tokio::test]
    async fn test_dashboard_aggregates_cities_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CityStore::new(dir.path().join("cities.json")));
        let repo = Arc::new(CityDataRepository::new(dir.path()));

        let lima = store.add(city()).unwrap();
        let mut other = city();
        other.id = "quito_ecuador".into();
        store.add(other).unwrap();
        repo.save_fetch(&lima.id, &FetchRecord::new(forecast()), 3).unwrap();
        repo.write_status(&lima.id, true, "OK").unwrap();

        let service = DashboardService::new(Arc::clone(&store), repo, 60);
        let dashboard = service.dashboard().await.unwrap();

        assert_eq!(dashboard.max_cities, 4);
        assert_eq!(dashboard.ui_refresh_seconds, 60);
        let ids: Vec<&str> = dashboard.cities.iter().map(|c| c.city.id.as_str()).collect();
        assert_eq!(ids, vec!["lima_lima_peru", "quito_ecuador"]);
        assert!(dashboard.cities[0].status.ok);
        assert!(dashboard.cities[0].current.is_some());
        assert_eq!(dashboard.cities[0].snapshots, 1);
        assert_eq!(dashboard.cities[1].status.message, "not yet updated");

        assert!(service.find_city("quito_ecuador").unwrap().is_some());
        assert!(service.find_city("nowhere").unwrap().is_none());

        let snapshots = service.snapshots(&lima).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert!(service.snapshot(&lima, snapshots[0].seq).unwrap().is_some());
        assert!(service.snapshot(&lima, 99).unwrap().is_none());
    }

    #[test]
    fn test_trim_number() {
        assert_eq!(trim_number(25.0), "25");
        assert_eq!(trim_number(-3.5), "-3.5");
    }
}
