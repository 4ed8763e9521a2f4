use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClimaError, Result};

pub const HOURLY_FIELDS: &[&str] = &[
    "temperature_2m",
    "apparent_temperature",
    "precipitation",
    "precipitation_probability",
    "wind_speed_10m",
    "wind_direction_10m",
    "weather_code",
];

pub const DAILY_FIELDS: &[&str] = &[
    "temperature_2m_max",
    "temperature_2m_min",
    "precipitation_sum",
    "precipitation_probability_max",
    "weather_code",
];

pub const CURRENT_FIELDS: &[&str] = &[
    "temperature_2m",
    "relative_humidity_2m",
    "apparent_temperature",
    "precipitation",
    "weather_code",
    "wind_speed_10m",
    "wind_direction_10m",
];

/// Read-only view over a raw forecast document.
///
/// The provider document is kept as-is; every accessor answers "present or
/// absent" and series are aligned to their time axis by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forecast(Value);

impl Forecast {
    pub fn new(doc: Value) -> Self {
        Self(doc)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Timezone the provider resolved for this document
    pub fn timezone(&self) -> Option<&str> {
        self.0.get("timezone").and_then(Value::as_str)
    }

    fn section(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    fn times(&self, section: &str) -> Vec<&str> {
        self.section(section)
            .and_then(|s| s.get("time"))
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(|v| v.as_str().unwrap_or_default()).collect())
            .unwrap_or_default()
    }

    /// Series for `field` padded or truncated to `len`; gaps and nulls are `None`
    fn series(&self, section: &str, field: &str, len: usize) -> Vec<Option<f64>> {
        let values = self
            .section(section)
            .and_then(|s| s.get(field))
            .and_then(Value::as_array);

        (0..len)
            .map(|i| values.and_then(|arr| arr.get(i)).and_then(Value::as_f64))
            .collect()
    }

    fn unit(&self, units_key: &str, field: &str) -> Option<&str> {
        self.section(units_key)
            .and_then(|u| u.get(field))
            .and_then(Value::as_str)
    }

    /// Hourly time axis; a document without one cannot be charted
    pub fn hourly_times(&self) -> Result<Vec<&str>> {
        let times = self.times("hourly");
        if times.is_empty() {
            return Err(ClimaError::MalformedPayload(
                "document has no hourly.time axis".to_string(),
            ));
        }
        Ok(times)
    }

    pub fn hourly_series(&self, field: &str) -> Vec<Option<f64>> {
        self.series("hourly", field, self.times("hourly").len())
    }

    pub fn hourly_unit(&self, field: &str) -> Option<&str> {
        self.unit("hourly_units", field)
    }

    pub fn has_daily(&self) -> bool {
        !self.times("daily").is_empty()
    }

    pub fn daily_times(&self) -> Vec<&str> {
        self.times("daily")
    }

    pub fn daily_series(&self, field: &str) -> Vec<Option<f64>> {
        self.series("daily", field, self.times("daily").len())
    }

    pub fn daily_unit(&self, field: &str) -> Option<&str> {
        self.unit("daily_units", field)
    }

    pub fn has_current(&self) -> bool {
        self.section("current").is_some_and(|c| !c.is_empty())
    }

    pub fn current_value(&self, field: &str) -> Option<f64> {
        self.section("current")
            .and_then(|c| c.get(field))
            .and_then(Value::as_f64)
    }

    pub fn current_unit(&self, field: &str) -> Option<&str> {
        self.unit("current_units", field)
    }
}

/// Provider timestamps come as local "YYYY-MM-DDTHH:MM" without offset
pub fn parse_local_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// A fetched document tagged with the moment it was downloaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRecord {
    pub fetched_at: DateTime<Utc>,
    pub payload: Forecast,
}

impl FetchRecord {
    pub fn new(payload: Forecast) -> Self {
        Self {
            fetched_at: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Forecast {
        Forecast::new(json!({
            "timezone": "Europe/Madrid",
            "hourly": {
                "time": ["2025-01-01T00:00", "2025-01-01T01:00", "2025-01-01T02:00"],
                "temperature_2m": [10.5, null, 9.0],
                "precipitation": [0.2]
            },
            "hourly_units": { "temperature_2m": "°C" },
            "current": { "temperature_2m": 11.2 }
        }))
    }

    #[test]
    fn test_short_series_is_padded_with_none() {
        let f = sample();
        assert_eq!(f.hourly_series("precipitation"), vec![Some(0.2), None, None]);
        assert_eq!(f.hourly_series("temperature_2m"), vec![Some(10.5), None, Some(9.0)]);
        assert_eq!(f.hourly_series("wind_speed_10m"), vec![None, None, None]);
    }

    #[test]
    fn test_missing_time_axis_is_malformed() {
        let f = Forecast::new(json!({ "hourly": { "temperature_2m": [1.0] } }));
        assert!(matches!(f.hourly_times(), Err(ClimaError::MalformedPayload(_))));
        assert!(f.hourly_series("temperature_2m").is_empty());
    }

    #[test]
    fn test_units_current_and_daily_presence() {
        let f = sample();
        assert_eq!(f.hourly_unit("temperature_2m"), Some("°C"));
        assert_eq!(f.hourly_unit("precipitation"), None);
        assert_eq!(f.current_value("temperature_2m"), Some(11.2));
        assert!(f.has_current());
        assert!(!f.has_daily());
        assert_eq!(f.timezone(), Some("Europe/Madrid"));
    }

    #[test]
    fn test_parse_local_time() {
        assert!(parse_local_time("2025-01-01T13:00").is_some());
        assert!(parse_local_time("2025-01-01T13:00:30").is_some());
        assert!(parse_local_time("yesterday").is_none());
    }
}
