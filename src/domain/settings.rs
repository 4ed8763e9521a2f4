use serde::{Deserialize, Deserializer, Serialize};

/// Hard cap on the number of tracked cities
pub const MAX_CITIES: usize = 4;

pub const MIN_INTERVAL_SECONDS: u64 = 30;
pub const MIN_SNAPSHOT_RETENTION: usize = 1;
/// Open-Meteo serves at most 16 days of hourly data
pub const MAX_FORECAST_HOURS: u32 = 384;

pub const DEFAULT_INTERVAL_SECONDS: u64 = 300;
pub const DEFAULT_FORECAST_HOURS: u32 = 48;
pub const DEFAULT_TIMEZONE: &str = "auto";
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 24;

/// Process-wide refresh settings, persisted next to the city registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub interval_seconds: u64,
    pub forecast_hours: u32,
    pub timezone: String,
    pub snapshot_retention: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            forecast_hours: DEFAULT_FORECAST_HOURS,
            timezone: DEFAULT_TIMEZONE.to_string(),
            snapshot_retention: DEFAULT_SNAPSHOT_RETENTION,
        }
    }
}

impl Settings {
    /// Pull hand-edited values back inside their valid ranges
    pub fn normalized(mut self) -> Self {
        self.interval_seconds = self.interval_seconds.max(MIN_INTERVAL_SECONDS);
        self.snapshot_retention = self.snapshot_retention.max(MIN_SNAPSHOT_RETENTION);
        self.forecast_hours = self.forecast_hours.clamp(1, MAX_FORECAST_HOURS);
        if self.timezone.trim().is_empty() {
            self.timezone = DEFAULT_TIMEZONE.to_string();
        }
        self
    }

    /// Apply a partial update field by field.
    ///
    /// Numeric fields are clamped to their floor; a field whose input could not
    /// be parsed arrives as `None` and keeps its previous value.
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(interval) = update.interval_seconds {
            self.interval_seconds = clamp_floor(interval, MIN_INTERVAL_SECONDS);
        }
        if let Some(hours) = update.forecast_hours {
            self.forecast_hours = clamp_floor(hours, 1).min(u64::from(MAX_FORECAST_HOURS)) as u32;
        }
        if let Some(retention) = update.snapshot_retention {
            self.snapshot_retention = clamp_floor(retention, MIN_SNAPSHOT_RETENTION as u64) as usize;
        }
        if let Some(tz) = update.timezone.as_deref().map(str::trim) {
            if !tz.is_empty() {
                self.timezone = tz.to_string();
            }
        }
    }
}

fn clamp_floor(value: i64, floor: u64) -> u64 {
    u64::try_from(value).unwrap_or(0).max(floor)
}

/// Partial settings update.
///
/// Deserialization is lenient: numbers may arrive as JSON numbers or strings
/// (HTML forms), and anything unparseable becomes `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default, deserialize_with = "lenient_int")]
    pub interval_seconds: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub forecast_hours: Option<i64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub snapshot_retention: Option<i64>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.interval_seconds.is_none()
            && self.forecast_hours.is_none()
            && self.timezone.is_none()
            && self.snapshot_retention.is_none()
    }
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_is_clamped_to_floor() {
        let mut settings = Settings::default();
        settings.apply(&SettingsUpdate {
            interval_seconds: Some(5),
            ..Default::default()
        });
        assert_eq!(settings.interval_seconds, 30);

        settings.apply(&SettingsUpdate {
            interval_seconds: Some(-10),
            ..Default::default()
        });
        assert_eq!(settings.interval_seconds, 30);
    }

    #[test]
    fn test_retention_is_clamped_to_one() {
        let mut settings = Settings::default();
        settings.apply(&SettingsUpdate {
            snapshot_retention: Some(0),
            ..Default::default()
        });
        assert_eq!(settings.snapshot_retention, 1);
    }

    #[test]
    fn test_invalid_field_is_ignored_valid_field_applies() {
        let update: SettingsUpdate = serde_json::from_str(
            r#"{"interval_seconds": "abc", "snapshot_retention": "12"}"#,
        )
        .unwrap();
        assert_eq!(update.interval_seconds, None);
        assert_eq!(update.snapshot_retention, Some(12));

        let mut settings = Settings::default();
        settings.apply(&update);
        assert_eq!(settings.interval_seconds, DEFAULT_INTERVAL_SECONDS);
        assert_eq!(settings.snapshot_retention, 12);
    }

    #[test]
    fn test_blank_timezone_is_ignored() {
        let mut settings = Settings::default();
        settings.apply(&SettingsUpdate {
            timezone: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(settings.timezone, "auto");

        settings.apply(&SettingsUpdate {
            timezone: Some("Europe/Madrid".to_string()),
            ..Default::default()
        });
        assert_eq!(settings.timezone, "Europe/Madrid");
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"interval_seconds": 60}"#).unwrap();
        assert_eq!(settings.interval_seconds, 60);
        assert_eq!(settings.forecast_hours, DEFAULT_FORECAST_HOURS);
        assert_eq!(settings.snapshot_retention, DEFAULT_SNAPSHOT_RETENTION);
    }

    #[test]
    fn test_normalized_repairs_hand_edits() {
        let settings = Settings {
            interval_seconds: 1,
            forecast_hours: 0,
            timezone: String::new(),
            snapshot_retention: 0,
        }
        .normalized();
        assert_eq!(settings.interval_seconds, 30);
        assert_eq!(settings.forecast_hours, 1);
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.snapshot_retention, 1);
    }
}
