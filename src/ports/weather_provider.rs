use async_trait::async_trait;

use crate::domain::{Forecast, GeoCandidate, CURRENT_FIELDS, DAILY_FIELDS, HOURLY_FIELDS};
use crate::error::Result;

/// Free-text place lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeQuery {
    pub name: String,
    /// ISO 3166-1 alpha-2, uppercased
    pub country_code: Option<String>,
    pub count: usize,
}

impl GeocodeQuery {
    pub fn new(name: impl Into<String>, country_code: Option<&str>, count: usize) -> Self {
        Self {
            name: name.into().trim().to_string(),
            country_code: country_code
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty()),
            count,
        }
    }
}

/// Forecast request for one location
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// "auto" or an IANA name
    pub timezone: String,
    pub forecast_hours: u32,
    pub forecast_days: u32,
    pub hourly: Vec<String>,
    pub daily: Vec<String>,
    pub current: Vec<String>,
}

impl ForecastRequest {
    /// Hourly horizon plus daily and current blocks used by the dashboard
    pub fn standard(
        latitude: f64,
        longitude: f64,
        timezone: impl Into<String>,
        forecast_hours: u32,
        forecast_days: u32,
    ) -> Self {
        let owned = |fields: &[&str]| fields.iter().map(|f| f.to_string()).collect();
        Self {
            latitude,
            longitude,
            timezone: timezone.into(),
            forecast_hours,
            forecast_days,
            hourly: owned(HOURLY_FIELDS),
            daily: owned(DAILY_FIELDS),
            current: owned(CURRENT_FIELDS),
        }
    }
}

/// Port for the external geocoding + forecast service
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Ordered candidates; an empty result is `NotFound`
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<GeoCandidate>>;

    async fn forecast(&self, request: &ForecastRequest) -> Result<Forecast>;
}
