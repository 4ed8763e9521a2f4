use std::sync::Arc;

use tracing::{info, warn};

use crate::adapters::{CityDataRepository, CityStore, Registry};
use crate::domain::{GeoCandidate, Settings, SettingsUpdate, TrackedCity};
use crate::error::{ClimaError, Result};
use crate::ports::{GeocodeQuery, WeatherProvider};

/// Parameters of an add operation
#[derive(Debug, Clone, Default)]
pub struct AddCity {
    pub query: String,
    pub country_code: Option<String>,
    pub pick: usize,
    /// Per-city timezone override; `None` follows the global setting
    pub timezone: Option<String>,
}

impl AddCity {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_country(mut self, country_code: Option<String>) -> Self {
        self.country_code = country_code;
        self
    }

    pub fn with_pick(mut self, pick: usize) -> Self {
        self.pick = pick;
        self
    }

    pub fn with_timezone(mut self, timezone: Option<String>) -> Self {
        self.timezone = timezone;
        self
    }
}

/// Registry operations exposed to the CLI and the dashboard
pub struct CityService {
    provider: Arc<dyn WeatherProvider>,
    store: Arc<CityStore>,
    repository: Arc<CityDataRepository>,
    geocoding_count: usize,
}

impl CityService {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        store: Arc<CityStore>,
        repository: Arc<CityDataRepository>,
        geocoding_count: usize,
    ) -> Self {
        Self {
            provider,
            store,
            repository,
            geocoding_count: geocoding_count.max(1),
        }
    }

    pub fn list(&self) -> Result<Registry> {
        self.store.load()
    }

    /// Geocoding candidates for the caller to pick from
    pub async fn search(&self, query: &str, country_code: Option<&str>) -> Result<Vec<GeoCandidate>> {
        let query = GeocodeQuery::new(query, country_code, self.geocoding_count);
        if query.name.is_empty() {
            return Err(ClimaError::NotFound("empty place name".to_string()));
        }
        self.provider.geocode(&query).await
    }

    /// Resolve `request.query`, take candidate `request.pick`, and track it
    pub async fn add(&self, request: &AddCity) -> Result<TrackedCity> {
        let candidates = self.candidates_for(request).await?;
        self.add_from(request, &candidates)
    }

    /// Candidates for an add; a full registry fails before any geocoding
    pub async fn candidates_for(&self, request: &AddCity) -> Result<Vec<GeoCandidate>> {
        self.store.ensure_capacity()?;
        self.search(&request.query, request.country_code.as_deref()).await
    }

    /// Track candidate `request.pick` of an already fetched list
    pub fn add_from(&self, request: &AddCity, candidates: &[GeoCandidate]) -> Result<TrackedCity> {
        let candidate = candidates.get(request.pick).ok_or_else(|| {
            ClimaError::NotFound(format!(
                "candidate index {} out of range 0..{}",
                request.pick,
                candidates.len()
            ))
        })?;

        let country_code = request
            .country_code
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());
        let city = TrackedCity::from_candidate(candidate)
            .with_provenance(request.query.trim(), country_code, request.pick)
            .with_timezone(request.timezone.clone());

        let city = self.store.add(city)?;
        info!("Added city {} ({})", city.label, city.id);

        if let Err(e) = self
            .repository
            .write_status(&city.id, false, "added, waiting for first update")
        {
            warn!("Could not write initial status for {}: {}", city.id, e);
        }
        Ok(city)
    }

    /// Remove by id or index and purge everything stored for the city
    pub fn remove(&self, id_or_index: &str) -> Result<TrackedCity> {
        let city = self.store.remove(id_or_index)?;
        info!("Removed city {} ({})", city.label, city.id);

        if let Err(e) = self.repository.purge(&city.id) {
            warn!("Could not purge data of {}: {}", city.id, e);
        }
        Ok(city)
    }

    pub fn update_settings(&self, update: &SettingsUpdate) -> Result<Settings> {
        let settings = self.store.update_settings(update)?;
        info!(
            "Settings updated: interval={}s hours={} tz={} retention={}",
            settings.interval_seconds, settings.forecast_hours, settings.timezone, settings.snapshot_retention
        );
        Ok(settings)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::Forecast;
    use crate::ports::ForecastRequest;
    use async_trait::async_trait;
    use serde_json::json;

    /// Geocoder returning fixed candidates for known names
    pub(crate) struct FakeGeocoder;

    pub(crate) fn candidate(name: &str, admin1: &str, country: &str) -> GeoCandidate {
        GeoCandidate {
            name: name.to_string(),
            admin1: Some(admin1.to_string()),
            country: Some(country.to_string()),
            country_code: None,
            latitude: 39.47,
            longitude: -0.38,
            timezone: Some("Europe/Madrid".to_string()),
        }
    }

    #[async_trait]
    impl WeatherProvider for FakeGeocoder {
        async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<GeoCandidate>> {
            match (query.name.as_str(), query.country_code.as_deref()) {
                ("Valencia", Some("ES")) => Ok(vec![
                    candidate("Valencia", "Valencia", "Spain"),
                    candidate("Valencia de Alcántara", "Extremadura", "Spain"),
                ]),
                ("Valencia", _) => Ok(vec![candidate("Valencia", "Carabobo", "Venezuela")]),
                (name, _) if ["Madrid", "Lima", "Quito", "Bogota"].contains(&name) => {
                    Ok(vec![candidate(name, "", "Somewhere")])
                }
                (name, _) => Err(ClimaError::NotFound(format!("no geocoding results for '{}'", name))),
            }
        }

        async fn forecast(&self, _request: &ForecastRequest) -> Result<Forecast> {
            Ok(Forecast::new(json!({})))
        }
    }

    fn service() -> (tempfile::TempDir, CityService, Arc<CityDataRepository>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CityStore::new(dir.path().join("cities.json")));
        let repo = Arc::new(CityDataRepository::new(dir.path()));
        let service = CityService::new(Arc::new(FakeGeocoder), store, Arc::clone(&repo), 5);
        (dir, service, repo)
    }

    #[tokio::test]
    async fn test_add_valencia_then_duplicate() {
        let (_dir, service, repo) = service();
        let request = AddCity::new("Valencia").with_country(Some("es".into()));

        let city = service.add(&request).await.unwrap();
        assert!(!city.id.as_str().is_empty());
        assert!(city.label.contains("Valencia"));
        assert_eq!(city.country_code.as_deref(), Some("ES"));
        assert_eq!(service.list().unwrap().cities.len(), 1);
        assert!(!repo.read_status(&city.id).ok);

        let err = service.add(&request).await.unwrap_err();
        assert!(matches!(err, ClimaError::DuplicateCity(_)));
        assert_eq!(service.list().unwrap().cities.len(), 1);
    }

    #[tokio::test]
    async fn test_pick_selects_candidate() {
        let (_dir, service, _) = service();
        let city = service
            .add(&AddCity::new("Valencia").with_country(Some("ES".into())).with_pick(1))
            .await
            .unwrap();
        assert_eq!(city.id.as_str(), "valencia_de_alc_ntara_extremadura_spain");

        let err = service
            .add(&AddCity::new("Valencia").with_country(Some("ES".into())).with_pick(9))
            .await
            .unwrap_err();
        assert!(matches!(err, ClimaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_place_is_not_found() {
        let (_dir, service, _) = service();
        let err = service.add(&AddCity::new("Atlantis")).await.unwrap_err();
        assert!(matches!(err, ClimaError::NotFound(_)));
        assert!(service.list().unwrap().cities.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_checked_before_geocoding() {
        let (_dir, service, _) = service();
        for name in ["Madrid", "Lima", "Quito", "Bogota"] {
            service.add(&AddCity::new(name)).await.unwrap();
        }
        let err = service.add(&AddCity::new("Atlantis")).await.unwrap_err();
        assert!(matches!(err, ClimaError::CapacityExceeded { max: 4 }));
    }

    /// Counts geocode calls before delegating to `FakeGeocoder`
    struct CountingGeocoder(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl WeatherProvider for CountingGeocoder {
        async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<GeoCandidate>> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            FakeGeocoder.geocode(query).await
        }

        async fn forecast(&self, request: &ForecastRequest) -> Result<Forecast> {
            FakeGeocoder.forecast(request).await
        }
    }

    #[tokio::test]
    async fn test_listed_candidates_are_reused_for_add() {
        let dir = tempfile::tempdir().unwrap();
        let geocoder = Arc::new(CountingGeocoder(Default::default()));
        let service = CityService::new(
            geocoder.clone(),
            Arc::new(CityStore::new(dir.path().join("cities.json"))),
            Arc::new(CityDataRepository::new(dir.path())),
            5,
        );
        let calls = || geocoder.0.load(std::sync::atomic::Ordering::SeqCst);

        let request = AddCity::new("Valencia").with_country(Some("ES".into())).with_pick(1);
        let candidates = service.candidates_for(&request).await.unwrap();
        let city = service.add_from(&request, &candidates).unwrap();
        assert_eq!(city.id.as_str(), "valencia_de_alc_ntara_extremadura_spain");
        assert_eq!(calls(), 1);

        for name in ["Madrid", "Lima", "Quito"] {
            service.add(&AddCity::new(name)).await.unwrap();
        }
        assert_eq!(calls(), 4);

        let err = service.candidates_for(&AddCity::new("Bogota")).await.unwrap_err();
        assert!(matches!(err, ClimaError::CapacityExceeded { max: 4 }));
        assert_eq!(calls(), 4);
    }

    #[tokio::test]
    async fn test_remove_purges_data() {
        let (_dir, service, repo) = service();
        let city = service.add(&AddCity::new("Madrid")).await.unwrap();
        assert!(repo.city_dir(&city.id).unwrap().exists());

        service.remove("0").unwrap();
        assert!(!repo.city_dir(&city.id).unwrap().exists());
        assert!(matches!(service.remove("0"), Err(ClimaError::NotFound(_))));

        let again = service.add(&AddCity::new("Madrid")).await.unwrap();
        assert_eq!(again.id, city.id);
    }
}
