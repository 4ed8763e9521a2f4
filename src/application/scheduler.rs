use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::{CityDataRepository, CityStore, SnapshotEntry};
use crate::domain::{FetchRecord, Settings, TrackedCity};
use crate::error::{ClimaError, Result};
use crate::ports::{ChartRenderer, ForecastRequest, WeatherProvider};

/// Outcome counts of one pass over the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub refreshed: usize,
    pub failed: usize,
}

/// Background refresher: every tracked city, in registry order, once per cycle
pub struct RefreshScheduler {
    store: Arc<CityStore>,
    repository: Arc<CityDataRepository>,
    provider: Arc<dyn WeatherProvider>,
    renderer: Arc<dyn ChartRenderer>,
    forecast_days: u32,
    interval_override: Option<u64>,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<CityStore>,
        repository: Arc<CityDataRepository>,
        provider: Arc<dyn WeatherProvider>,
        renderer: Arc<dyn ChartRenderer>,
        forecast_days: u32,
    ) -> Self {
        Self {
            store,
            repository,
            provider,
            renderer,
            forecast_days,
            interval_override: None,
        }
    }

    /// Sleep this long between cycles instead of the persisted setting
    pub fn with_interval_override(mut self, seconds: Option<u64>) -> Self {
        self.interval_override = seconds.map(|s| s.max(1));
        self
    }

    /// Loop until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Refresh scheduler started");
        let mut last_interval = Settings::default().interval_seconds;

        loop {
            let report = self.run_cycle(&cancel).await;
            info!(
                "Cycle finished: {} refreshed, {} failed",
                report.refreshed, report.failed
            );
            if cancel.is_cancelled() {
                break;
            }

            // Re-read so interval edits apply without a restart
            let interval = match self.interval_override {
                Some(seconds) => seconds,
                None => match self.store.load() {
                    Ok(registry) => registry.settings.interval_seconds,
                    Err(e) => {
                        warn!("Could not reload settings, keeping {}s interval: {}", last_interval, e);
                        last_interval
                    }
                },
            };
            last_interval = interval;

            info!("Sleeping {}s until next cycle", interval);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            }
        }

        info!("Refresh scheduler stopped");
    }

    /// Exactly one cycle, for `run --once`
    pub async fn run_once(&self) -> CycleReport {
        self.run_cycle(&CancellationToken::new()).await
    }

    /// One pass over the registry; stops early between cities if cancelled
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let registry = match self.store.load() {
            Ok(registry) => registry,
            Err(e) => {
                error!("Could not load city registry: {}", e);
                return CycleReport::default();
            }
        };

        if registry.cities.is_empty() {
            info!("No cities tracked yet, add one to start refreshing");
            return CycleReport::default();
        }

        let mut report = CycleReport::default();
        for city in &registry.cities {
            if cancel.is_cancelled() {
                break;
            }
            match self.refresh_and_record(&registry.settings, city).await {
                Some(true) => report.refreshed += 1,
                Some(false) => report.failed += 1,
                None => {}
            }
        }
        report
    }

    /// Refresh one city and record the outcome in its status; never propagates.
    /// `None` when the city was removed before its results could be written.
    async fn refresh_and_record(&self, settings: &Settings, city: &TrackedCity) -> Option<bool> {
        let outcome = AssertUnwindSafe(self.refresh_city(settings, city))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ClimaError::Provider(panic_message(panic))));

        let message = match outcome {
            Ok(Some(entry)) => {
                info!("✓ {} refreshed (snapshot #{})", city.label, entry.seq);
                return Some(true);
            }
            Ok(None) => {
                info!("{} was removed during refresh, results dropped", city.label);
                return None;
            }
            Err(e) => {
                error!("✗ {} failed: {}", city.label, e);
                e.to_string()
            }
        };

        let recorded = self
            .store
            .while_tracked(&city.id, || self.repository.write_status(&city.id, false, message));
        match recorded {
            Ok(Some(_)) => Some(false),
            Ok(None) => None,
            Err(e) => {
                error!("Could not write status for {}: {}", city.id, e);
                Some(false)
            }
        }
    }

    /// Fetch, then persist + render + mark ok under the registry lock
    async fn refresh_city(&self, settings: &Settings, city: &TrackedCity) -> Result<Option<SnapshotEntry>> {
        let request = ForecastRequest::standard(
            city.latitude,
            city.longitude,
            city.effective_timezone(settings),
            settings.forecast_hours,
            self.forecast_days,
        );

        let forecast = self.provider.forecast(&request).await?;
        // Reject a payload without a time axis before it replaces good data
        forecast.hourly_times()?;
        let record = FetchRecord::new(forecast);

        let store = Arc::clone(&self.store);
        let repository = Arc::clone(&self.repository);
        let renderer = Arc::clone(&self.renderer);
        let retention = settings.snapshot_retention;
        let city = city.clone();

        tokio::task::spawn_blocking(move || {
            store.while_tracked(&city.id, || {
                let entry = repository.save_fetch(&city.id, &record, retention)?;
                let out_dir = repository.graphs_dir(&city.id)?;
                renderer.render(&city, &record.payload, &out_dir)?;
                repository.write_status(&city.id, true, "OK")?;
                Ok(entry)
            })
        })
        .await
        .map_err(|e| ClimaError::Chart(format!("chart task aborted: {}", e)))?
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("unexpected failure: {}", detail)
}
