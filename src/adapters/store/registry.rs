use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{CityId, Settings, SettingsUpdate, TrackedCity, MAX_CITIES};
use crate::error::{ClimaError, Result};

use super::atomic;

/// The persisted settings + city list document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registry {
    pub settings: Settings,
    pub cities: Vec<TrackedCity>,
}

impl Registry {
    pub fn find(&self, id: &str) -> Option<&TrackedCity> {
        self.cities.iter().find(|c| c.id.as_str() == id)
    }

    pub fn is_full(&self) -> bool {
        self.cities.len() >= MAX_CITIES
    }
}

/// File-backed city registry.
///
/// Every load/modify/save runs under one lock so concurrent writers cannot
/// lose each other's changes; saves are atomic renames so lock-free readers of
/// the file never see a partial document.
pub struct CityStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), a panicked holder cannot leave it inconsistent
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current settings and cities; persists defaults on first use
    pub fn load(&self) -> Result<Registry> {
        let _guard = self.guard();
        self.load_locked()
    }

    fn load_locked(&self) -> Result<Registry> {
        let Some(mut registry) = atomic::read_json::<Registry>(&self.path)? else {
            let registry = Registry::default();
            atomic::write_json(&self.path, &registry)?;
            info!("Initialized empty registry at {}", self.path.display());
            return Ok(registry);
        };

        registry.settings = registry.settings.normalized();
        if registry.cities.len() > MAX_CITIES {
            warn!(
                "Registry {} lists {} cities, only the first {} are used",
                self.path.display(),
                registry.cities.len(),
                MAX_CITIES
            );
            registry.cities.truncate(MAX_CITIES);
        }
        Ok(registry)
    }

    fn save_locked(&self, registry: &Registry) -> Result<()> {
        atomic::write_json(&self.path, registry)
    }

    /// Run `f` against the registry and persist the result, all under the lock
    fn modify<T>(&self, f: impl FnOnce(&mut Registry) -> Result<T>) -> Result<T> {
        let _guard = self.guard();
        let mut registry = self.load_locked()?;
        let out = f(&mut registry)?;
        self.save_locked(&registry)?;
        Ok(out)
    }

    /// Run `f` only while `id` is still registered, holding the lock so a
    /// concurrent remove cannot interleave. `None` means the city is gone.
    pub fn while_tracked<T>(&self, id: &CityId, f: impl FnOnce() -> Result<T>) -> Result<Option<T>> {
        let _guard = self.guard();
        if self.load_locked()?.find(id.as_str()).is_none() {
            return Ok(None);
        }
        f().map(Some)
    }

    /// Cheap pre-check used before spending a geocoding request
    pub fn ensure_capacity(&self) -> Result<()> {
        if self.load()?.is_full() {
            return Err(ClimaError::CapacityExceeded { max: MAX_CITIES });
        }
        Ok(())
    }

    /// Append a city, rejecting a full registry or a duplicate id
    pub fn add(&self, city: TrackedCity) -> Result<TrackedCity> {
        self.modify(|registry| {
            if registry.is_full() {
                return Err(ClimaError::CapacityExceeded { max: MAX_CITIES });
            }
            if registry.find(city.id.as_str()).is_some() {
                return Err(ClimaError::DuplicateCity(city.id.to_string()));
            }
            registry.cities.push(city.clone());
            Ok(city)
        })
    }

    /// Remove by exact id, falling back to a positional index
    pub fn remove(&self, id_or_index: &str) -> Result<TrackedCity> {
        let target = id_or_index.trim();
        self.modify(|registry| {
            let position = registry
                .cities
                .iter()
                .position(|c| c.id.as_str() == target)
                .or_else(|| {
                    target
                        .parse::<usize>()
                        .ok()
                        .filter(|idx| *idx < registry.cities.len())
                });

            match position {
                Some(idx) => Ok(registry.cities.remove(idx)),
                None => Err(ClimaError::NotFound(format!(
                    "no tracked city with id or index '{}'",
                    target
                ))),
            }
        })
    }

    pub fn update_settings(&self, update: &SettingsUpdate) -> Result<Settings> {
        self.modify(|registry| {
            registry.settings.apply(update);
            Ok(registry.settings.clone())
        })
    }
}
