use std::fmt;

use serde::{Deserialize, Serialize};

use super::{GeoCandidate, Settings};

/// Stable identifier of a tracked city, derived from name + region + country
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(String);

impl CityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Deterministic slug: same location in, same id out
    pub fn derive(name: &str, region: &str, country: &str) -> Self {
        Self(slugify(&format!("{}_{}_{}", name, region, country)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lowercase, collapse every run of characters outside `[a-z0-9-]` into one `_`
fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_gap = false;

    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            out.push(ch);
            in_gap = false;
        } else if !in_gap {
            out.push('_');
            in_gap = true;
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "city".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A location in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedCity {
    pub id: CityId,
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick: Option<usize>,
}

impl TrackedCity {
    pub fn from_candidate(candidate: &GeoCandidate) -> Self {
        Self {
            id: candidate.city_id(),
            label: candidate.label(),
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            timezone: None,
            query: None,
            country_code: None,
            pick: None,
        }
    }

    /// Remember how the city was found
    pub fn with_provenance(
        mut self,
        query: impl Into<String>,
        country_code: Option<String>,
        pick: usize,
    ) -> Self {
        self.query = Some(query.into());
        self.country_code = country_code;
        self.pick = Some(pick);
        self
    }

    pub fn with_timezone(mut self, timezone: Option<String>) -> Self {
        self.timezone = timezone.filter(|tz| !tz.trim().is_empty());
        self
    }

    /// City override, else the global setting
    pub fn effective_timezone<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.timezone
            .as_deref()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or(&settings.timezone)
    }
}
