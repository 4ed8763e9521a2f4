use serde::{Deserialize, Serialize};

use super::CityId;

/// One geocoding match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCandidate {
    pub name: String,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl GeoCandidate {
    pub fn city_id(&self) -> CityId {
        CityId::derive(
            &self.name,
            self.admin1.as_deref().unwrap_or_default(),
            self.country.as_deref().unwrap_or_default(),
        )
    }

    /// "Name · Region · Country", skipping empty parts
    pub fn label(&self) -> String {
        [
            Some(self.name.as_str()),
            self.admin1.as_deref(),
            self.country.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" · ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valencia() -> GeoCandidate {
        GeoCandidate {
            name: "Valencia".into(),
            admin1: Some("Valencia".into()),
            country: Some("Spain".into()),
            country_code: Some("ES".into()),
            latitude: 39.47,
            longitude: -0.38,
            timezone: Some("Europe/Madrid".into()),
        }
    }

    #[test]
    fn test_label_and_id() {
        let c = valencia();
        assert_eq!(c.label(), "Valencia · Valencia · Spain");
        assert_eq!(c.city_id().as_str(), "valencia_valencia_spain");
    }

    #[test]
    fn test_label_skips_empty_parts() {
        let mut c = valencia();
        c.admin1 = None;
        c.country = Some(" ".into());
        assert_eq!(c.label(), "Valencia");
    }

    #[test]
    fn test_deserialize_open_meteo_result() {
        let json = r#"{
            "id": 2509954, "name": "Valencia", "latitude": 39.46975, "longitude": -0.37739,
            "elevation": 15.0, "feature_code": "PPLA", "country_code": "ES",
            "admin1": "Valencia", "timezone": "Europe/Madrid", "country": "Spain"
        }"#;
        let c: GeoCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.name, "Valencia");
        assert_eq!(c.country_code.as_deref(), Some("ES"));
        assert_eq!(c.timezone.as_deref(), Some("Europe/Madrid"));
    }
}
