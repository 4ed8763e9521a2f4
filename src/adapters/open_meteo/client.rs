use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::domain::{Forecast, GeoCandidate};
use crate::error::{ClimaError, Result};
use crate::ports::{ForecastRequest, GeocodeQuery, WeatherProvider};

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<GeoCandidate>>,
}

/// Open-Meteo adapter for geocoding and forecasts
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    geocoding_url: String,
    forecast_url: String,
    language: String,
}

impl OpenMeteoClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
            language: config.geocoding_language.clone(),
        })
    }

    /// Turn a non-2xx response into a provider error, keeping Open-Meteo's `reason`
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let reason = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("reason").and_then(Value::as_str).map(str::to_string));

        Err(ClimaError::Provider(match reason {
            Some(reason) => format!("HTTP {}: {}", status, reason),
            None => format!("HTTP {}", status),
        }))
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<GeoCandidate>> {
        let mut params = vec![
            ("name", query.name.clone()),
            ("count", query.count.to_string()),
            ("language", self.language.clone()),
            ("format", "json".to_string()),
        ];
        if let Some(code) = &query.country_code {
            params.push(("countryCode", code.clone()));
        }

        debug!("Geocoding '{}' ({:?})", query.name, query.country_code);
        let response = self.client.get(&self.geocoding_url).query(&params).send().await?;
        let body: GeocodingResponse = Self::check_status(response).await?.json().await?;

        let results = body.results.unwrap_or_default();
        if results.is_empty() {
            let mut msg = format!("no geocoding results for '{}'", query.name);
            if let Some(code) = &query.country_code {
                msg.push_str(&format!(" (countryCode={})", code));
            }
            return Err(ClimaError::NotFound(msg));
        }

        Ok(results)
    }

    async fn forecast(&self, request: &ForecastRequest) -> Result<Forecast> {
        let mut params = vec![
            ("latitude", request.latitude.to_string()),
            ("longitude", request.longitude.to_string()),
            ("timezone", request.timezone.clone()),
            ("forecast_hours", request.forecast_hours.to_string()),
        ];
        if !request.hourly.is_empty() {
            params.push(("hourly", request.hourly.join(",")));
        }
        if !request.daily.is_empty() {
            params.push(("forecast_days", request.forecast_days.to_string()));
            params.push(("daily", request.daily.join(",")));
        }
        if !request.current.is_empty() {
            params.push(("current", request.current.join(",")));
        }

        debug!(
            "Fetching forecast for {},{} tz={} hours={}",
            request.latitude, request.longitude, request.timezone, request.forecast_hours
        );
        let response = self.client.get(&self.forecast_url).query(&params).send().await?;
        let body: Value = Self::check_status(response).await?.json().await?;

        if !body.is_object() {
            return Err(ClimaError::MalformedPayload(
                "forecast response is not a JSON object".to_string(),
            ));
        }

        Ok(Forecast::new(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenMeteoClient {
        let mut config = Config::defaults();
        config.geocoding_url = format!("{}/v1/search", server.uri());
        config.forecast_url = format!("{}/v1/forecast", server.uri());
        config.request_timeout_secs = 5;
        OpenMeteoClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_geocode_passes_country_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Valencia"))
            .and(query_param("countryCode", "ES"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "name": "Valencia", "admin1": "Valencia", "country": "Spain",
                    "country_code": "ES", "latitude": 39.47, "longitude": -0.38,
                    "timezone": "Europe/Madrid"
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let results = client
            .geocode(&GeocodeQuery::new("Valencia", Some("es"), 5))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].label(), "Valencia · Valencia · Spain");
    }

    #[tokio::test]
    async fn test_geocode_without_results_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "generationtime_ms": 0.3 })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .geocode(&GeocodeQuery::new("Atlantis", None, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ClimaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_forecast_returns_raw_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("timezone", "auto"))
            .and(query_param("forecast_hours", "48"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timezone": "Europe/Madrid",
                "hourly": { "time": ["2025-01-01T00:00"], "temperature_2m": [9.5] }
            })))
            .mount(&server)
            .await;

        let forecast = client_for(&server)
            .forecast(&ForecastRequest::standard(39.47, -0.38, "auto", 48, 7))
            .await
            .unwrap();

        assert_eq!(forecast.timezone(), Some("Europe/Madrid"));
        assert_eq!(forecast.hourly_series("temperature_2m"), vec![Some(9.5)]);
    }

    #[tokio::test]
    async fn test_forecast_http_error_keeps_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": true,
                "reason": "Latitude must be in range of -90 to 90°."
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .forecast(&ForecastRequest::standard(123.0, 0.0, "auto", 48, 7))
            .await
            .unwrap_err();

        match err {
            ClimaError::Provider(msg) => assert!(msg.contains("Latitude must be in range")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forecast_non_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .forecast(&ForecastRequest::standard(0.0, 0.0, "auto", 24, 7))
            .await
            .unwrap_err();
        assert!(matches!(err, ClimaError::MalformedPayload(_)));
    }
}
