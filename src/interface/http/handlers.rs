use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::{markdown_report, report_filename, AddCity, CityService, DashboardService};
use crate::domain::{GeoCandidate, SettingsUpdate, TrackedCity};
use crate::error::ClimaError;
use crate::ports::is_chart_file;

/// Error type that maps the domain taxonomy onto HTTP statuses
#[derive(Debug)]
pub struct AppError(ClimaError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ClimaError::NotFound(_) => StatusCode::NOT_FOUND,
            ClimaError::CapacityExceeded { .. } | ClimaError::DuplicateCity(_) => StatusCode::CONFLICT,
            ClimaError::Provider(_) | ClimaError::MalformedPayload(_) => StatusCode::BAD_GATEWAY,
            ClimaError::Chart(_) | ClimaError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<ClimaError> for AppError {
    fn from(err: ClimaError) -> Self {
        AppError(err)
    }
}

type ApiResult<T> = Result<T, AppError>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub city_service: Arc<CityService>,
    pub dashboard_service: Arc<DashboardService>,
}

/// Query params for /api/search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub country: Option<String>,
}

/// One row of /api/search, `index` is what POST /api/cities takes as `pick`
#[derive(Debug, Serialize)]
pub struct CandidateView {
    pub index: usize,
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub candidate: GeoCandidate,
}

/// Body of POST /api/cities
#[derive(Debug, Deserialize)]
pub struct AddCityRequest {
    pub query: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub pick: Option<usize>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Handler for GET /api/health
pub async fn health_handler() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "service": "climawatch"
        })),
    )
}

/// Handler for GET /api/dashboard (aggregated endpoint)
pub async fn dashboard_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let dashboard = state.dashboard_service.dashboard().await?;
    Ok((StatusCode::OK, Json(dashboard)).into_response())
}

/// Handler for GET /api/cities
pub async fn list_cities_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let registry = state.city_service.list()?;
    Ok((StatusCode::OK, Json(registry)).into_response())
}

/// Handler for GET /api/search
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Response> {
    let candidates = state
        .city_service
        .search(&params.query, params.country.as_deref())
        .await?;

    let rows: Vec<CandidateView> = candidates
        .into_iter()
        .enumerate()
        .map(|(index, candidate)| CandidateView {
            index,
            id: candidate.city_id().to_string(),
            label: candidate.label(),
            candidate,
        })
        .collect();
    Ok((StatusCode::OK, Json(rows)).into_response())
}

/// Handler for POST /api/cities
pub async fn add_city_handler(
    State(state): State<AppState>,
    Json(body): Json<AddCityRequest>,
) -> ApiResult<Response> {
    let request = AddCity::new(body.query)
        .with_country(body.country_code)
        .with_pick(body.pick.unwrap_or(0))
        .with_timezone(body.timezone);

    let city = state.city_service.add(&request).await?;
    Ok((StatusCode::CREATED, Json(city)).into_response())
}

/// Handler for DELETE /api/cities/{id}; also accepts a positional index
pub async fn remove_city_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let city = state.city_service.remove(&id)?;
    Ok((StatusCode::OK, Json(city)).into_response())
}

/// Handler for POST /api/settings
pub async fn settings_handler(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Response> {
    let settings = state.city_service.update_settings(&update)?;
    Ok((StatusCode::OK, Json(settings)).into_response())
}

fn tracked(state: &AppState, id: &str) -> ApiResult<TrackedCity> {
    state
        .dashboard_service
        .find_city(id)?
        .ok_or_else(|| AppError(ClimaError::NotFound(format!("city '{}' is not tracked", id))))
}

/// Handler for GET /api/cities/{id}/latest
pub async fn latest_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let city = tracked(&state, &id)?;
    let record = state
        .dashboard_service
        .latest(&city)?
        .ok_or_else(|| AppError(ClimaError::NotFound(format!("no data yet for '{}'", id))))?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

/// Handler for GET /api/cities/{id}/snapshots
pub async fn snapshots_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let city = tracked(&state, &id)?;
    let entries = state.dashboard_service.snapshots(&city)?;
    Ok((StatusCode::OK, Json(entries)).into_response())
}

/// Handler for GET /api/cities/{id}/snapshots/{seq}
pub async fn snapshot_handler(
    State(state): State<AppState>,
    Path((id, seq)): Path<(String, u64)>,
) -> ApiResult<Response> {
    let city = tracked(&state, &id)?;
    let record = state
        .dashboard_service
        .snapshot(&city, seq)?
        .ok_or_else(|| AppError(ClimaError::NotFound(format!("snapshot {} of '{}' is not retained", seq, id))))?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

/// Handler for GET /api/cities/{id}/charts/{file}
pub async fn chart_handler(
    State(state): State<AppState>,
    Path((id, file)): Path<(String, String)>,
) -> ApiResult<Response> {
    if !is_chart_file(&file) {
        return Err(AppError(ClimaError::NotFound(format!("unknown chart '{}'", file))));
    }
    let city = tracked(&state, &id)?;
    let path = state.dashboard_service.repository().graphs_dir(&city.id)?.join(&file);

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError(ClimaError::NotFound(
            format!("chart '{}' not rendered yet for '{}'", file, id),
        ))),
        Err(e) => Err(AppError(ClimaError::persistence(&path, e))),
    }
}

/// Handler for GET /api/cities/{id}/report.md
pub async fn report_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let city = tracked(&state, &id)?;
    let latest = state.dashboard_service.latest(&city)?;
    let markdown = markdown_report(&city, latest.as_ref());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report_filename(&city)),
            ),
        ],
        markdown,
    )
        .into_response())
}
