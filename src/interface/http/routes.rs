use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::application::{CityService, DashboardService};

use super::assets::static_handler;
use super::handlers::{
    add_city_handler, chart_handler, dashboard_handler, health_handler, latest_handler,
    list_cities_handler, remove_city_handler, report_handler, search_handler, settings_handler,
    snapshot_handler, snapshots_handler, AppState,
};

pub fn create_router(city_service: Arc<CityService>, dashboard_service: Arc<DashboardService>) -> Router {
    let state = AppState {
        city_service,
        dashboard_service,
    };

    Router::new()
        // API routes
        .route("/api/health", get(health_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/search", get(search_handler))
        .route("/api/cities", get(list_cities_handler).post(add_city_handler))
        .route("/api/cities/{id}", delete(remove_city_handler))
        .route("/api/cities/{id}/latest", get(latest_handler))
        .route("/api/cities/{id}/snapshots", get(snapshots_handler))
        .route("/api/cities/{id}/snapshots/{seq}", get(snapshot_handler))
        .route("/api/cities/{id}/charts/{file}", get(chart_handler))
        .route("/api/cities/{id}/report.md", get(report_handler))
        .route("/api/settings", post(settings_handler))
        // Embedded dashboard page
        .fallback(static_handler)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
