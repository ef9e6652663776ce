use crate::controller::ApiResponse;
use crate::response::{format_uptime, HttpStats, Metrics, Stats};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use domain::user as UserApi;

use log::*;

/// GET request counters, store figures and the number of connected WebSocket clients
#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Successfully retrieved server statistics", body = Stats),
    )
)]
pub async fn stats(State(app_state): State<AppState>) -> impl IntoResponse {
    let analytics = UserApi::analytics(app_state.user_store_ref());
    let metrics = &app_state.request_metrics;
    let websocket = app_state.hub.stats();

    debug!(
        "Stats: {} request(s), {} WebSocket client(s)",
        metrics.total_requests(),
        websocket.total_clients
    );

    Json(ApiResponse::new(
        StatusCode::OK.into(),
        Stats {
            http: HttpStats {
                total_requests: metrics.total_requests(),
                total_users: analytics.total_users,
                active_users: analytics.active_users,
                users_by_country: analytics.users_by_country,
                requests_by_path: metrics.requests_by_path(),
                avg_response_time_ms: metrics.average_response_time_ms(),
                start_time: app_state.started_at,
                uptime: format_uptime(app_state.uptime()),
            },
            websocket,
        },
    ))
}

/// GET per-route timing figures
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses(
        (status = 200, description = "Successfully retrieved per-route metrics", body = Metrics),
    )
)]
pub async fn metrics(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::new(
        StatusCode::OK.into(),
        Metrics {
            metrics: app_state.request_metrics.snapshot(),
            timestamp: Utc::now(),
        },
    ))
}
