use crate::controller::ApiResponse;
use crate::response::{format_uptime, Health};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

/// GET the liveness of the service along with a short summary of the store
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "API router is up and responding to requests", body = Health),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let store = app_state.user_store_ref();

    Json(ApiResponse::new(
        StatusCode::OK.into(),
        Health {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            uptime: format_uptime(app_state.uptime()),
            total_users: store.count(),
            active_users: store.active_count(),
        },
    ))
}
