use std::any::Any;
use std::sync::Arc;

use crate::controller::{health_check_controller, stats_controller, user_controller};
use crate::error::ErrorBody;
use crate::middleware::rate_limit::{rate_limit, IpRateLimiter};
use crate::middleware::request_logger::log_request;
use crate::middleware::security_headers::add_security_headers;
use crate::params::user::{BatchCreateParams, BatchDeleteParams, UpdateParams};
use crate::response::{
    AnalyticsReport, BatchCreated, BatchDeleted, Deleted, Health, HttpStats, Metrics,
    SearchResults, Stats,
};
use crate::ws::handler as ws_handler;
use crate::AppState;
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use log::*;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "User Hub API"
        ),
        paths(
            user_controller::index,
            user_controller::create,
            user_controller::read,
            user_controller::update,
            user_controller::delete,
            user_controller::activate,
            user_controller::deactivate,
            user_controller::batch_create,
            user_controller::batch_delete,
            user_controller::search,
            user_controller::export,
            user_controller::analytics,
            stats_controller::stats,
            stats_controller::metrics,
            health_check_controller::health_check,
            ws_handler::ws_handler,
        ),
        components(
            schemas(
                domain::users::Model,
                domain::NewUser,
                domain::Analytics,
                UpdateParams,
                BatchCreateParams,
                BatchDeleteParams,
                BatchCreated,
                BatchDeleted,
                SearchResults,
                Deleted,
                AnalyticsReport,
                Health,
                HttpStats,
                Stats,
                Metrics,
            )
        ),
        tags(
            (name = "user_hub", description = "User management with live WebSocket notifications")
        )
    )]
struct ApiDoc;

/// Builds every route of the service wrapped in the shared middleware stack.
///
/// Layers run outermost first: panic recovery, CORS, security headers,
/// request logging, then rate limiting right in front of the handlers.
pub fn define_routes(app_state: AppState) -> Router {
    let limiter = Arc::new(IpRateLimiter::new(
        app_state.config.rate_limit_per_second,
        app_state.config.rate_limit_burst,
    ));
    limiter.spawn_cleanup();

    let cors = cors_layer(&app_state);

    Router::new()
        .merge(user_routes(app_state.clone()))
        .merge(stats_routes(app_state.clone()))
        .merge(health_routes(app_state.clone()))
        .merge(ws_routes(app_state.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(from_fn_with_state(limiter, rate_limit))
        .layer(from_fn_with_state(app_state, log_request))
        .layer(from_fn(add_security_headers))
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
}

fn user_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/api/users",
            get(user_controller::index).post(user_controller::create),
        )
        .route(
            "/api/users/batch",
            post(user_controller::batch_create)
                .delete(user_controller::batch_delete),
        )
        .route("/api/users/search", get(user_controller::search))
        .route("/api/users/export", get(user_controller::export))
        .route("/api/users/analytics", get(user_controller::analytics))
        .route(
            "/api/users/{id}",
            get(user_controller::read)
                .put(user_controller::update)
                .delete(user_controller::delete),
        )
        .route(
            "/api/users/{id}/activate",
            patch(user_controller::activate),
        )
        .route(
            "/api/users/{id}/deactivate",
            patch(user_controller::deactivate),
        )
        .with_state(app_state)
}

fn stats_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/stats", get(stats_controller::stats))
        .route("/api/metrics", get(stats_controller::metrics))
        .with_state(app_state)
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::ws_handler))
        .with_state(app_state)
}

fn cors_layer(app_state: &AppState) -> CorsLayer {
    let origins = if app_state.config.allows_any_origin() {
        AllowOrigin::from(AnyOrigin)
    } else {
        let origins: Vec<HeaderValue> = app_state
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Ignoring invalid CORS origin {origin:?}: {e}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Request handler panicked: {detail}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error occurred",
        )),
    )
        .into_response()
}
