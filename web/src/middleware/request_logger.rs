use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use log::*;

use crate::AppState;

/// Metrics key shared by every request that matched no route.
pub(crate) const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Times every request, records it in the shared request metrics and logs
/// one line per request. Requests are keyed by their route template so
/// `/api/users/1` and `/api/users/2` count as `/api/users/{id}`, and every
/// unknown path counts as `UNMATCHED_ROUTE`.
pub(crate) async fn log_request(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri_path = request.uri().path().to_owned();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned());

    let mut response = next.run(request).await;

    let elapsed = started.elapsed();
    app_state
        .request_metrics
        .record(route.as_deref().unwrap_or(UNMATCHED_ROUTE), elapsed);

    info!(
        "{method} {uri_path} {} {:.3}ms",
        response.status().as_u16(),
        elapsed.as_secs_f64() * 1000.0
    );

    if let Ok(value) = HeaderValue::from_str(&format!("{}us", elapsed.as_micros())) {
        response.headers_mut().insert("x-response-time", value);
    }

    response
}
