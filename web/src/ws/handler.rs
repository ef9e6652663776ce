use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use hub::pump::{read_pump, write_pump};
use log::*;
use service::AppState;

use crate::error::ErrorBody;

/// Upgrades the request to a WebSocket and attaches it to the notification
/// hub. Connections from any origin are accepted.
#[utoipa::path(
    get,
    path = "/ws",
    responses(
        (status = 101, description = "Switching to the WebSocket protocol"),
        (status = 400, description = "Not a valid WebSocket upgrade request"),
        (status = 503, description = "Notification hub is shutting down"),
    )
)]
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> Response {
    if !app_state.hub.is_running() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Notification hub is unavailable",
            )),
        )
            .into_response();
    }

    ws.on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {e}"))
        .on_upgrade(move |socket| serve_socket(socket, app_state))
}

async fn serve_socket(socket: WebSocket, app_state: AppState) {
    let hub = app_state.hub.clone();
    let timing = app_state.config.pump_config();
    let (client, connection) = hub.new_client();
    let client_id = connection.id.clone();

    if let Err(e) = hub.register(client).await {
        warn!("Rejecting WebSocket client {client_id}: {e}");
        return;
    }
    info!("WebSocket client {client_id} connected");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_pump(
        sink,
        connection.outbound,
        connection.transport.clone(),
        timing,
    ));

    read_pump(hub, client_id.clone(), stream, connection.transport, timing).await;

    if let Err(e) = writer.await {
        error!("Write pump for {client_id} panicked: {e}");
    }
    info!("WebSocket client {client_id} disconnected");
}
