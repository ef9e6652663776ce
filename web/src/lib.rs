//! HTTP and WebSocket surface of the user hub.
//!
//! `define_routes` assembles the REST API, the `/ws` upgrade endpoint and the
//! OpenAPI viewer behind the shared middleware stack; `init_server` binds
//! the listener and runs it until a termination signal arrives.

use std::net::SocketAddr;

use log::*;
use tokio::net::TcpListener;
use tokio::signal;

pub use error::{Error, Result};
pub use service::AppState;

mod controller;
mod error;
mod middleware;
mod params;
mod response;
pub mod router;
mod ws;

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let listen_address = app_state.config.listen_address();
    info!(
        "Server starting... listening for connections on http://{listen_address} [{}]",
        app_state.config.runtime_env()
    );

    let listener = TcpListener::bind(&listen_address).await?;
    let shutdown_timeout = app_state.config.shutdown_timeout();
    let hub = app_state.hub.clone();
    let (drain_tx, mut drain_rx) = tokio::sync::watch::channel(false);

    let app = router::define_routes(app_state);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("Shutting down server...");
        // Close every WebSocket first so in-flight upgrades do not hold the drain open
        hub.shutdown().await;
        let _ = drain_tx.send(true);
    });

    let server = std::future::IntoFuture::into_future(server);
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = async {
            let _ = drain_rx.wait_for(|draining| *draining).await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!("Server did not drain within {}s, forcing exit", shutdown_timeout.as_secs());
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
