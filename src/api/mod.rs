//! Bridge HTTP Server
//!
//! HTTP layer for the bridge, built with Axum.
//!
//! # Endpoints
//!
//! ## WebSocket
//! - `GET /websocket/bot` - Event channel (path configurable)
//! - `GET /websocket/minecraft` - Heartbeat channel (path configurable)
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health` - Connected and known servers
//!
//! # Example
//!
//! ```rust,ignore
//! use server_bridge::api::{serve, AppState};
//! use server_bridge::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (config, _source) = Config::load_default();
//!     let state = AppState::from_config(&config).await?;
//!     serve(state).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::websocket::{event_channel_handler, heartbeat_channel_handler};

/// Build the router with both WebSocket channels and the health routes
pub fn build_router(state: AppState) -> Router {
    let event_path = state.server.event_path.clone();
    let heartbeat_path = state.server.heartbeat_path.clone();

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .route(&event_path, get(event_channel_handler))
        .route(&heartbeat_path, get(heartbeat_channel_handler))
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Bind the listening socket
///
/// Failure here is a fatal startup precondition for the binary.
pub async fn bind(addr: &str) -> ApiResult<TcpListener> {
    TcpListener::bind(addr).await.map_err(|source| ApiError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Bind the configured address and serve until a shutdown signal
pub async fn serve(state: AppState) -> ApiResult<()> {
    let listener = bind(&state.server.addr()).await?;
    serve_on(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` completes
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> ApiResult<()> {
    let addr = listener.local_addr()?;
    tracing::info!(
        event_path = %state.server.event_path,
        heartbeat_path = %state.server.heartbeat_path,
        "Bridge listening on {}",
        addr
    );

    let router = build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Bridge shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
