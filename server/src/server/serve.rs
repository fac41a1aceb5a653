//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::KabinetError;
use crate::server::handlers::*;
use crate::server::state::ServerState;

/// Build the router without binding it
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Local backend and agent registration
        .route("/backend", get(backend_handler))
        .route("/backends", post(declare_backend_handler))
        .route("/backends/{id}/heartbeat", post(heartbeat_handler))
        .route("/backends/{id}/resources", post(declare_resource_handler))
        .route("/backends/{id}/deployments", post(create_deployment_handler))
        .route("/backends/{id}/pods", post(create_pod_handler))
        // Catalog
        .route("/releases", post(create_release_handler))
        .route("/releases/{id}", get(get_release_handler))
        .route("/releases/{id}/fitting-flavour", get(fitting_flavour_handler))
        .route("/flavours/events", get(all_flavour_events_handler))
        .route("/flavours/{id}/rate", get(rate_flavour_handler))
        .route("/flavours/{id}/pull", post(pull_flavour_handler))
        .route("/flavours/{id}/events", get(flavour_events_handler))
        // Setups
        .route("/setups", post(create_setup_handler))
        .route("/setups/{id}", get(get_setup_handler))
        .route("/setups/{id}/deploy", post(deploy_setup_handler))
        // Pods
        .route("/pods", get(list_pods_handler))
        .route("/pods/events", get(all_pod_events_handler))
        .route("/pods/{id}", get(get_pod_handler))
        .route("/pods/{id}/status", get(pod_status_handler).put(update_pod_handler))
        .route("/pods/{id}/logs", get(pod_logs_handler))
        .route("/pods/{id}/dump-logs", post(dump_logs_handler))
        .route("/pods/{id}/events", get(pod_events_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), KabinetError>>, KabinetError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| KabinetError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| KabinetError::ServerError(e.to_string()))
    });

    Ok(handle)
}
