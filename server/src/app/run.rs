//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::KabinetError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::{backend_worker, status_poller};

/// Run the Kabinet control plane
pub async fn run(
    version: String,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), KabinetError> {
    info!("Initializing Kabinet {}...", version);

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start Kabinet: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, KabinetError> {
    let (app_state, inbox) = AppState::init(options).await?;
    let app_state = Arc::new(app_state);
    shutdown_manager.with_app_state(app_state.clone())?;

    if options.enable_backend_worker {
        init_backend_worker(
            inbox,
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    } else {
        // With the inbox closed, dispatching a pull fails immediately
        drop(inbox);
        warn!("Backend worker disabled; image pulls will be rejected");
    }

    if options.enable_poller {
        init_status_poller(
            options.poller.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if options.enable_http_server {
        init_http_server(
            options,
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )
        .await?;
    }

    Ok(app_state)
}

fn init_backend_worker(
    inbox: mpsc::Receiver<serde_json::Value>,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), KabinetError> {
    info!("Initializing backend worker...");

    let table = app_state.dispatch_table.clone();
    let broadcaster = app_state.broadcaster.clone();

    let handle = tokio::spawn(async move {
        backend_worker::run(
            inbox,
            table.as_ref(),
            &broadcaster,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_backend_worker_handle(handle)
}

fn init_status_poller(
    options: status_poller::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), KabinetError> {
    info!("Initializing status poller...");

    let backend = app_state.backend.clone();
    let store = app_state.store.clone();
    let broadcaster = app_state.broadcaster.clone();

    let handle = tokio::spawn(async move {
        status_poller::run(
            &options,
            backend,
            store,
            broadcaster,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_poller_handle(handle)
}

async fn init_http_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), KabinetError> {
    info!("Initializing local HTTP server...");

    let server_state = ServerState::new(
        app_state.store.clone(),
        app_state.backend.clone(),
        app_state.broadcaster.clone(),
    );

    let handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_http_server_handle(handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    http_server_handle: Option<JoinHandle<Result<(), KabinetError>>>,
    backend_worker_handle: Option<JoinHandle<()>>,
    poller_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            http_server_handle: None,
            backend_worker_handle: None,
            poller_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), KabinetError> {
        if self.app_state.is_some() {
            return Err(KabinetError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_backend_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), KabinetError> {
        if self.backend_worker_handle.is_some() {
            return Err(KabinetError::ShutdownError(
                "backend_worker_handle already set".to_string(),
            ));
        }
        self.backend_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_poller_handle(&mut self, handle: JoinHandle<()>) -> Result<(), KabinetError> {
        if self.poller_handle.is_some() {
            return Err(KabinetError::ShutdownError("poller_handle already set".to_string()));
        }
        self.poller_handle = Some(handle);
        Ok(())
    }

    pub fn with_http_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), KabinetError>>,
    ) -> Result<(), KabinetError> {
        if self.http_server_handle.is_some() {
            return Err(KabinetError::ShutdownError("server_handle already set".to_string()));
        }
        self.http_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), KabinetError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), KabinetError> {
        info!("Shutting down Kabinet...");

        // 1. HTTP server, so no new work arrives
        if let Some(handle) = self.http_server_handle.take() {
            handle
                .await
                .map_err(|e| KabinetError::ShutdownError(e.to_string()))??;
        }

        // 2. Status poller
        if let Some(handle) = self.poller_handle.take() {
            handle
                .await
                .map_err(|e| KabinetError::ShutdownError(e.to_string()))?;
        }

        // 3. Backend worker
        if let Some(handle) = self.backend_worker_handle.take() {
            handle
                .await
                .map_err(|e| KabinetError::ShutdownError(e.to_string()))?;
        }

        // 4. App state, flushes the store snapshot
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
