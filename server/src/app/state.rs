//! Application state management

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::backends::docker::{self, DockerCli};
use crate::backends::runtime::ContainerRuntime;
use crate::backends::{ContainerBackend, DockerBackend, UnsupportedBackend};
use crate::channels::{Broadcaster, ChannelLayer, DispatchTable, Dispatcher, JobKind, BACKEND_INBOX};
use crate::errors::KabinetError;
use crate::flavours::Capabilities;
use crate::models::BackendKind;
use crate::services::agents::{declare_backend, DeclareBackendInput};
use crate::storage::{MemoryStore, Store};

/// Main application state
pub struct AppState {
    /// Persistent records
    pub store: Arc<dyn Store>,

    /// In-process channel layer shared by broadcasts and the dispatch inbox
    pub layer: Arc<ChannelLayer>,

    pub broadcaster: Broadcaster,

    pub dispatcher: Dispatcher,

    /// The backend this process drives
    pub backend: Arc<dyn ContainerBackend>,

    /// Handlers the backend worker resolves calls against
    pub dispatch_table: Arc<DispatchTable>,
}

impl AppState {
    /// Initialize application state from disk and the host
    pub async fn init(
        options: &AppOptions,
    ) -> Result<(Self, mpsc::Receiver<serde_json::Value>), KabinetError> {
        info!("Initializing application state...");

        options.layout.setup().await?;
        let store = Arc::new(MemoryStore::open(options.layout.state_file()).await?);

        let capabilities = Capabilities::detect(&options.capabilities).await;
        info!(
            "Detected {} CPUs, {} MiB RAM, GPU: {}, ROCm: {}",
            capabilities.cpu_count,
            capabilities.memory_mb,
            capabilities.gpu_available(),
            capabilities.rocm_available
        );

        let runtime = Arc::new(DockerCli::new(options.docker_binary.clone()));
        Self::build(options, store, runtime, capabilities).await
    }

    /// Wire the state around an existing store and runtime.
    ///
    /// Returns the receiving end of the backend inbox; hand it to the backend worker.
    pub async fn build(
        options: &AppOptions,
        store: Arc<dyn Store>,
        runtime: Arc<dyn ContainerRuntime>,
        capabilities: Capabilities,
    ) -> Result<(Self, mpsc::Receiver<serde_json::Value>), KabinetError> {
        let layer = Arc::new(ChannelLayer::new());
        let inbox = layer.bind_inbox(BACKEND_INBOX).await;
        let broadcaster = Broadcaster::new(layer.clone());
        let dispatcher = Dispatcher::new(layer.clone());

        let record = declare_backend(
            store.as_ref(),
            DeclareBackendInput {
                instance_id: options.backend.instance_id.clone(),
                kind: options.backend.kind,
                name: options.backend.name.clone(),
                user: options.backend.user.clone(),
                client: options.backend.client.clone(),
            },
        )
        .await?;

        let (backend, dispatch_table): (Arc<dyn ContainerBackend>, DispatchTable) = match record.kind
        {
            BackendKind::Docker => {
                let docker = Arc::new(DockerBackend::new(
                    record,
                    capabilities,
                    options.docker.clone(),
                    docker::Deps {
                        runtime,
                        store: store.clone(),
                        broadcaster: broadcaster.clone(),
                        dispatcher: dispatcher.clone(),
                    },
                ));
                let table = DispatchTable::new().register(JobKind::PullFlavour, docker.clone());
                table.verify()?;
                (docker as Arc<dyn ContainerBackend>, table)
            }
            kind => {
                warn!("{} backends only support registration; operations will be rejected", kind);
                let backend: Arc<dyn ContainerBackend> =
                    Arc::new(UnsupportedBackend::new(record, capabilities));
                (backend, DispatchTable::new())
            }
        };

        let state = Self {
            store,
            layer,
            broadcaster,
            dispatcher,
            backend,
            dispatch_table: Arc::new(dispatch_table),
        };
        Ok((state, inbox))
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), KabinetError> {
        info!("Shutting down application state...");
        self.store.flush().await
    }
}
