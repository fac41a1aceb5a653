//! Docker backend

pub mod cli;
pub mod status;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::backends::progress::PullProgress;
use crate::backends::runtime::{ContainerRuntime, ContainerSpec, RunOutcome};
use crate::backends::{ContainerBackend, FlavourUpdates};
use crate::channels::{
    Broadcaster, CallEnvelope, Dispatcher, Job, JobHandler, JobKind, ALL_GROUP, FLAVOUR_CHANNEL,
};
use crate::deploy::fsm::FsmSettings;
use crate::deploy::SetupOrchestrator;
use crate::errors::{KabinetError, RateError};
use crate::flavours::{rating, Capabilities, Selection, SelectionOrder};
use crate::models::{Backend, BackendKind, Flavour, Pod, PodStatus, Release, Setup};
use crate::storage::Store;
use kabinet_messages::{FlavourUpdate, PullUpdate};

pub use crate::deploy::orchestrator::container_name;
pub use cli::DockerCli;

/// Docker backend options
#[derive(Debug, Clone)]
pub struct Options {
    /// Network every container joins
    pub network: String,

    pub selection_order: SelectionOrder,

    pub fsm: FsmSettings,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            network: "bridge".to_string(),
            selection_order: SelectionOrder::default(),
            fsm: FsmSettings::default(),
        }
    }
}

/// Shared services the docker backend talks to
#[derive(Clone)]
pub struct Deps {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub store: Arc<dyn Store>,
    pub broadcaster: Broadcaster,
    pub dispatcher: Dispatcher,
}

pub struct DockerBackend {
    record: Backend,
    capabilities: Capabilities,
    options: Options,
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
    dispatcher: Dispatcher,
    orchestrator: SetupOrchestrator,
}

impl DockerBackend {
    pub fn new(record: Backend, capabilities: Capabilities, options: Options, deps: Deps) -> Self {
        let orchestrator = SetupOrchestrator::new(
            deps.store.clone(),
            deps.broadcaster.clone(),
            options.fsm.clone(),
        );
        Self {
            record,
            capabilities,
            options,
            runtime: deps.runtime,
            store: deps.store,
            broadcaster: deps.broadcaster,
            dispatcher: deps.dispatcher,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &SetupOrchestrator {
        &self.orchestrator
    }

    async fn publish_progress(&self, flavour: &Flavour, update: PullUpdate) {
        self.publish_update(&flavour.id, update).await;
    }

    async fn publish_update(&self, flavour_id: &str, update: PullUpdate) {
        let message = FlavourUpdate::new(flavour_id, update);
        if let Err(e) = self
            .broadcaster
            .publish(FLAVOUR_CHANNEL, &message, &[flavour_id, ALL_GROUP])
            .await
        {
            warn!("Failed to publish progress for {}: {}", flavour_id, e);
        }
    }

    /// Pull the flavour's image, broadcasting progress. Runs on the backend worker.
    pub async fn run_pull(&self, flavour: &Flavour) -> Result<(), KabinetError> {
        self.publish_progress(flavour, PullUpdate::pulling(0.5)).await;

        let mut progress = PullProgress::new();
        match self.pull_layers(flavour, &mut progress).await {
            Ok(()) => {
                self.publish_progress(flavour, PullUpdate::pulled()).await;
                Ok(())
            }
            Err(e) => {
                self.publish_progress(flavour, PullUpdate::failed(progress.value()))
                    .await;
                Err(e)
            }
        }
    }

    async fn pull_layers(
        &self,
        flavour: &Flavour,
        progress: &mut PullProgress,
    ) -> Result<(), KabinetError> {
        if self.runtime.image_exists(&flavour.image).await? {
            debug!("Image {} already present, nothing to pull", flavour.image);
            return Ok(());
        }

        let mut events = self.runtime.pull_image(&flavour.image).await?;
        while let Some(event) = events.next().await {
            if let Some(value) = progress.observe(&event?) {
                self.publish_progress(flavour, PullUpdate::pulling(value))
                    .await;
            }
        }

        info!("Pulled image {} for flavour {}", flavour.image, flavour.name);
        Ok(())
    }
}

#[async_trait]
impl JobHandler for DockerBackend {
    async fn handle(&self, call: &CallEnvelope) -> Result<(), KabinetError> {
        match call.function_name.parse::<JobKind>()? {
            JobKind::PullFlavour => {
                let flavour_id = call.str_arg("flavour_id", 0)?;
                let flavour = match self.store.get_flavour(flavour_id).await {
                    Ok(flavour) => flavour,
                    Err(e) => {
                        // Waiters on this flavour still get a terminal update
                        self.publish_update(flavour_id, PullUpdate::failed(0.0)).await;
                        return Err(e);
                    }
                };
                self.run_pull(&flavour).await
            }
        }
    }
}

#[async_trait]
impl ContainerBackend for DockerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Docker
    }

    fn record(&self) -> &Backend {
        &self.record
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn pull_flavour(&self, flavour: &Flavour) -> Result<(), KabinetError> {
        self.dispatcher
            .dispatch(Job::PullFlavour {
                flavour_id: flavour.id.clone(),
            })
            .await
    }

    async fn is_image_pulled(&self, image: &str) -> Result<bool, KabinetError> {
        self.runtime.image_exists(image).await
    }

    async fn rate_flavour(&self, flavour: &Flavour) -> Result<u64, KabinetError> {
        let present = self.runtime.image_exists(&flavour.image).await?;
        Ok(rating::rate_flavour(flavour, &self.capabilities, present)?)
    }

    async fn get_fitting_flavour(&self, release: &Release) -> Result<Selection, KabinetError> {
        let flavours = self.store.list_flavours(&release.id).await?;

        let mut rated: Vec<(Flavour, Result<u64, RateError>)> = Vec::with_capacity(flavours.len());
        for flavour in flavours {
            let outcome = match self.rate_flavour(&flavour).await {
                Ok(score) => Ok(score),
                Err(KabinetError::RateError(e)) => Err(e),
                Err(e) => return Err(e),
            };
            rated.push((flavour, outcome));
        }

        let selection = rating::select_flavour(&release.id, rated, self.options.selection_order)?;
        info!(
            "Selected flavour {} (score {}) for {} {}",
            selection.flavour.name, selection.score, release.app, release.version
        );
        for rejection in &selection.rejections {
            debug!("Rejected {}", rejection);
        }
        Ok(selection)
    }

    async fn up_setup(&self, setup: &Setup) -> Result<Pod, KabinetError> {
        self.orchestrator.reconcile(self, setup).await
    }

    async fn ensure_container(&self, setup: &Setup, flavour: &Flavour) -> Result<String, KabinetError> {
        let name = container_name(&setup.id, &flavour.id);

        if let Some(info) = self.runtime.inspect_container(&name).await? {
            debug!("Container {} exists ({})", name, info.state);
            return Ok(name);
        }

        let networks = self.runtime.list_networks().await?;
        if !networks.iter().any(|n| n == &self.options.network) {
            return Err(KabinetError::RuntimeError(format!(
                "network {} does not exist",
                self.options.network
            )));
        }

        let mut labels = HashMap::new();
        labels.insert("kabinet.setup".to_string(), setup.id.clone());
        labels.insert("kabinet.flavour".to_string(), flavour.id.clone());

        let spec = ContainerSpec {
            name: name.clone(),
            image: flavour.image.clone(),
            command: setup.command.clone(),
            env: setup.container_env(),
            network: self.options.network.clone(),
            labels,
            extra_args: flavour
                .selectors
                .iter()
                .flat_map(|s| s.docker_params())
                .collect(),
        };

        match self.runtime.run_container(&spec).await? {
            RunOutcome::Created(id) => info!("Started container {} ({})", name, id),
            RunOutcome::AlreadyExists => {
                info!("Container {} was created concurrently, reusing it", name)
            }
        }
        Ok(name)
    }

    async fn get_status(&self, pod: &Pod) -> Result<PodStatus, KabinetError> {
        match self.runtime.inspect_container(&pod.pod_id).await? {
            Some(info) => Ok(status::pod_status(&info.state, info.exit_code)),
            None => Ok(PodStatus::Unknown),
        }
    }

    async fn get_logs(&self, pod: &Pod) -> Result<String, KabinetError> {
        Ok(self
            .runtime
            .container_logs(&pod.pod_id)
            .await?
            .unwrap_or_default())
    }

    async fn watch_flavour(&self, flavour_id: &str) -> Result<FlavourUpdates, KabinetError> {
        Ok(self
            .broadcaster
            .listen(FLAVOUR_CHANNEL, &[flavour_id])
            .await)
    }

    async fn watch_flavours(&self) -> Result<FlavourUpdates, KabinetError> {
        Ok(self.broadcaster.listen(FLAVOUR_CHANNEL, &[ALL_GROUP]).await)
    }
}
