//! Setup orchestrator
//!
//! Takes a setup through flavour selection, image availability, container start and
//! pod recording. Re-running it for the same setup converges on the same container and
//! pod record.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::backends::ContainerBackend;
use crate::channels::Broadcaster;
use crate::deploy::fsm::{FsmSettings, SetupEvent, SetupFsm};
use crate::errors::KabinetError;
use crate::models::{Deployment, Flavour, Pod, Setup};
use crate::services::pods::broadcast_pod;
use crate::storage::Store;
use crate::utils::sha256_hash;

/// Deterministic container name for a (setup, flavour) pair
pub fn container_name(setup_id: &str, flavour_id: &str) -> String {
    let digest = sha256_hash(format!("{}:{}", setup_id, flavour_id).as_bytes());
    format!("kabinet-{}", &digest[..16])
}

pub struct SetupOrchestrator {
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
    settings: FsmSettings,
    states: RwLock<HashMap<String, SetupFsm>>,
}

impl SetupOrchestrator {
    pub fn new(store: Arc<dyn Store>, broadcaster: Broadcaster, settings: FsmSettings) -> Self {
        Self {
            store,
            broadcaster,
            settings,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Last known state machine for a setup
    pub async fn state(&self, setup_id: &str) -> Option<SetupFsm> {
        self.states.read().await.get(setup_id).cloned()
    }

    /// Bring `setup` up on `backend` and return its pod
    pub async fn reconcile(
        &self,
        backend: &dyn ContainerBackend,
        setup: &Setup,
    ) -> Result<Pod, KabinetError> {
        info!("Reconciling setup {}", setup.id);
        let mut fsm = SetupFsm::new(setup.id.clone());
        self.save(&fsm).await;

        match self.drive(backend, setup, &mut fsm).await {
            Ok(pod) => {
                info!("Setup {} is running as pod {}", setup.id, pod.id);
                Ok(pod)
            }
            Err(e) => {
                error!("Setup {} failed in {:?}: {}", setup.id, fsm.state(), e);
                if !fsm.state().is_terminal() {
                    let _ = fsm.process(SetupEvent::Fail(e.to_string()));
                    self.save(&fsm).await;
                }
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        backend: &dyn ContainerBackend,
        setup: &Setup,
        fsm: &mut SetupFsm,
    ) -> Result<Pod, KabinetError> {
        let flavour = self.select_flavour(backend, setup).await?;
        self.advance(fsm, SetupEvent::SelectFlavour(flavour.id.clone()))
            .await?;

        self.ensure_image(backend, &flavour, fsm).await?;

        self.advance(
            fsm,
            SetupEvent::StartContainer(container_name(&setup.id, &flavour.id)),
        )
        .await?;
        let container_name = backend.ensure_container(setup, &flavour).await?;

        let pod = self
            .record_pod(backend, setup, &flavour, &container_name)
            .await?;
        self.advance(fsm, SetupEvent::RecordPod(pod.id.clone()))
            .await?;

        if let Err(e) = self.store.flush().await {
            error!("Failed to persist state after setup {}: {}", setup.id, e);
        }
        Ok(pod)
    }

    async fn select_flavour(
        &self,
        backend: &dyn ContainerBackend,
        setup: &Setup,
    ) -> Result<Flavour, KabinetError> {
        if let Some(flavour_id) = &setup.flavour_id {
            debug!("Setup {} pins flavour {}", setup.id, flavour_id);
            return self.store.get_flavour(flavour_id).await;
        }

        let release = self.store.get_release(&setup.release_id).await?;
        let selection = backend.get_fitting_flavour(&release).await?;
        Ok(selection.flavour)
    }

    async fn ensure_image(
        &self,
        backend: &dyn ContainerBackend,
        flavour: &Flavour,
        fsm: &mut SetupFsm,
    ) -> Result<(), KabinetError> {
        if backend.is_image_pulled(&flavour.image).await? {
            debug!("Image {} already present", flavour.image);
            return self.advance(fsm, SetupEvent::ImageReady).await;
        }

        // Subscribe before dispatching so the terminal update cannot be missed
        let mut updates = backend.watch_flavour(&flavour.id).await?;
        backend.pull_flavour(flavour).await?;
        self.advance(fsm, SetupEvent::PullDispatched).await?;

        let wait = async {
            while let Some(update) = updates.next().await {
                if update.is_pulled() {
                    return Ok(());
                }
                if update.is_failed() {
                    return Err(KabinetError::RuntimeError(format!(
                        "pull of {} failed",
                        flavour.image
                    )));
                }
                debug!("Pull of {} at {:.2}", flavour.image, update.progress);
            }
            Err(KabinetError::ChannelError(format!(
                "progress stream for flavour {} closed",
                flavour.id
            )))
        };

        tokio::time::timeout(self.settings.pull_timeout, wait)
            .await
            .map_err(|_| {
                KabinetError::OrchestrationError(format!(
                    "timed out after {:?} waiting for {}",
                    self.settings.pull_timeout, flavour.image
                ))
            })??;

        self.advance(fsm, SetupEvent::ImageReady).await
    }

    async fn record_pod(
        &self,
        backend: &dyn ContainerBackend,
        setup: &Setup,
        flavour: &Flavour,
        container_name: &str,
    ) -> Result<Pod, KabinetError> {
        let backend_id = backend.record().id.clone();

        let deployment = self
            .store
            .upsert_deployment(Deployment {
                id: crate::utils::generate_uuid(),
                flavour_id: flavour.id.clone(),
                backend_id: backend_id.clone(),
                local_id: container_name.to_string(),
                pulled: true,
                secret_params: serde_json::Map::new(),
                untyped_params: serde_json::Map::new(),
                created_at: Utc::now(),
            })
            .await?;

        let mut pod = Pod::new(backend_id, container_name, deployment.id);
        pod.setup_id = Some(setup.id.clone());
        let (pod, created) = self.store.get_or_create_pod(pod).await?;

        broadcast_pod(&self.broadcaster, &pod, created).await?;
        Ok(pod)
    }

    async fn advance(&self, fsm: &mut SetupFsm, event: SetupEvent) -> Result<(), KabinetError> {
        fsm.process(event).map_err(KabinetError::OrchestrationError)?;
        debug!("Setup {} -> {:?}", fsm.setup_id(), fsm.state());
        self.save(fsm).await;
        Ok(())
    }

    async fn save(&self, fsm: &SetupFsm) {
        self.states
            .write()
            .await
            .insert(fsm.setup_id().to_string(), fsm.clone());
    }
}
