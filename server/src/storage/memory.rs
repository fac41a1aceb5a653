//! In-memory store with an optional JSON snapshot

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::KabinetError;
use crate::filesys::file::File;
use crate::models::{Backend, Deployment, Flavour, LogDump, Pod, PodStatus, Release, Resource, Setup};
use crate::storage::store::Store;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    releases: HashMap<String, Release>,
    /// Kept as a list so ingestion order survives snapshots
    #[serde(default)]
    flavours: Vec<Flavour>,
    #[serde(default)]
    backends: HashMap<String, Backend>,
    #[serde(default)]
    resources: HashMap<String, Resource>,
    #[serde(default)]
    deployments: HashMap<String, Deployment>,
    #[serde(default)]
    setups: HashMap<String, Setup>,
    #[serde(default)]
    pods: HashMap<String, Pod>,
    #[serde(default)]
    log_dumps: HashMap<String, LogDump>,
}

fn not_found(entity: &str, id: &str) -> KabinetError {
    KabinetError::NotFound(format!("{} {}", entity, id))
}

/// Store backed by tokio `RwLock`-guarded maps
pub struct MemoryStore {
    state: RwLock<StoreState>,
    snapshot: Option<File>,
}

impl MemoryStore {
    /// An empty store that never touches disk
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            snapshot: None,
        }
    }

    /// Load the snapshot if it exists; `flush` writes back to the same file
    pub async fn open(snapshot: File) -> Result<Self, KabinetError> {
        let state: StoreState = snapshot.read_json_or_default().await.map_err(|e| {
            KabinetError::StorageError(format!(
                "failed to load snapshot {}: {}",
                snapshot.path().display(),
                e
            ))
        })?;
        info!(
            "Loaded store snapshot from {} ({} pods, {} setups)",
            snapshot.path().display(),
            state.pods.len(),
            state.setups.len()
        );
        Ok(Self {
            state: RwLock::new(state),
            snapshot: Some(snapshot),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_release(&self, release: Release) -> Result<Release, KabinetError> {
        let mut state = self.state.write().await;
        let existing = state
            .releases
            .values_mut()
            .find(|r| r.app == release.app && r.version == release.version);

        if let Some(existing) = existing {
            existing.scopes = release.scopes;
            existing.logo = release.logo;
            existing.entrypoint = release.entrypoint;
            return Ok(existing.clone());
        }

        state.releases.insert(release.id.clone(), release.clone());
        Ok(release)
    }

    async fn get_release(&self, id: &str) -> Result<Release, KabinetError> {
        let state = self.state.read().await;
        state
            .releases
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("release", id))
    }

    async fn upsert_flavour(&self, flavour: Flavour) -> Result<Flavour, KabinetError> {
        let mut state = self.state.write().await;
        let existing = state
            .flavours
            .iter_mut()
            .find(|f| f.release_id == flavour.release_id && f.name == flavour.name);

        if let Some(existing) = existing {
            existing.image = flavour.image;
            existing.selectors = flavour.selectors;
            existing.builder = flavour.builder;
            existing.manifest = flavour.manifest;
            existing.requirements = flavour.requirements;
            return Ok(existing.clone());
        }

        state.flavours.push(flavour.clone());
        Ok(flavour)
    }

    async fn get_flavour(&self, id: &str) -> Result<Flavour, KabinetError> {
        let state = self.state.read().await;
        state
            .flavours
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| not_found("flavour", id))
    }

    async fn list_flavours(&self, release_id: &str) -> Result<Vec<Flavour>, KabinetError> {
        let state = self.state.read().await;
        Ok(state
            .flavours
            .iter()
            .filter(|f| f.release_id == release_id)
            .cloned()
            .collect())
    }

    async fn upsert_backend(&self, backend: Backend) -> Result<Backend, KabinetError> {
        let mut state = self.state.write().await;
        let existing = state.backends.values_mut().find(|b| {
            b.instance_id == backend.instance_id && b.user == backend.user && b.client == backend.client
        });

        if let Some(existing) = existing {
            existing.kind = backend.kind;
            existing.name = backend.name;
            existing.last_heartbeat = backend.last_heartbeat;
            return Ok(existing.clone());
        }

        state.backends.insert(backend.id.clone(), backend.clone());
        Ok(backend)
    }

    async fn get_backend(&self, id: &str) -> Result<Backend, KabinetError> {
        let state = self.state.read().await;
        state
            .backends
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("backend", id))
    }

    async fn touch_backend(&self, id: &str) -> Result<Backend, KabinetError> {
        let mut state = self.state.write().await;
        let backend = state
            .backends
            .get_mut(id)
            .ok_or_else(|| not_found("backend", id))?;
        backend.last_heartbeat = Utc::now();
        Ok(backend.clone())
    }

    async fn upsert_resource(&self, resource: Resource) -> Result<Resource, KabinetError> {
        let mut state = self.state.write().await;
        let existing = state.resources.values_mut().find(|r| {
            r.backend_id == resource.backend_id && r.resource_id == resource.resource_id
        });

        if let Some(existing) = existing {
            existing.name = resource.name;
            existing.qualifiers = resource.qualifiers;
            return Ok(existing.clone());
        }

        state.resources.insert(resource.id.clone(), resource.clone());
        Ok(resource)
    }

    async fn get_resource(&self, id: &str) -> Result<Resource, KabinetError> {
        let state = self.state.read().await;
        state
            .resources
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("resource", id))
    }

    async fn upsert_deployment(&self, deployment: Deployment) -> Result<Deployment, KabinetError> {
        let mut state = self.state.write().await;
        let existing = state.deployments.values_mut().find(|d| {
            d.flavour_id == deployment.flavour_id
                && d.backend_id == deployment.backend_id
                && d.local_id == deployment.local_id
        });

        if let Some(existing) = existing {
            existing.pulled = existing.pulled || deployment.pulled;
            existing.secret_params = deployment.secret_params;
            existing.untyped_params = deployment.untyped_params;
            return Ok(existing.clone());
        }

        state
            .deployments
            .insert(deployment.id.clone(), deployment.clone());
        Ok(deployment)
    }

    async fn get_deployment(&self, id: &str) -> Result<Deployment, KabinetError> {
        let state = self.state.read().await;
        state
            .deployments
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("deployment", id))
    }

    async fn list_deployments(&self, backend_id: Option<&str>) -> Result<Vec<Deployment>, KabinetError> {
        let state = self.state.read().await;
        let mut deployments: Vec<Deployment> = state
            .deployments
            .values()
            .filter(|d| backend_id.is_none_or(|b| d.backend_id == b))
            .cloned()
            .collect();
        deployments.sort_by_key(|d| d.created_at);
        Ok(deployments)
    }

    async fn insert_setup(&self, setup: Setup) -> Result<Setup, KabinetError> {
        let mut state = self.state.write().await;
        if state.setups.contains_key(&setup.id) {
            return Err(KabinetError::ValidationError(format!(
                "setup {} already exists",
                setup.id
            )));
        }
        state.setups.insert(setup.id.clone(), setup.clone());
        Ok(setup)
    }

    async fn get_setup(&self, id: &str) -> Result<Setup, KabinetError> {
        let state = self.state.read().await;
        state
            .setups
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("setup", id))
    }

    async fn get_or_create_pod(&self, pod: Pod) -> Result<(Pod, bool), KabinetError> {
        let mut state = self.state.write().await;
        let existing = state
            .pods
            .values()
            .find(|p| p.backend_id == pod.backend_id && p.pod_id == pod.pod_id);

        if let Some(existing) = existing {
            debug!("Pod {} already recorded as {}", pod.pod_id, existing.id);
            return Ok((existing.clone(), false));
        }

        state.pods.insert(pod.id.clone(), pod.clone());
        Ok((pod, true))
    }

    async fn get_pod(&self, id: &str) -> Result<Pod, KabinetError> {
        let state = self.state.read().await;
        state.pods.get(id).cloned().ok_or_else(|| not_found("pod", id))
    }

    async fn list_pods(&self, backend_id: Option<&str>) -> Result<Vec<Pod>, KabinetError> {
        let state = self.state.read().await;
        let mut pods: Vec<Pod> = state
            .pods
            .values()
            .filter(|p| backend_id.is_none_or(|b| p.backend_id == b))
            .cloned()
            .collect();
        pods.sort_by_key(|p| p.created_at);
        Ok(pods)
    }

    async fn update_pod_status(&self, id: &str, status: PodStatus) -> Result<Pod, KabinetError> {
        let mut state = self.state.write().await;
        let pod = state.pods.get_mut(id).ok_or_else(|| not_found("pod", id))?;
        pod.status = status;
        pod.updated_at = Utc::now();
        Ok(pod.clone())
    }

    async fn add_log_dump(&self, dump: LogDump) -> Result<Pod, KabinetError> {
        let mut state = self.state.write().await;
        if !state.pods.contains_key(&dump.pod_id) {
            return Err(not_found("pod", &dump.pod_id));
        }
        let dump_id = dump.id.clone();
        let pod_id = dump.pod_id.clone();
        state.log_dumps.insert(dump_id.clone(), dump);

        let pod = state
            .pods
            .get_mut(&pod_id)
            .ok_or_else(|| not_found("pod", &pod_id))?;
        pod.latest_log_dump = Some(dump_id);
        pod.updated_at = Utc::now();
        Ok(pod.clone())
    }

    async fn get_log_dump(&self, id: &str) -> Result<LogDump, KabinetError> {
        let state = self.state.read().await;
        state
            .log_dumps
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("log dump", id))
    }

    async fn flush(&self) -> Result<(), KabinetError> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        let contents = {
            let state = self.state.read().await;
            serde_json::to_vec_pretty(&*state)?
        };
        snapshot.write_atomic(&contents).await?;
        debug!("Flushed store snapshot to {}", snapshot.path().display());
        Ok(())
    }
}
