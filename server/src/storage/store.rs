//! Persistence interface
//!
//! Entity operations with get / get-or-create / upsert semantics. Upserts are keyed by
//! each entity's natural key and keep the stored `id` of an existing record.

use async_trait::async_trait;

use crate::errors::KabinetError;
use crate::models::{Backend, Deployment, Flavour, LogDump, Pod, PodStatus, Release, Resource, Setup};

#[async_trait]
pub trait Store: Send + Sync {
    /// Keyed by (app, version)
    async fn upsert_release(&self, release: Release) -> Result<Release, KabinetError>;

    async fn get_release(&self, id: &str) -> Result<Release, KabinetError>;

    /// Keyed by (release, name). A new flavour is appended to the release's ingestion order.
    async fn upsert_flavour(&self, flavour: Flavour) -> Result<Flavour, KabinetError>;

    async fn get_flavour(&self, id: &str) -> Result<Flavour, KabinetError>;

    /// Flavours of a release in ingestion order
    async fn list_flavours(&self, release_id: &str) -> Result<Vec<Flavour>, KabinetError>;

    /// Keyed by (instance_id, user, client)
    async fn upsert_backend(&self, backend: Backend) -> Result<Backend, KabinetError>;

    async fn get_backend(&self, id: &str) -> Result<Backend, KabinetError>;

    /// Refresh `last_heartbeat`
    async fn touch_backend(&self, id: &str) -> Result<Backend, KabinetError>;

    /// Keyed by (backend, resource_id)
    async fn upsert_resource(&self, resource: Resource) -> Result<Resource, KabinetError>;

    async fn get_resource(&self, id: &str) -> Result<Resource, KabinetError>;

    /// Keyed by (flavour, backend, local_id)
    async fn upsert_deployment(&self, deployment: Deployment) -> Result<Deployment, KabinetError>;

    async fn get_deployment(&self, id: &str) -> Result<Deployment, KabinetError>;

    /// Deployments ordered by creation time, optionally restricted to one backend
    async fn list_deployments(&self, backend_id: Option<&str>) -> Result<Vec<Deployment>, KabinetError>;

    async fn insert_setup(&self, setup: Setup) -> Result<Setup, KabinetError>;

    async fn get_setup(&self, id: &str) -> Result<Setup, KabinetError>;

    /// Atomic create-if-absent keyed by (backend, pod_id). Returns the stored pod and
    /// whether this call created it.
    async fn get_or_create_pod(&self, pod: Pod) -> Result<(Pod, bool), KabinetError>;

    async fn get_pod(&self, id: &str) -> Result<Pod, KabinetError>;

    /// Pods ordered by creation time, optionally restricted to one backend
    async fn list_pods(&self, backend_id: Option<&str>) -> Result<Vec<Pod>, KabinetError>;

    async fn update_pod_status(&self, id: &str, status: PodStatus) -> Result<Pod, KabinetError>;

    /// Append a log dump and make it the pod's latest
    async fn add_log_dump(&self, dump: LogDump) -> Result<Pod, KabinetError>;

    async fn get_log_dump(&self, id: &str) -> Result<LogDump, KabinetError>;

    /// Persist pending changes, if the store is backed by anything
    async fn flush(&self) -> Result<(), KabinetError> {
        Ok(())
    }
}
