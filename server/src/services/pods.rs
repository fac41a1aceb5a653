//! Deployments, pods and their logs

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::backends::ContainerBackend;
use crate::channels::{Broadcaster, ALL_GROUP, POD_CHANNEL};
use crate::errors::KabinetError;
use crate::models::{Deployment, LogDump, Pod, PodStatus};
use crate::storage::Store;
use futures::stream::BoxStream;
use kabinet_messages::PodUpdateMessage;

pub type PodUpdates = BoxStream<'static, PodUpdateMessage>;

/// Tell listeners of the pod and of `all` about it
pub async fn broadcast_pod(
    broadcaster: &Broadcaster,
    pod: &Pod,
    created: bool,
) -> Result<(), KabinetError> {
    let message = PodUpdateMessage {
        id: pod.id.clone(),
        status: pod.status,
        created,
        progress: None,
    };
    broadcaster
        .publish(POD_CHANNEL, &message, &[pod.id.as_str(), ALL_GROUP])
        .await
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeploymentInput {
    pub flavour_id: String,
    pub local_id: String,
    #[serde(default)]
    pub secret_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub untyped_params: serde_json::Map<String, serde_json::Value>,
}

pub async fn create_deployment(
    store: &dyn Store,
    backend_id: &str,
    input: CreateDeploymentInput,
) -> Result<Deployment, KabinetError> {
    store.get_backend(backend_id).await?;
    store.get_flavour(&input.flavour_id).await?;
    store
        .upsert_deployment(Deployment {
            id: crate::utils::generate_uuid(),
            flavour_id: input.flavour_id,
            backend_id: backend_id.to_string(),
            local_id: input.local_id,
            pulled: false,
            secret_params: input.secret_params,
            untyped_params: input.untyped_params,
            created_at: Utc::now(),
        })
        .await
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePodInput {
    pub deployment_id: String,
    /// Backend-local container id
    pub local_id: String,
    #[serde(default)]
    pub resource_id: Option<String>,
}

pub async fn create_pod(
    store: &dyn Store,
    broadcaster: &Broadcaster,
    backend_id: &str,
    input: CreatePodInput,
) -> Result<Pod, KabinetError> {
    let deployment = store.get_deployment(&input.deployment_id).await?;
    if deployment.backend_id != backend_id {
        return Err(KabinetError::ValidationError(format!(
            "deployment {} belongs to another backend",
            deployment.id
        )));
    }
    if let Some(resource_id) = &input.resource_id {
        store.get_resource(resource_id).await?;
    }

    let mut pod = Pod::new(backend_id, input.local_id, deployment.id);
    pod.resource_id = input.resource_id;
    let (pod, created) = store.get_or_create_pod(pod).await?;
    broadcast_pod(broadcaster, &pod, created).await?;
    Ok(pod)
}

/// Record an agent-reported status. Values outside `PodStatus` are rejected.
pub async fn update_pod(
    store: &dyn Store,
    broadcaster: &Broadcaster,
    pod_id: &str,
    status: &str,
) -> Result<Pod, KabinetError> {
    let status: PodStatus = status.parse().map_err(KabinetError::SchemaError)?;
    let pod = store.update_pod_status(pod_id, status).await?;
    broadcast_pod(broadcaster, &pod, false).await?;
    Ok(pod)
}

/// Fetch the pod's logs through the backend and keep them as its latest dump
pub async fn dump_logs(
    store: &dyn Store,
    backend: &dyn ContainerBackend,
    pod_id: &str,
) -> Result<LogDump, KabinetError> {
    let pod = store.get_pod(pod_id).await?;
    let logs = backend.get_logs(&pod).await?;
    let dump = LogDump {
        id: crate::utils::generate_uuid(),
        pod_id: pod.id.clone(),
        logs,
        created_at: Utc::now(),
    };
    store.add_log_dump(dump.clone()).await?;
    info!("Stored log dump {} for pod {}", dump.id, pod.id);
    Ok(dump)
}

pub async fn watch_pod(broadcaster: &Broadcaster, pod_id: &str) -> PodUpdates {
    broadcaster.listen(POD_CHANNEL, &[pod_id]).await
}

pub async fn watch_pods(broadcaster: &Broadcaster) -> PodUpdates {
    broadcaster.listen(POD_CHANNEL, &[ALL_GROUP]).await
}
