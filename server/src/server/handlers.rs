//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::errors::KabinetError;
use crate::flavours::Capabilities;
use crate::models::{Backend, Deployment, Flavour, LogDump, Pod, Release, Resource, Setup};
use crate::server::state::ServerState;
use crate::services::{agents, catalog, pods, setups};
use crate::utils::version_info;
use kabinet_messages::models::{
    ErrorResponse, HealthResponse, PodLogsResponse, PodStatusResponse, VersionResponse,
};

type ApiResult<T> = Result<Json<T>, KabinetError>;

impl KabinetError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            KabinetError::NotFound(_) => StatusCode::NOT_FOUND,
            KabinetError::SchemaError(_)
            | KabinetError::ValidationError(_)
            | KabinetError::JsonError(_) => StatusCode::BAD_REQUEST,
            KabinetError::RateError(_) | KabinetError::NoFlavourAvailable { .. } => {
                StatusCode::CONFLICT
            }
            KabinetError::NotImplementedByBackend { .. } => StatusCode::NOT_IMPLEMENTED,
            KabinetError::OrchestrationError(_) | KabinetError::RuntimeError(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for KabinetError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// ================================ SYSTEM ========================================= //

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "kabinet".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

#[derive(Debug, Serialize)]
pub struct BackendResponse {
    pub backend: Backend,
    pub capabilities: Capabilities,
}

/// The local backend and what it can offer
pub async fn backend_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(BackendResponse {
        backend: state.backend.record().clone(),
        capabilities: state.backend.capabilities().clone(),
    })
}

// =============================== CATALOG ========================================= //

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub release: Release,
    pub flavours: Vec<Flavour>,
}

pub async fn create_release_handler(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<catalog::ReleaseInput>,
) -> Result<impl IntoResponse, KabinetError> {
    let (release, flavours) = catalog::register_release(state.store.as_ref(), input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ReleaseResponse { release, flavours }),
    ))
}

pub async fn get_release_handler(
    State(state): State<Arc<ServerState>>,
    Path(release_id): Path<String>,
) -> ApiResult<ReleaseResponse> {
    let release = state.store.get_release(&release_id).await?;
    let flavours = state.store.list_flavours(&release.id).await?;
    Ok(Json(ReleaseResponse { release, flavours }))
}

#[derive(Debug, Serialize)]
pub struct RejectionView {
    pub flavour_id: String,
    pub flavour_name: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub flavour: Flavour,
    pub score: u64,
    pub rejections: Vec<RejectionView>,
}

/// Which flavour of a release the local backend would run
pub async fn fitting_flavour_handler(
    State(state): State<Arc<ServerState>>,
    Path(release_id): Path<String>,
) -> ApiResult<SelectionResponse> {
    let release = state.store.get_release(&release_id).await?;
    let selection = state.backend.get_fitting_flavour(&release).await?;
    Ok(Json(SelectionResponse {
        flavour: selection.flavour,
        score: selection.score,
        rejections: selection
            .rejections
            .into_iter()
            .map(|r| RejectionView {
                flavour_id: r.flavour_id,
                flavour_name: r.flavour_name,
                reason: r.error.to_string(),
            })
            .collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub flavour_id: String,
    pub score: u64,
}

pub async fn rate_flavour_handler(
    State(state): State<Arc<ServerState>>,
    Path(flavour_id): Path<String>,
) -> ApiResult<RateResponse> {
    let flavour = state.store.get_flavour(&flavour_id).await?;
    let score = state.backend.rate_flavour(&flavour).await?;
    Ok(Json(RateResponse {
        flavour_id: flavour.id,
        score,
    }))
}

/// Queue a pull; progress arrives on the flavour event stream
pub async fn pull_flavour_handler(
    State(state): State<Arc<ServerState>>,
    Path(flavour_id): Path<String>,
) -> Result<impl IntoResponse, KabinetError> {
    let flavour = state.store.get_flavour(&flavour_id).await?;
    state.backend.pull_flavour(&flavour).await?;
    Ok(StatusCode::ACCEPTED)
}

// =============================== BACKENDS ======================================== //

pub async fn declare_backend_handler(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<agents::DeclareBackendInput>,
) -> ApiResult<Backend> {
    Ok(Json(
        agents::declare_backend(state.store.as_ref(), input).await?,
    ))
}

pub async fn heartbeat_handler(
    State(state): State<Arc<ServerState>>,
    Path(backend_id): Path<String>,
) -> ApiResult<Backend> {
    Ok(Json(
        agents::heartbeat(state.store.as_ref(), &backend_id).await?,
    ))
}

pub async fn declare_resource_handler(
    State(state): State<Arc<ServerState>>,
    Path(backend_id): Path<String>,
    Json(input): Json<agents::DeclareResourceInput>,
) -> ApiResult<Resource> {
    Ok(Json(
        agents::declare_resource(state.store.as_ref(), &backend_id, input).await?,
    ))
}

pub async fn create_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(backend_id): Path<String>,
    Json(input): Json<pods::CreateDeploymentInput>,
) -> ApiResult<Deployment> {
    Ok(Json(
        pods::create_deployment(state.store.as_ref(), &backend_id, input).await?,
    ))
}

pub async fn create_pod_handler(
    State(state): State<Arc<ServerState>>,
    Path(backend_id): Path<String>,
    Json(input): Json<pods::CreatePodInput>,
) -> ApiResult<Pod> {
    Ok(Json(
        pods::create_pod(state.store.as_ref(), &state.broadcaster, &backend_id, input).await?,
    ))
}

// ================================ SETUPS ========================================= //

/// A setup without its API token
#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub id: String,
    pub release_id: String,
    pub flavour_id: Option<String>,
    pub installer: String,
    pub command: Option<Vec<String>>,
    pub instance_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Setup> for SetupResponse {
    fn from(setup: Setup) -> Self {
        Self {
            id: setup.id,
            release_id: setup.release_id,
            flavour_id: setup.flavour_id,
            installer: setup.installer,
            command: setup.command,
            instance_id: setup.instance_id,
            created_at: setup.created_at,
        }
    }
}

pub async fn create_setup_handler(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<setups::CreateSetupInput>,
) -> Result<impl IntoResponse, KabinetError> {
    let setup = setups::create_setup(state.store.as_ref(), state.backend.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(SetupResponse::from(setup))))
}

pub async fn get_setup_handler(
    State(state): State<Arc<ServerState>>,
    Path(setup_id): Path<String>,
) -> ApiResult<SetupResponse> {
    Ok(Json(state.store.get_setup(&setup_id).await?.into()))
}

/// Bring a setup up and return its pod. Waits for any image pull.
pub async fn deploy_setup_handler(
    State(state): State<Arc<ServerState>>,
    Path(setup_id): Path<String>,
) -> ApiResult<Pod> {
    Ok(Json(
        setups::deploy_setup(state.store.as_ref(), state.backend.as_ref(), &setup_id).await?,
    ))
}

// ================================= PODS ========================================== //

pub async fn list_pods_handler(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<Pod>> {
    Ok(Json(state.store.list_pods(None).await?))
}

pub async fn get_pod_handler(
    State(state): State<Arc<ServerState>>,
    Path(pod_id): Path<String>,
) -> ApiResult<Pod> {
    Ok(Json(state.store.get_pod(&pod_id).await?))
}

/// Live status from the runtime. `UNKNOWN` when the container is gone.
pub async fn pod_status_handler(
    State(state): State<Arc<ServerState>>,
    Path(pod_id): Path<String>,
) -> ApiResult<PodStatusResponse> {
    let pod = state.store.get_pod(&pod_id).await?;
    let status = state.backend.get_status(&pod).await?;
    Ok(Json(PodStatusResponse {
        id: pod.id,
        pod_id: pod.pod_id,
        status,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePodRequest {
    pub status: String,
}

/// Agent-reported status
pub async fn update_pod_handler(
    State(state): State<Arc<ServerState>>,
    Path(pod_id): Path<String>,
    Json(request): Json<UpdatePodRequest>,
) -> ApiResult<Pod> {
    Ok(Json(
        pods::update_pod(
            state.store.as_ref(),
            &state.broadcaster,
            &pod_id,
            &request.status,
        )
        .await?,
    ))
}

/// Live logs from the runtime. Empty when the container is gone.
pub async fn pod_logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(pod_id): Path<String>,
) -> ApiResult<PodLogsResponse> {
    let pod = state.store.get_pod(&pod_id).await?;
    let logs = state.backend.get_logs(&pod).await?;
    Ok(Json(PodLogsResponse { id: pod.id, logs }))
}

pub async fn dump_logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(pod_id): Path<String>,
) -> ApiResult<LogDump> {
    Ok(Json(
        pods::dump_logs(state.store.as_ref(), state.backend.as_ref(), &pod_id).await?,
    ))
}

// ================================ EVENTS ========================================= //

fn event_stream<S, T>(
    name: &'static str,
    updates: S,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize,
{
    Sse::new(updates.map(move |update| Event::default().event(name).json_data(update)))
        .keep_alive(KeepAlive::default())
}

pub async fn flavour_events_handler(
    State(state): State<Arc<ServerState>>,
    Path(flavour_id): Path<String>,
) -> Result<impl IntoResponse, KabinetError> {
    let updates = state.backend.watch_flavour(&flavour_id).await?;
    Ok(event_stream("flavour", updates))
}

pub async fn all_flavour_events_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, KabinetError> {
    let updates = state.backend.watch_flavours().await?;
    Ok(event_stream("flavour", updates))
}

pub async fn pod_events_handler(
    State(state): State<Arc<ServerState>>,
    Path(pod_id): Path<String>,
) -> impl IntoResponse {
    event_stream("pod", pods::watch_pod(&state.broadcaster, &pod_id).await)
}

pub async fn all_pod_events_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    event_stream("pod", pods::watch_pods(&state.broadcaster).await)
}
