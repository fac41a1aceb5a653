//! Backend registration

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::KabinetError;
use crate::models::{Backend, BackendKind, Resource};
use crate::storage::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct DeclareBackendInput {
    pub instance_id: String,
    #[serde(default)]
    pub kind: BackendKind,
    pub name: String,
    pub user: String,
    pub client: String,
}

pub async fn declare_backend(
    store: &dyn Store,
    input: DeclareBackendInput,
) -> Result<Backend, KabinetError> {
    let backend = store
        .upsert_backend(Backend {
            id: crate::utils::generate_uuid(),
            instance_id: input.instance_id,
            kind: input.kind,
            name: input.name,
            user: input.user,
            client: input.client,
            last_heartbeat: Utc::now(),
        })
        .await?;
    info!("Declared {} backend {} ({})", backend.kind, backend.name, backend.id);
    Ok(backend)
}

pub async fn heartbeat(store: &dyn Store, backend_id: &str) -> Result<Backend, KabinetError> {
    let backend = store.touch_backend(backend_id).await?;
    debug!("Heartbeat from backend {}", backend_id);
    Ok(backend)
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeclareResourceInput {
    pub local_id: String,
    pub name: String,
    #[serde(default)]
    pub qualifiers: HashMap<String, String>,
}

pub async fn declare_resource(
    store: &dyn Store,
    backend_id: &str,
    input: DeclareResourceInput,
) -> Result<Resource, KabinetError> {
    store.get_backend(backend_id).await?;
    store
        .upsert_resource(Resource {
            id: crate::utils::generate_uuid(),
            backend_id: backend_id.to_string(),
            resource_id: input.local_id,
            name: input.name,
            qualifiers: input.qualifiers,
        })
        .await
}
