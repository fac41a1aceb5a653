//! Backend, resource and deployment models

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of compute executor behind a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Docker,
    Apptainer,
    Kubernetes,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Docker => "docker",
            BackendKind::Apptainer => "apptainer",
            BackendKind::Kubernetes => "kubernetes",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(BackendKind::Docker),
            "apptainer" => Ok(BackendKind::Apptainer),
            "kubernetes" | "k8s" => Ok(BackendKind::Kubernetes),
            _ => Err(format!("Invalid backend kind: {}", s)),
        }
    }
}

/// A registered compute executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    /// Unique backend ID
    pub id: String,

    /// Instance ID reported by the agent, unique per client
    pub instance_id: String,

    /// Executor kind
    pub kind: BackendKind,

    /// Display name
    pub name: String,

    /// Owning user
    pub user: String,

    /// Owning client application
    pub client: String,

    /// Last time the agent reported in
    pub last_heartbeat: DateTime<Utc>,
}

impl Backend {
    pub fn new(instance_id: impl Into<String>, user: impl Into<String>, client: impl Into<String>) -> Self {
        let instance_id = instance_id.into();
        Self {
            id: crate::utils::generate_uuid(),
            name: instance_id.clone(),
            instance_id,
            kind: BackendKind::Docker,
            user: user.into(),
            client: client.into(),
            last_heartbeat: Utc::now(),
        }
    }
}

/// An allocatable unit exposed by a backend (e.g. a GPU node)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub backend_id: String,

    /// Backend-local identifier
    pub resource_id: String,

    pub name: String,

    #[serde(default)]
    pub qualifiers: HashMap<String, String>,
}

/// "This backend has been told to run this flavour"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub flavour_id: String,
    pub backend_id: String,

    /// Backend-local identifier (the container name for docker)
    pub local_id: String,

    /// Whether the image is known to be present on the backend
    #[serde(default)]
    pub pulled: bool,

    #[serde(default)]
    pub secret_params: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub untyped_params: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
}
