//! Pod and log dump models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use kabinet_messages::PodStatus;

/// A running or terminal container instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pod {
    /// Unique pod ID
    pub id: String,

    /// Backend running the container
    pub backend_id: String,

    /// Backend-local container identifier, unique per backend
    pub pod_id: String,

    /// Deployment this pod realises
    pub deployment_id: String,

    /// Setup that requested the pod, if it came from the orchestrator
    #[serde(default)]
    pub setup_id: Option<String>,

    /// Bound resource
    #[serde(default)]
    pub resource_id: Option<String>,

    pub status: PodStatus,

    /// Most recent log dump
    #[serde(default)]
    pub latest_log_dump: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pod {
    pub fn new(
        backend_id: impl Into<String>,
        pod_id: impl Into<String>,
        deployment_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: crate::utils::generate_uuid(),
            backend_id: backend_id.into(),
            pod_id: pod_id.into(),
            deployment_id: deployment_id.into(),
            setup_id: None,
            resource_id: None,
            status: PodStatus::Pending,
            latest_log_dump: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable snapshot of a pod's logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogDump {
    pub id: String,
    pub pod_id: String,
    pub logs: String,
    pub created_at: DateTime<Utc>,
}
