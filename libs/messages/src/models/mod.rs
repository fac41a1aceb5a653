//! HTTP response models

use serde::{Deserialize, Serialize};

use crate::status::PodStatus;

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Pod status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodStatusResponse {
    pub id: String,
    pub pod_id: String,
    pub status: PodStatus,
}

/// Pod logs response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodLogsResponse {
    pub id: String,
    pub logs: String,
}

/// Error body returned by the local HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
