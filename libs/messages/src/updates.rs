//! Progress and update messages

use serde::{Deserialize, Serialize};

use crate::status::PodStatus;

/// Status label while an image pull is in flight
pub const PULLING: &str = "Pulling";

/// Status label once an image is available locally
pub const PULLED: &str = "Pulled";

/// Status label when a pull could not be completed
pub const PULL_FAILED: &str = "Failed";

/// Progress of a single image pull.
///
/// `progress` is a heuristic derived from layer completion counts, not a byte-accurate
/// percentage. The first update of every pull carries the placeholder `0.5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullUpdate {
    pub status: String,
    pub progress: f32,
}

impl PullUpdate {
    pub fn pulling(progress: f32) -> Self {
        Self {
            status: PULLING.to_string(),
            progress: progress.clamp(0.0, 1.0),
        }
    }

    pub fn pulled() -> Self {
        Self {
            status: PULLED.to_string(),
            progress: 1.0,
        }
    }

    pub fn failed(progress: f32) -> Self {
        Self {
            status: PULL_FAILED.to_string(),
            progress: progress.clamp(0.0, 1.0),
        }
    }

    pub fn is_pulled(&self) -> bool {
        self.status == PULLED
    }

    pub fn is_failed(&self) -> bool {
        self.status == PULL_FAILED
    }
}

/// A pull update scoped to the flavour it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavourUpdate {
    pub id: String,
    pub status: String,
    pub progress: f32,
}

impl FlavourUpdate {
    pub fn new(id: impl Into<String>, update: PullUpdate) -> Self {
        Self {
            id: id.into(),
            status: update.status,
            progress: update.progress,
        }
    }

    pub fn is_pulled(&self) -> bool {
        self.status == PULLED
    }

    pub fn is_failed(&self) -> bool {
        self.status == PULL_FAILED
    }
}

/// Sent whenever a pod record is created or its status changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodUpdateMessage {
    pub id: String,
    pub status: PodStatus,
    pub created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
}

/// Sent when a background call could not be resolved or failed while running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchFailure {
    pub function_name: String,
    pub error: String,
}
