//! Pod status

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PodStatus {
    #[default]
    Pending,
    Running,
    Stopping,
    Stopped,
    Failed,
    /// Also returned when the backing container cannot be found
    Unknown,
}

impl PodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodStatus::Pending => "PENDING",
            PodStatus::Running => "RUNNING",
            PodStatus::Stopping => "STOPPING",
            PodStatus::Stopped => "STOPPED",
            PodStatus::Failed => "FAILED",
            PodStatus::Unknown => "UNKNOWN",
        }
    }

    /// Whether the pod can no longer change on its own
    pub fn is_terminal(&self) -> bool {
        matches!(self, PodStatus::Stopped | PodStatus::Failed)
    }
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PodStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(PodStatus::Pending),
            "RUNNING" => Ok(PodStatus::Running),
            "STOPPING" => Ok(PodStatus::Stopping),
            "STOPPED" => Ok(PodStatus::Stopped),
            "FAILED" => Ok(PodStatus::Failed),
            "UNKNOWN" => Ok(PodStatus::Unknown),
            _ => Err(format!("Invalid pod status: {}", s)),
        }
    }
}
