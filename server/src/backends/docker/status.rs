//! Docker container state to pod status

use crate::models::PodStatus;

pub fn pod_status(state: &str, exit_code: Option<i64>) -> PodStatus {
    match state {
        "created" | "restarting" => PodStatus::Pending,
        "running" | "paused" => PodStatus::Running,
        "removing" => PodStatus::Stopping,
        "exited" if exit_code == Some(0) => PodStatus::Stopped,
        _ => PodStatus::Failed,
    }
}
