//! Container runtime seam
//!
//! The operations a backend needs from the engine that actually runs containers.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::errors::KabinetError;

/// One line of image pull output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullEvent {
    /// Layer id, absent for image-level lines ("Digest: ...", "Status: ...")
    pub id: Option<String>,
    pub status: String,
}

impl PullEvent {
    pub fn layer(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            status: status.into(),
        }
    }

    pub fn image(status: impl Into<String>) -> Self {
        Self {
            id: None,
            status: status.into(),
        }
    }
}

pub type PullStream = BoxStream<'static, Result<PullEvent, KabinetError>>;

/// What the runtime knows about an existing container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    /// Raw runtime state ("running", "exited", ...)
    pub state: String,
    pub exit_code: Option<i64>,
}

/// Everything needed to start a container
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Option<Vec<String>>,
    pub env: Vec<(String, String)>,
    pub network: String,
    pub labels: HashMap<String, String>,
    /// Device and capability arguments derived from selectors
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Created(String),
    /// A container with the requested name already exists
    AlreadyExists,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn image_exists(&self, image: &str) -> Result<bool, KabinetError>;

    /// Start a pull and stream its progress lines. A failed pull ends the stream with an error.
    async fn pull_image(&self, image: &str) -> Result<PullStream, KabinetError>;

    /// `None` when no container has that name
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, KabinetError>;

    async fn run_container(&self, spec: &ContainerSpec) -> Result<RunOutcome, KabinetError>;

    /// `None` when no container has that name
    async fn container_logs(&self, name: &str) -> Result<Option<String>, KabinetError>;

    async fn list_networks(&self) -> Result<Vec<String>, KabinetError>;
}
