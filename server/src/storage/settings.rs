//! Settings file management

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::flavours::rating::SelectionOrder;
use crate::logs::LogLevel;
use crate::models::BackendKind;

/// Control plane settings, read from `settings.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Also write daily-rolling log files into the logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Identity this backend registers with
    #[serde(default)]
    pub backend: BackendSettings,

    /// Docker runtime configuration
    #[serde(default)]
    pub docker: DockerSettings,

    /// Capability overrides applied on top of host detection
    #[serde(default)]
    pub capabilities: CapabilitySettings,

    /// Which end of the sorted flavour ratings wins
    #[serde(default)]
    pub selection_order: SelectionOrder,

    /// Orchestrator tuning
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    /// Enable the backend worker that drains the dispatch inbox
    #[serde(default = "default_true")]
    pub enable_backend_worker: bool,

    /// Enable the pod status poller
    #[serde(default = "default_true")]
    pub enable_poller: bool,

    /// Polling interval in seconds
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    /// Local HTTP server
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_true() -> bool {
    true
}

fn default_polling_interval() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            backend: BackendSettings::default(),
            docker: DockerSettings::default(),
            capabilities: CapabilitySettings::default(),
            selection_order: SelectionOrder::default(),
            orchestrator: OrchestratorSettings::default(),
            enable_backend_worker: true,
            enable_poller: true,
            polling_interval_secs: default_polling_interval(),
            server: ServerSettings::default(),
        }
    }
}

/// Identity of the local backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_instance_id")]
    pub instance_id: String,

    /// Executor kind. Only docker implements the full operation set.
    #[serde(default)]
    pub kind: BackendKind,

    #[serde(default = "default_backend_name")]
    pub name: String,

    #[serde(default = "default_owner")]
    pub user: String,

    #[serde(default = "default_owner")]
    pub client: String,
}

fn default_instance_id() -> String {
    "default".to_string()
}

fn default_backend_name() -> String {
    "local-docker".to_string()
}

fn default_owner() -> String {
    "local".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
            kind: BackendKind::default(),
            name: default_backend_name(),
            user: default_owner(),
            client: default_owner(),
        }
    }
}

/// Docker CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerSettings {
    /// Path or name of the docker binary
    #[serde(default = "default_docker_binary")]
    pub binary: String,

    /// Network every container joins
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_network() -> String {
    "bridge".to_string()
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            network: default_network(),
        }
    }
}

/// Capability overrides. `None` keeps the detected value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitySettings {
    #[serde(default)]
    pub gpu: Option<bool>,

    #[serde(default)]
    pub rocm: Option<bool>,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub services: Vec<String>,
}

/// Setup orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// How long to wait for a dispatched image pull to finish
    #[serde(default = "default_pull_timeout")]
    pub pull_timeout_secs: u64,
}

fn default_pull_timeout() -> u64 {
    1800
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            pull_timeout_secs: default_pull_timeout(),
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}
