//! Application configuration options

use std::time::Duration;

use crate::backends::docker;
use crate::deploy::fsm::FsmSettings;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{BackendSettings, CapabilitySettings, Settings};
use crate::workers::status_poller;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Identity the local backend declares itself with
    pub backend: BackendSettings,

    /// Docker binary to drive
    pub docker_binary: String,

    /// Docker backend options
    pub docker: docker::Options,

    /// Capability overrides applied after detection
    pub capabilities: CapabilitySettings,

    /// Enable local HTTP server
    pub enable_http_server: bool,

    /// Enable the backend worker
    pub enable_backend_worker: bool,

    /// Enable status poller
    pub enable_poller: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Poller worker options
    pub poller: status_poller::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            layout: StorageLayout::default(),
            backend: BackendSettings::default(),
            docker_binary: "docker".to_string(),
            docker: docker::Options::default(),
            capabilities: CapabilitySettings::default(),
            enable_http_server: true,
            enable_backend_worker: true,
            enable_poller: true,
            server: ServerOptions::default(),
            poller: status_poller::Options::default(),
        }
    }
}

impl AppOptions {
    /// Build options from a settings file rooted at `layout`
    pub fn from_settings(layout: StorageLayout, settings: &Settings) -> Self {
        Self {
            layout,
            backend: settings.backend.clone(),
            docker_binary: settings.docker.binary.clone(),
            docker: docker::Options {
                network: settings.docker.network.clone(),
                selection_order: settings.selection_order,
                fsm: FsmSettings {
                    pull_timeout: Duration::from_secs(settings.orchestrator.pull_timeout_secs),
                },
            },
            capabilities: settings.capabilities.clone(),
            enable_http_server: settings.server.enabled,
            enable_backend_worker: settings.enable_backend_worker,
            enable_poller: settings.enable_poller,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            poller: status_poller::Options {
                interval: Duration::from_secs(settings.polling_interval_secs.max(1)),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}
