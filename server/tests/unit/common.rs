//! Shared fixtures: a scriptable container runtime and a wired-up control plane

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use serde_json::json;
use tokio::task::JoinHandle;

use kabinet::app::options::AppOptions;
use kabinet::app::state::AppState;
use kabinet::backends::runtime::{
    ContainerInfo, ContainerRuntime, ContainerSpec, PullEvent, PullStream, RunOutcome,
};
use kabinet::errors::KabinetError;
use kabinet::flavours::Capabilities;
use kabinet::models::{Flavour, Release};
use kabinet::services::catalog::{register_release, FlavourInput, ReleaseInput};
use kabinet::storage::{MemoryStore, Store};
use kabinet::workers::backend_worker;

/// In-memory stand-in for the docker engine
pub struct FakeRuntime {
    pub images: Mutex<HashSet<String>>,
    /// Events replayed by `pull_image`, per image
    pub pull_events: Mutex<HashMap<String, Vec<PullEvent>>>,
    /// Images whose pull ends with an error
    pub broken_images: Mutex<HashSet<String>>,
    pub containers: Mutex<HashMap<String, ContainerInfo>>,
    pub logs: Mutex<HashMap<String, String>>,
    pub networks: Vec<String>,
    pub pull_calls: AtomicUsize,
    pub run_calls: AtomicUsize,
    pub last_spec: Mutex<Option<ContainerSpec>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            images: Mutex::new(HashSet::new()),
            pull_events: Mutex::new(HashMap::new()),
            broken_images: Mutex::new(HashSet::new()),
            containers: Mutex::new(HashMap::new()),
            logs: Mutex::new(HashMap::new()),
            networks: vec!["bridge".to_string()],
            pull_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
            last_spec: Mutex::new(None),
        }
    }
}

impl FakeRuntime {
    pub fn with_images(images: &[&str]) -> Self {
        let runtime = Self::default();
        runtime
            .images
            .lock()
            .unwrap()
            .extend(images.iter().map(|i| i.to_string()));
        runtime
    }

    pub fn script_pull(&self, image: &str, events: Vec<PullEvent>) {
        self.pull_events
            .lock()
            .unwrap()
            .insert(image.to_string(), events);
    }

    pub fn break_pull(&self, image: &str) {
        self.broken_images.lock().unwrap().insert(image.to_string());
    }

    pub fn set_state(&self, name: &str, state: &str, exit_code: Option<i64>) {
        if let Some(info) = self.containers.lock().unwrap().get_mut(name) {
            info.state = state.to_string();
            info.exit_code = exit_code;
        }
    }

    pub fn remove_container(&self, name: &str) {
        self.containers.lock().unwrap().remove(name);
    }

    pub fn pulls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool, KabinetError> {
        Ok(self.images.lock().unwrap().contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<PullStream, KabinetError> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        let events = self
            .pull_events
            .lock()
            .unwrap()
            .get(image)
            .cloned()
            .unwrap_or_default();

        let mut items: Vec<Result<PullEvent, KabinetError>> = events.into_iter().map(Ok).collect();
        if self.broken_images.lock().unwrap().contains(image) {
            items.push(Err(KabinetError::RuntimeError(format!(
                "manifest for {} not found",
                image
            ))));
        } else {
            self.images.lock().unwrap().insert(image.to_string());
        }
        Ok(Box::pin(stream::iter(items)))
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, KabinetError> {
        Ok(self.containers.lock().unwrap().get(name).cloned())
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<RunOutcome, KabinetError> {
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        let mut containers = self.containers.lock().unwrap();
        if containers.contains_key(&spec.name) {
            return Ok(RunOutcome::AlreadyExists);
        }
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("cid-{}", spec.name);
        containers.insert(
            spec.name.clone(),
            ContainerInfo {
                id: id.clone(),
                name: spec.name.clone(),
                state: "running".to_string(),
                exit_code: None,
            },
        );
        Ok(RunOutcome::Created(id))
    }

    async fn container_logs(&self, name: &str) -> Result<Option<String>, KabinetError> {
        if !self.containers.lock().unwrap().contains_key(name) {
            return Ok(None);
        }
        Ok(Some(
            self.logs
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .unwrap_or_default(),
        ))
    }

    async fn list_networks(&self) -> Result<Vec<String>, KabinetError> {
        Ok(self.networks.clone())
    }
}

/// A control plane wired to a `FakeRuntime`, with its backend worker running
pub struct Harness {
    pub state: Arc<AppState>,
    pub runtime: Arc<FakeRuntime>,
    pub worker: JoinHandle<()>,
}

pub fn test_options() -> AppOptions {
    let mut options = AppOptions::default();
    options.docker.fsm.pull_timeout = Duration::from_secs(5);
    options
}

pub async fn harness(runtime: FakeRuntime, capabilities: Capabilities) -> Harness {
    harness_with(test_options(), runtime, capabilities).await
}

pub async fn harness_with(
    options: AppOptions,
    runtime: FakeRuntime,
    capabilities: Capabilities,
) -> Harness {
    let runtime = Arc::new(runtime);
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let (state, inbox) = AppState::build(&options, store, runtime.clone(), capabilities)
        .await
        .unwrap();
    let state = Arc::new(state);

    let table = state.dispatch_table.clone();
    let broadcaster = state.broadcaster.clone();
    let worker = tokio::spawn(async move {
        backend_worker::run(
            inbox,
            table.as_ref(),
            &broadcaster,
            Box::pin(std::future::pending::<()>()),
        )
        .await;
    });

    Harness {
        state,
        runtime,
        worker,
    }
}

/// Register a release whose flavours are given as (name, image, selectors)
pub async fn release(
    store: &dyn Store,
    flavours: &[(&str, &str, serde_json::Value)],
) -> (Release, Vec<Flavour>) {
    register_release(
        store,
        ReleaseInput {
            app: "demo-app".to_string(),
            version: "1.0.0".to_string(),
            scopes: Vec::new(),
            logo: None,
            entrypoint: None,
            flavours: flavours
                .iter()
                .map(|(name, image, selectors)| FlavourInput {
                    name: name.to_string(),
                    image: image.to_string(),
                    selectors: selectors.clone(),
                    builder: String::new(),
                    manifest: json!({}),
                    requirements: json!([]),
                })
                .collect(),
        },
    )
    .await
    .unwrap()
}

pub fn cpu_only() -> Capabilities {
    Capabilities {
        cpu_count: 4,
        cpu_frequency_mhz: 2400,
        memory_mb: 8192,
        ..Default::default()
    }
}
