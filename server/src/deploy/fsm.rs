//! Finite state machine for bringing a setup up as a pod

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// FSM settings
#[derive(Debug, Clone)]
pub struct FsmSettings {
    /// How long to wait for a dispatched image pull to report completion
    pub pull_timeout: Duration,
}

impl Default for FsmSettings {
    fn default() -> Self {
        Self {
            pull_timeout: Duration::from_secs(1800),
        }
    }
}

/// Setup state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetupState {
    NoFlavourSelected,
    FlavourSelected,
    ImagePullPending,
    ImageReady,
    ContainerStarting,
    /// Terminal success
    PodRecorded,
    /// Terminal failure
    Failed,
}

impl SetupState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SetupState::PodRecorded | SetupState::Failed)
    }
}

/// Setup event
#[derive(Debug, Clone)]
pub enum SetupEvent {
    /// A flavour was pinned or rated best
    SelectFlavour(String),

    /// The image is missing and a background pull was queued
    PullDispatched,

    /// The image is present locally
    ImageReady,

    /// Container creation started under the given name
    StartContainer(String),

    /// The pod record exists
    RecordPod(String),

    /// Any step failed
    Fail(String),
}

/// Setup FSM
#[derive(Debug, Clone)]
pub struct SetupFsm {
    setup_id: String,
    state: SetupState,
    flavour_id: Option<String>,
    container_name: Option<String>,
    pod_id: Option<String>,
    error: Option<String>,
}

impl SetupFsm {
    pub fn new(setup_id: impl Into<String>) -> Self {
        Self {
            setup_id: setup_id.into(),
            state: SetupState::NoFlavourSelected,
            flavour_id: None,
            container_name: None,
            pod_id: None,
            error: None,
        }
    }

    pub fn setup_id(&self) -> &str {
        &self.setup_id
    }

    pub fn state(&self) -> &SetupState {
        &self.state
    }

    pub fn flavour_id(&self) -> Option<&str> {
        self.flavour_id.as_deref()
    }

    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref()
    }

    pub fn pod_id(&self) -> Option<&str> {
        self.pod_id.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: SetupEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (SetupState::NoFlavourSelected, SetupEvent::SelectFlavour(flavour_id)) => {
                self.flavour_id = Some(flavour_id.clone());
                SetupState::FlavourSelected
            }

            (SetupState::FlavourSelected, SetupEvent::PullDispatched) => SetupState::ImagePullPending,
            (SetupState::FlavourSelected, SetupEvent::ImageReady) => SetupState::ImageReady,
            (SetupState::ImagePullPending, SetupEvent::ImageReady) => SetupState::ImageReady,

            (SetupState::ImageReady, SetupEvent::StartContainer(name)) => {
                self.container_name = Some(name.clone());
                SetupState::ContainerStarting
            }

            (SetupState::ContainerStarting, SetupEvent::RecordPod(pod_id)) => {
                self.pod_id = Some(pod_id.clone());
                SetupState::PodRecorded
            }

            (state, SetupEvent::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                SetupState::Failed
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}
