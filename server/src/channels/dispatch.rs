//! Background job dispatch
//!
//! Callers put a `CallEnvelope` into the `backend` inbox and return immediately. The
//! backend worker resolves `function_name` against a `DispatchTable` keyed by `JobKind`.
//! Delivery is at most once and nothing is retried.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channels::layer::ChannelLayer;
use crate::errors::KabinetError;

/// Inbox drained by the backend worker
pub const BACKEND_INBOX: &str = "backend";

/// Wire shape of a background call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

impl CallEnvelope {
    /// String argument by keyword, falling back to a positional index
    pub fn str_arg(&self, name: &str, position: usize) -> Result<&str, KabinetError> {
        self.kwargs
            .get(name)
            .or_else(|| self.args.get(position))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                KabinetError::ValidationError(format!(
                    "{} needs a string argument `{}`",
                    self.function_name, name
                ))
            })
    }
}

/// Every background function the worker knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    PullFlavour,
}

impl JobKind {
    pub const ALL: [JobKind; 1] = [JobKind::PullFlavour];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::PullFlavour => "pull_flavour",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = KabinetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| KabinetError::DispatchLookupError(s.to_string()))
    }
}

/// A typed background call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    PullFlavour { flavour_id: String },
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::PullFlavour { .. } => JobKind::PullFlavour,
        }
    }

    pub fn into_envelope(self) -> CallEnvelope {
        let kind = self.kind();
        let mut kwargs = serde_json::Map::new();
        match self {
            Job::PullFlavour { flavour_id } => {
                kwargs.insert("flavour_id".to_string(), serde_json::Value::String(flavour_id));
            }
        }
        CallEnvelope {
            function_name: kind.as_str().to_string(),
            args: Vec::new(),
            kwargs,
        }
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, call: &CallEnvelope) -> Result<(), KabinetError>;
}

/// Function name to handler lookup, checked for completeness at startup
#[derive(Default, Clone)]
pub struct DispatchTable {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: JobKind, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Fail if any known job kind lacks a handler
    pub fn verify(&self) -> Result<(), KabinetError> {
        let missing: Vec<&str> = JobKind::ALL
            .iter()
            .filter(|kind| !self.handlers.contains_key(kind))
            .map(|kind| kind.as_str())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(KabinetError::ConfigError(format!(
                "no handler registered for: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn resolve(&self, function_name: &str) -> Result<Arc<dyn JobHandler>, KabinetError> {
        let kind: JobKind = function_name.parse()?;
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| KabinetError::DispatchLookupError(function_name.to_string()))
    }
}

/// Puts jobs into the backend inbox
#[derive(Clone)]
pub struct Dispatcher {
    layer: Arc<ChannelLayer>,
}

impl Dispatcher {
    pub fn new(layer: Arc<ChannelLayer>) -> Self {
        Self { layer }
    }

    pub async fn dispatch(&self, job: Job) -> Result<(), KabinetError> {
        self.send(job.into_envelope()).await
    }

    /// Send an untyped call. The worker reports unknown names instead of this method.
    pub async fn send(&self, call: CallEnvelope) -> Result<(), KabinetError> {
        debug!("Dispatching {} to {}", call.function_name, BACKEND_INBOX);
        self.layer
            .send(BACKEND_INBOX, serde_json::to_value(&call)?)
            .await
    }
}
