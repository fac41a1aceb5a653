//! Flavour selectors
//!
//! A selector describes what a flavour needs from (or prefers about) the backend it runs
//! on. Every selector carries `required` (absence rejects the flavour) and `weight`
//! (added to the flavour's rating when satisfied). The schema is closed: unknown kinds and
//! unknown fields fail to decode.

use serde::{Deserialize, Serialize};

use crate::errors::KabinetError;
use crate::flavours::capabilities::{version_at_least, Capabilities};

/// Selector kinds understood by this control plane
pub const SELECTOR_KINDS: [&str; 6] = ["ram", "cpu", "cuda", "rocm", "label", "service"];

fn default_required() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

fn default_compute_capability() -> String {
    "3.5".to_string()
}

fn default_cuda_version() -> String {
    "10.2".to_string()
}

/// Minimum memory in MiB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RamSelector {
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub min: Option<u64>,
}

/// Minimum core count and frequency (MHz)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CpuSelector {
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub min_count: Option<usize>,
    #[serde(default)]
    pub frequency: Option<u64>,
}

/// An NVIDIA GPU with CUDA support
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CudaSelector {
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Frequency in MHz
    #[serde(default)]
    pub frequency: Option<u64>,
    /// GPU memory in MiB
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default = "default_compute_capability")]
    pub compute_capability: String,
    #[serde(default)]
    pub cuda_cores: Option<u64>,
    /// Minimum CUDA version
    #[serde(default = "default_cuda_version")]
    pub cuda_version: String,
}

/// An AMD GPU with ROCm support
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RocmSelector {
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub frequency: Option<u64>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub compute_capability: Option<String>,
    #[serde(default)]
    pub cuda_cores: Option<u64>,
    #[serde(default)]
    pub cuda_version: Option<String>,
}

/// A key (and optionally value) the backend must advertise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelSelector {
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// A service the backend must provide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSelector {
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub service: Option<String>,
}

/// A typed compatibility requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Selector {
    Ram(RamSelector),
    Cpu(CpuSelector),
    Cuda(CudaSelector),
    Rocm(RocmSelector),
    Label(LabelSelector),
    Service(ServiceSelector),
}

impl Selector {
    /// Decode a JSON list of selectors.
    ///
    /// The discriminator is checked before the payload so that an unknown kind is
    /// reported by name rather than as a generic variant mismatch.
    pub fn decode_list(value: &serde_json::Value) -> Result<Vec<Selector>, KabinetError> {
        let items = match value {
            serde_json::Value::Null => return Ok(Vec::new()),
            serde_json::Value::Array(items) => items,
            other => {
                return Err(KabinetError::SchemaError(format!(
                    "selectors must be a list, got {}",
                    other
                )))
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| Self::decode(item).map_err(|e| match e {
                KabinetError::SchemaError(msg) => {
                    KabinetError::SchemaError(format!("selector #{}: {}", index, msg))
                }
                other => other,
            }))
            .collect()
    }

    /// Decode a single selector object
    pub fn decode(value: &serde_json::Value) -> Result<Selector, KabinetError> {
        let kind = value
            .get("kind")
            .ok_or_else(|| KabinetError::SchemaError("missing `kind` discriminator".to_string()))?
            .as_str()
            .ok_or_else(|| KabinetError::SchemaError("`kind` must be a string".to_string()))?;

        if !SELECTOR_KINDS.contains(&kind) {
            return Err(KabinetError::SchemaError(format!(
                "unknown selector kind `{}`",
                kind
            )));
        }

        serde_json::from_value(value.clone())
            .map_err(|e| KabinetError::SchemaError(format!("invalid {} selector: {}", kind, e)))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Selector::Ram(_) => "ram",
            Selector::Cpu(_) => "cpu",
            Selector::Cuda(_) => "cuda",
            Selector::Rocm(_) => "rocm",
            Selector::Label(_) => "label",
            Selector::Service(_) => "service",
        }
    }

    pub fn required(&self) -> bool {
        match self {
            Selector::Ram(s) => s.required,
            Selector::Cpu(s) => s.required,
            Selector::Cuda(s) => s.required,
            Selector::Rocm(s) => s.required,
            Selector::Label(s) => s.required,
            Selector::Service(s) => s.required,
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            Selector::Ram(s) => s.weight,
            Selector::Cpu(s) => s.weight,
            Selector::Cuda(s) => s.weight,
            Selector::Rocm(s) => s.weight,
            Selector::Label(s) => s.weight,
            Selector::Service(s) => s.weight,
        }
    }

    /// Check the selector against backend capabilities, explaining any mismatch
    pub fn check(&self, caps: &Capabilities) -> Result<(), String> {
        match self {
            Selector::Ram(s) => match s.min {
                Some(min) if caps.memory_mb < min => Err(format!(
                    "needs {} MiB of memory, backend has {} MiB",
                    min, caps.memory_mb
                )),
                _ => Ok(()),
            },
            Selector::Cpu(s) => {
                if let Some(min_count) = s.min_count {
                    if caps.cpu_count < min_count {
                        return Err(format!(
                            "needs {} cores, backend has {}",
                            min_count, caps.cpu_count
                        ));
                    }
                }
                if let Some(frequency) = s.frequency {
                    if caps.cpu_frequency_mhz < frequency {
                        return Err(format!(
                            "needs {} MHz, backend runs at {} MHz",
                            frequency, caps.cpu_frequency_mhz
                        ));
                    }
                }
                Ok(())
            }
            Selector::Cuda(s) => {
                let gpu = caps
                    .gpu
                    .as_ref()
                    .ok_or_else(|| "no GPU available on this backend".to_string())?;
                if let Some(actual) = &gpu.cuda_version {
                    if !version_at_least(actual, &s.cuda_version) {
                        return Err(format!(
                            "needs CUDA {}, backend provides {}",
                            s.cuda_version, actual
                        ));
                    }
                }
                if let (Some(min), Some(actual)) = (s.memory, gpu.memory_mb) {
                    if actual < min {
                        return Err(format!(
                            "needs {} MiB of GPU memory, backend has {} MiB",
                            min, actual
                        ));
                    }
                }
                Ok(())
            }
            Selector::Rocm(_) => {
                if caps.rocm_available {
                    Ok(())
                } else {
                    Err("no ROCm device available on this backend".to_string())
                }
            }
            Selector::Label(s) => {
                let Some(key) = &s.key else {
                    return Ok(());
                };
                match (caps.labels.get(key), &s.value) {
                    (None, _) => Err(format!("backend has no label `{}`", key)),
                    (Some(actual), Some(expected)) if actual != expected => Err(format!(
                        "label `{}` is `{}`, expected `{}`",
                        key, actual, expected
                    )),
                    _ => Ok(()),
                }
            }
            Selector::Service(s) => match &s.service {
                Some(name) if !caps.services.iter().any(|svc| svc == name) => {
                    Err(format!("backend does not provide service `{}`", name))
                }
                _ => Ok(()),
            },
        }
    }

    pub fn is_satisfied_by(&self, caps: &Capabilities) -> bool {
        self.check(caps).is_ok()
    }

    /// Weight if satisfied, 0 otherwise. `required` plays no part here.
    pub fn contribution(&self, caps: &Capabilities) -> u64 {
        if self.is_satisfied_by(caps) {
            u64::from(self.weight())
        } else {
            0
        }
    }

    /// Extra `docker run` arguments this selector needs
    pub fn docker_params(&self) -> Vec<String> {
        match self {
            Selector::Cuda(_) => vec!["--gpus".to_string(), "all".to_string()],
            Selector::Rocm(_) => [
                "--device=/dev/kfd",
                "--device=/dev/dri",
                "--group-add",
                "video",
                "--cap-add=SYS_PTRACE",
                "--security-opt",
                "seccomp=unconfined",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            _ => Vec::new(),
        }
    }
}
