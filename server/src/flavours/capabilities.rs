//! Backend capabilities
//!
//! What a backend can offer to a flavour. Detected from the host at startup and
//! optionally overridden from settings.

use std::collections::HashMap;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tokio::process::Command;
use tracing::debug;

use crate::storage::settings::CapabilitySettings;

/// NVIDIA GPU details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub count: usize,
    pub driver_version: Option<String>,
    pub cuda_version: Option<String>,
    /// Memory of the largest GPU in MiB
    pub memory_mb: Option<u64>,
}

/// Declared capabilities of a backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub cpu_count: usize,
    pub cpu_frequency_mhz: u64,
    pub memory_mb: u64,
    pub gpu: Option<GpuInfo>,
    pub rocm_available: bool,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub services: Vec<String>,
}

impl Capabilities {
    pub fn gpu_available(&self) -> bool {
        self.gpu.is_some()
    }

    /// Probe the host, then apply overrides
    pub async fn detect(overrides: &CapabilitySettings) -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let cpu_frequency_mhz = sys.cpus().iter().map(|c| c.frequency()).max().unwrap_or(0);

        let gpu = match overrides.gpu {
            Some(false) => None,
            _ => probe_nvidia().await,
        };
        let gpu = match (gpu, overrides.gpu) {
            (None, Some(true)) => Some(GpuInfo {
                count: 1,
                ..Default::default()
            }),
            (gpu, _) => gpu,
        };

        let rocm_available = overrides
            .rocm
            .unwrap_or_else(|| std::path::Path::new("/dev/kfd").exists());

        Self {
            cpu_count: sys.cpus().len(),
            cpu_frequency_mhz,
            memory_mb: sys.total_memory() / (1024 * 1024),
            gpu,
            rocm_available,
            labels: overrides.labels.clone(),
            services: overrides.services.clone(),
        }
    }
}

async fn probe_nvidia() -> Option<GpuInfo> {
    let summary = Command::new("nvidia-smi")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()
        .filter(|o| o.status.success())?;
    let summary = String::from_utf8_lossy(&summary.stdout).to_string();

    let mut info = GpuInfo {
        driver_version: extract_after(&summary, "Driver Version:"),
        cuda_version: extract_after(&summary, "CUDA Version:"),
        ..Default::default()
    };

    if let Ok(output) = Command::new("nvidia-smi")
        .args(["--query-gpu=memory.total", "--format=csv,noheader,nounits"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
    {
        let memory: Vec<u64> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|l| l.trim().parse().ok())
            .collect();
        info.count = memory.len().max(1);
        info.memory_mb = memory.into_iter().max();
    }

    debug!("Detected NVIDIA GPU: {:?}", info);
    Some(info)
}

fn extract_after(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    text[start..]
        .split_whitespace()
        .next()
        .map(|s| s.trim_end_matches('|').to_string())
        .filter(|s| !s.is_empty())
}

/// Compare dotted numeric versions ("12.2" >= "10.2")
pub fn version_at_least(actual: &str, required: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| {
                part.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };

    let mut actual = parse(actual);
    let mut required = parse(required);
    let len = actual.len().max(required.len());
    actual.resize(len, 0);
    required.resize(len, 0);
    actual >= required
}
