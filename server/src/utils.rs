//! Utility functions

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::backends::docker::DockerCli;
use crate::backends::runtime::ContainerRuntime;
use crate::flavours::Capabilities;
use crate::storage::settings::Settings;

/// Version information for the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Generate a random UUID v4
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Calculate SHA256 hash of data
pub fn sha256_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Hex encoding utilities
mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(data: impl AsRef<[u8]>) -> String {
        let data = data.as_ref();
        let mut result = String::with_capacity(data.len() * 2);
        for byte in data {
            result.push(HEX_CHARS[(byte >> 4) as usize] as char);
            result.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        result
    }
}

fn report(label: &str, ok: bool, detail: impl std::fmt::Display) {
    let mark = if ok { "ok".green() } else { "missing".yellow() };
    println!("  {:<14} [{}] {}", label, mark, detail);
}

/// Print what this host offers to flavours and whether the runtime answers
pub async fn run_diagnostic(settings: &Settings) {
    println!("{}", "Kabinet diagnostic".bold());

    let caps = Capabilities::detect(&settings.capabilities).await;
    report("cpu", caps.cpu_count > 0, format!("{} cores @ {} MHz", caps.cpu_count, caps.cpu_frequency_mhz));
    report("memory", caps.memory_mb > 0, format!("{} MiB", caps.memory_mb));
    match &caps.gpu {
        Some(gpu) => report(
            "cuda",
            true,
            format!(
                "{} GPU(s), driver {}, CUDA {}",
                gpu.count,
                gpu.driver_version.as_deref().unwrap_or("?"),
                gpu.cuda_version.as_deref().unwrap_or("?")
            ),
        ),
        None => report("cuda", false, "no NVIDIA GPU detected"),
    }
    report("rocm", caps.rocm_available, if caps.rocm_available { "/dev/kfd present" } else { "no ROCm device" });
    for (key, value) in &caps.labels {
        report("label", true, format!("{}={}", key, value));
    }
    for service in &caps.services {
        report("service", true, service);
    }

    let docker = DockerCli::new(settings.docker.binary.clone());
    match docker.list_networks().await {
        Ok(networks) => {
            let has_network = networks.iter().any(|n| n == &settings.docker.network);
            report("docker", true, format!("{} networks", networks.len()));
            report("network", has_network, &settings.docker.network);
        }
        Err(e) => println!("  {:<14} [{}] {}", "docker", "error".red(), e),
    }
}
