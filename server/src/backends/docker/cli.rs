//! Docker engine driven through the `docker` CLI

use std::process::Stdio;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use crate::backends::runtime::{
    ContainerInfo, ContainerRuntime, ContainerSpec, PullEvent, PullStream, RunOutcome,
};
use crate::errors::KabinetError;

const INSPECT_FORMAT: &str = "{{.Id}}|{{.Name}}|{{.State.Status}}|{{.State.ExitCode}}";

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null());
        cmd
    }

    async fn output(&self, args: &[&str]) -> Result<std::process::Output, KabinetError> {
        self.command()
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                KabinetError::RuntimeError(format!("Failed to run {} {}: {}", self.binary, args[0], e))
            })
    }
}

fn is_missing(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("no such container") || stderr.contains("no such object")
}

fn is_conflict(stderr: &str) -> bool {
    stderr.contains("Conflict") || stderr.contains("is already in use")
}

/// Split `<layer id>: <status>`; anything else is an image-level line
pub fn parse_pull_line(line: &str) -> PullEvent {
    let line = line.trim();
    if let Some((id, status)) = line.split_once(": ") {
        if id.len() == 12 && id.chars().all(|c| c.is_ascii_hexdigit()) {
            return PullEvent::layer(id, status.trim());
        }
    }
    PullEvent::image(line)
}

pub fn parse_inspect_line(line: &str) -> Option<ContainerInfo> {
    let mut parts = line.trim().splitn(4, '|');
    let id = parts.next()?.to_string();
    let name = parts.next()?.trim_start_matches('/').to_string();
    let state = parts.next()?.to_string();
    let exit_code = parts.next().and_then(|c| c.parse().ok());
    if id.is_empty() {
        return None;
    }
    Some(ContainerInfo {
        id,
        name,
        state,
        exit_code,
    })
}

pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--network".to_string(),
        spec.network.clone(),
    ];

    let mut labels: Vec<_> = spec.labels.iter().collect();
    labels.sort();
    for (key, value) in labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.extend(spec.extra_args.iter().cloned());
    args.push(spec.image.clone());
    if let Some(command) = &spec.command {
        args.extend(command.iter().cloned());
    }
    args
}

enum PullState {
    Reading {
        lines: Lines<BufReader<ChildStdout>>,
        child: Child,
    },
    Done,
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn image_exists(&self, image: &str) -> Result<bool, KabinetError> {
        let output = self
            .output(&["image", "inspect", "--format", "{{.Id}}", image])
            .await?;
        Ok(output.status.success())
    }

    async fn pull_image(&self, image: &str) -> Result<PullStream, KabinetError> {
        info!("Pulling image {}", image);
        let mut child = self
            .command()
            .args(["pull", image])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| KabinetError::RuntimeError(format!("Failed to run docker pull: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| KabinetError::RuntimeError("docker pull has no stdout".to_string()))?;
        let image = image.to_string();

        let events = stream::unfold(
            PullState::Reading {
                lines: BufReader::new(stdout).lines(),
                child,
            },
            move |state| {
                let image = image.clone();
                async move {
                    let PullState::Reading { mut lines, child } = state else {
                        return None;
                    };
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            Some((Ok(parse_pull_line(&line)), PullState::Reading { lines, child }))
                        }
                        Ok(None) => match child.wait_with_output().await {
                            Ok(output) if output.status.success() => None,
                            Ok(output) => Some((
                                Err(KabinetError::RuntimeError(format!(
                                    "docker pull {} failed: {}",
                                    image,
                                    String::from_utf8_lossy(&output.stderr).trim()
                                ))),
                                PullState::Done,
                            )),
                            Err(e) => Some((Err(KabinetError::IoError(e)), PullState::Done)),
                        },
                        Err(e) => Some((Err(KabinetError::IoError(e)), PullState::Done)),
                    }
                }
            },
        );

        Ok(events.boxed())
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, KabinetError> {
        let output = self
            .output(&["container", "inspect", "--format", INSPECT_FORMAT, name])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing(&stderr) {
                return Ok(None);
            }
            return Err(KabinetError::RuntimeError(format!(
                "docker inspect {} failed: {}",
                name,
                stderr.trim()
            )));
        }

        Ok(parse_inspect_line(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<RunOutcome, KabinetError> {
        let args = run_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        debug!("Starting container {} from {}", spec.name, spec.image);

        let output = self.output(&args).await?;
        if output.status.success() {
            let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(RunOutcome::Created(id));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_conflict(&stderr) {
            return Ok(RunOutcome::AlreadyExists);
        }
        Err(KabinetError::RuntimeError(format!(
            "docker run {} failed: {}",
            spec.name,
            stderr.trim()
        )))
    }

    async fn container_logs(&self, name: &str) -> Result<Option<String>, KabinetError> {
        let output = self.output(&["logs", name]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing(&stderr) {
                return Ok(None);
            }
            return Err(KabinetError::RuntimeError(format!(
                "docker logs {} failed: {}",
                name,
                stderr.trim()
            )));
        }

        let mut logs = String::from_utf8_lossy(&output.stdout).to_string();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(Some(logs))
    }

    async fn list_networks(&self) -> Result<Vec<String>, KabinetError> {
        let output = self
            .output(&["network", "ls", "--format", "{{.Name}}"])
            .await?;
        if !output.status.success() {
            return Err(KabinetError::RuntimeError(format!(
                "docker network ls failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}
