//! Container stack management through `docker compose` / `podman compose`.
//!
//! Only the configured services are ever passed to compose, and `up` runs
//! with `--no-deps`, so the datastore, object store and the deployer's own
//! container are left running across deploys.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use smartdiary_deploy_core::services::{compose_build_args, compose_up_args, ComposeTarget};
use tokio::process::Command;

use crate::error::{DeployError, Result};

/// Rebuilds and recreates compose services.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn build(&self, services: &[String]) -> Result<()>;

    async fn recreate(&self, services: &[String]) -> Result<()>;
}

/// Container runtime (Docker or Podman).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ContainerRuntime {
    /// Use docker if available, otherwise podman.
    #[default]
    Auto,
    Docker,
    Podman,
}

/// Returns the command name for a concrete runtime.
pub fn runtime_command(runtime: ContainerRuntime) -> &'static str {
    match runtime {
        ContainerRuntime::Podman => "podman",
        ContainerRuntime::Docker | ContainerRuntime::Auto => "docker",
    }
}

/// Resolves `Auto` by checking which runtime answers `--version`.
///
/// Explicit choices are returned as-is; a missing binary surfaces later as a
/// compose error.
pub async fn detect_runtime(preference: ContainerRuntime) -> Result<ContainerRuntime> {
    if preference != ContainerRuntime::Auto {
        return Ok(preference);
    }

    for runtime in [ContainerRuntime::Docker, ContainerRuntime::Podman] {
        let output = Command::new(runtime_command(runtime))
            .arg("--version")
            .output()
            .await;

        if let Ok(output) = output {
            if output.status.success() {
                return Ok(runtime);
            }
        }
    }

    Err(DeployError::ContainerRuntimeNotFound(
        "Neither docker nor podman found in PATH".to_string(),
    ))
}

/// `Orchestrator` driving the compose CLI from the repository checkout.
///
/// Each call is bounded by `timeout`; a compose process that outlives it is
/// killed.
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
    target: ComposeTarget,
    work_dir: PathBuf,
    timeout: Duration,
}

impl ComposeCli {
    pub fn new(
        runtime: ContainerRuntime,
        target: ComposeTarget,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: runtime_command(runtime).to_string(),
            target,
            work_dir: work_dir.into(),
            timeout,
        }
    }

    async fn run(&self, operation: &'static str, args: Vec<String>) -> Result<()> {
        let cmd = &self.program;
        tracing::info!(command = %format!("{} {}", cmd, args.join(" ")), "Running compose");

        let mut command = Command::new(cmd);
        command
            .args(&args)
            .current_dir(&self.work_dir)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| DeployError::ComposeTimeout {
                operation,
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| DeployError::Compose {
                operation,
                message: format!("failed to run {cmd}: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Compose {
                operation,
                message: last_lines(stderr.trim(), 20),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Orchestrator for ComposeCli {
    async fn build(&self, services: &[String]) -> Result<()> {
        self.run("build", compose_build_args(&self.target, services))
            .await
    }

    async fn recreate(&self, services: &[String]) -> Result<()> {
        self.run("up", compose_up_args(&self.target, services)).await
    }
}

/// Build output is long; the tail carries the failing step.
fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}
