//! Docker CLI implementation of the container-runtime client.
//!
//! All Docker interactions go through [`DockerCli`], which provides
//! consistent timeout handling, error mapping to [`RuntimeError`], and a
//! single point where `Command::new("docker")` is constructed.

use super::{ContainerRuntime, ContainerState, ExecOutput, RuntimeError};
use crate::definition::ImageRef;
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Output;
use std::time::Duration;

/// Default timeout for short container operations (create, start, inspect).
const OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra slack granted on top of the caller's grace period when stopping,
/// so the CLI call itself doesn't give up before the daemon does.
const STOP_SLACK: Duration = Duration::from_secs(10);

/// Container-runtime client backed by the `docker` binary.
///
/// Construct once and bind into every service definition; the struct is
/// cheap (zero-sized today).
#[derive(Debug, Clone, Default)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        DockerCli
    }

    /// Run a docker command with a timeout, returning raw Output.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output, RuntimeError> {
        let result = tokio::time::timeout(
            timeout,
            tokio::process::Command::new("docker").args(args).output(),
        )
        .await;

        let cmd_str = format!("docker {}", args.join(" "));

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(RuntimeError::exec_failed(cmd_str, e)),
            Err(_) => Err(RuntimeError::timeout(cmd_str, timeout)),
        }
    }

    /// Run a docker command with a timeout, returning Output only if exit 0.
    /// "No such container" stderr is mapped to `ContainerNotFound`.
    async fn run_success(
        &self,
        args: &[&str],
        timeout: Duration,
        container: &str,
    ) -> Result<Output, RuntimeError> {
        let output = self.run(args, timeout).await?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such container") {
            return Err(RuntimeError::not_found(container));
        }
        if stderr.contains("Cannot connect to the Docker daemon") {
            return Err(RuntimeError::DaemonUnavailable);
        }
        let cmd_str = format!("docker {}", args.join(" "));
        Err(RuntimeError::failed(cmd_str, &output))
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn create(
        &self,
        image: &ImageRef,
        env: &HashMap<String, String>,
    ) -> Result<String, RuntimeError> {
        let image = image.to_string();
        let mut args: Vec<String> = vec!["create".to_string()];
        // Deterministic flag order keeps error messages reproducible.
        let mut keys: Vec<&String> = env.keys().collect();
        keys.sort();
        for key in keys {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, env[key]));
        }
        args.push(image);

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&arg_refs, OP_TIMEOUT).await?;
        if !output.status.success() {
            if String::from_utf8_lossy(&output.stderr).contains("Cannot connect to the Docker daemon")
            {
                return Err(RuntimeError::DaemonUnavailable);
            }
            return Err(RuntimeError::failed("docker create", &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn start(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.run_success(&["start", container_id], OP_TIMEOUT, container_id)
            .await?;
        Ok(())
    }

    async fn stop(&self, container_id: &str, grace: Duration) -> Result<(), RuntimeError> {
        let grace_secs = grace.as_secs().max(1).to_string();
        self.run_success(
            &["stop", "-t", &grace_secs, container_id],
            grace + STOP_SLACK,
            container_id,
        )
        .await?;
        Ok(())
    }

    async fn kill(&self, container_id: &str) -> Result<(), RuntimeError> {
        let output = self.run(&["kill", container_id], OP_TIMEOUT).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Container already stopped or gone, not an error for kill.
        if stderr.contains("No such container") || stderr.contains("is not running") {
            return Ok(());
        }
        Err(RuntimeError::failed("docker kill", &output))
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerState, RuntimeError> {
        let output = self
            .run_success(
                &[
                    "inspect",
                    "-f",
                    "{{.State.Running}} {{.State.ExitCode}}",
                    container_id,
                ],
                OP_TIMEOUT,
                container_id,
            )
            .await?;

        let text = String::from_utf8_lossy(&output.stdout);
        let mut fields = text.split_whitespace();
        let running = fields.next() == Some("true");
        let exit_code = fields.next().and_then(|s| s.parse::<i64>().ok());
        Ok(ContainerState {
            running,
            exit_code: if running { None } else { exit_code },
        })
    }

    async fn exec(
        &self,
        container_id: &str,
        command: &[String],
    ) -> Result<ExecOutput, RuntimeError> {
        let mut args: Vec<&str> = vec!["exec", container_id];
        args.extend(command.iter().map(String::as_str));

        let output = self.run(&args, OP_TIMEOUT).await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() && stderr.contains("No such container") {
            return Err(RuntimeError::not_found(container_id));
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&stderr);
        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            output: combined,
        })
    }
}
