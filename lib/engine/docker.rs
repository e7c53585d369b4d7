use std::{process::Stdio, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    time,
};

use crate::{
    config::{ManagerConfig, ResourceLimits},
    ShellboxError, ShellboxResult,
};

use super::{ContainerCounts, ContainerId, ContainerState, ContainerStats, Engine};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The container engine CLI binary.
const DOCKER_BIN: &str = "docker";

/// The terminal-sharing helper spawned inside the container.
const TERMINAL_HELPER: &str = "tmate";

/// The marker the helper prints before the connection string.
const SSH_SESSION_MARKER: &str = "ssh session:";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Docker CLI implementation of the [`Engine`] trait.
///
/// Every call shells out to the `docker` binary with a hard timeout. The
/// terminal-sharing helper is `tmate -F` run via `docker exec`; its stdout is
/// scanned line by line until the connection-string marker appears.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    /// Bound on ordinary engine calls.
    call_timeout: Duration,

    /// Bound on image pulls.
    pull_timeout: Duration,

    /// Bound on terminal-session acquisition.
    session_timeout: Duration,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DockerEngine {
    /// Creates a new Docker engine adapter using the configured timeout policy.
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            call_timeout: *config.get_engine_timeout(),
            pull_timeout: *config.get_pull_timeout(),
            session_timeout: *config.get_session_timeout(),
        }
    }

    /// Runs a docker subcommand, bounded by the given timeout.
    async fn docker(&self, args: &[&str], timeout: Duration) -> ShellboxResult<std::process::Output> {
        let subcommand = args.first().copied().unwrap_or_default();
        let output = Command::new(DOCKER_BIN).args(args).output();

        match time::timeout(timeout, output).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ShellboxError::EngineUnavailable(format!(
                "failed to invoke {} {}: {}",
                DOCKER_BIN, subcommand, e
            ))),
            Err(_) => Err(ShellboxError::EngineUnavailable(format!(
                "{} {} timed out after {:?}",
                DOCKER_BIN, subcommand, timeout
            ))),
        }
    }

    /// Maps a failed lifecycle-primitive invocation to the error taxonomy.
    fn classify_failure(&self, instance_id: &str, stderr: &str) -> ShellboxError {
        if is_not_found(stderr) {
            ShellboxError::NotFound(instance_id.to_string())
        } else {
            ShellboxError::EngineUnavailable(stderr.trim().to_string())
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait::async_trait]
impl Engine for DockerEngine {
    async fn ensure_image(&self, image_ref: &str) -> ShellboxResult<()> {
        let inspect = self
            .docker(&["image", "inspect", image_ref], self.call_timeout)
            .await?;
        if inspect.status.success() {
            return Ok(());
        }

        tracing::info!(image = image_ref, "image not present locally, pulling");
        let pull = self.docker(&["pull", image_ref], self.pull_timeout).await?;
        if !pull.status.success() {
            let stderr = String::from_utf8_lossy(&pull.stderr);
            return Err(ShellboxError::ImagePullFailed(format!(
                "{}: {}",
                image_ref,
                stderr.trim()
            )));
        }

        Ok(())
    }

    async fn run_container(
        &self,
        image_ref: &str,
        limits: &ResourceLimits,
    ) -> ShellboxResult<ContainerId> {
        let cpu_quota = limits.cpu_quota.to_string();
        let cpu_shares = limits.cpu_shares.to_string();
        let restart = format!("on-failure:{}", limits.max_restarts);

        let output = self
            .docker(
                &[
                    "run",
                    "-d",
                    "-t",
                    "--memory",
                    &limits.memory,
                    "--cpu-quota",
                    &cpu_quota,
                    "--cpu-shares",
                    &cpu_shares,
                    "--restart",
                    &restart,
                    image_ref,
                ],
                self.call_timeout,
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShellboxError::ContainerCreateFailed(
                stderr.trim().to_string(),
            ));
        }

        let instance_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if instance_id.is_empty() {
            return Err(ShellboxError::ContainerCreateFailed(
                "engine returned no container id".to_string(),
            ));
        }

        tracing::info!(instance_id = %instance_id, image = image_ref, "container started");
        Ok(instance_id)
    }

    async fn container_state(&self, instance_id: &str) -> ShellboxResult<ContainerState> {
        let output = self
            .docker(
                &["inspect", "--format", "{{.State.Running}}", instance_id],
                self.call_timeout,
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found(&stderr) {
                return Ok(ContainerState::NotFound);
            }
            return Err(ShellboxError::EngineUnavailable(stderr.trim().to_string()));
        }

        match String::from_utf8_lossy(&output.stdout).trim() {
            "true" => Ok(ContainerState::Running),
            _ => Ok(ContainerState::Stopped),
        }
    }

    async fn start_container(&self, instance_id: &str) -> ShellboxResult<()> {
        let output = self
            .docker(&["start", instance_id], self.call_timeout)
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.classify_failure(instance_id, &stderr));
        }
        Ok(())
    }

    async fn stop_container(&self, instance_id: &str) -> ShellboxResult<()> {
        let output = self
            .docker(&["stop", instance_id], self.call_timeout)
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.classify_failure(instance_id, &stderr));
        }
        Ok(())
    }

    async fn restart_container(&self, instance_id: &str) -> ShellboxResult<()> {
        let output = self
            .docker(&["restart", instance_id], self.call_timeout)
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.classify_failure(instance_id, &stderr));
        }
        Ok(())
    }

    async fn remove_container(&self, instance_id: &str) -> ShellboxResult<()> {
        // -f stops the container first if it is still running.
        let output = self
            .docker(&["rm", "-f", instance_id], self.call_timeout)
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.classify_failure(instance_id, &stderr));
        }
        Ok(())
    }

    async fn container_stats(&self, instance_id: &str) -> ShellboxResult<ContainerStats> {
        // `docker stats` computes CPU from two consecutive cumulative samples
        // engine-side; a missing sample degrades to zeros instead of failing.
        let output = self
            .docker(
                &[
                    "stats",
                    "--no-stream",
                    "--format",
                    "{{json .}}",
                    instance_id,
                ],
                self.call_timeout,
            )
            .await?;

        if !output.status.success() {
            tracing::debug!(instance_id = instance_id, "stats sample unavailable");
            return Ok(ContainerStats::default());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_stats_line(stdout.trim()).unwrap_or_default())
    }

    async fn open_terminal_session(&self, instance_id: &str) -> ShellboxResult<String> {
        let mut child = Command::new(DOCKER_BIN)
            .args(["exec", instance_id, TERMINAL_HELPER, "-F"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                ShellboxError::EngineUnavailable(format!(
                    "failed to spawn {} inside {}: {}",
                    TERMINAL_HELPER, instance_id, e
                ))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ShellboxError::CredentialAcquisitionFailed(
                "helper stdout was not captured".to_string(),
            )
        })?;

        let scan = async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(index) = line.find(SSH_SESSION_MARKER) {
                    let credential = line[index + SSH_SESSION_MARKER.len()..].trim();
                    if !credential.is_empty() {
                        return Ok::<Option<String>, std::io::Error>(Some(credential.to_string()));
                    }
                }
            }
            Ok(None)
        };

        match time::timeout(self.session_timeout, scan).await {
            Ok(Ok(Some(credential))) => {
                // The helper stays in the foreground for the lifetime of the
                // session; reap it in the background instead of killing it.
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
                Ok(credential)
            }
            Ok(Ok(None)) => {
                let _ = child.kill().await;
                Err(ShellboxError::CredentialAcquisitionFailed(format!(
                    "{} exited without printing a connection string",
                    TERMINAL_HELPER
                )))
            }
            Ok(Err(e)) => {
                let _ = child.kill().await;
                Err(ShellboxError::CredentialAcquisitionFailed(format!(
                    "failed to read {} output: {}",
                    TERMINAL_HELPER, e
                )))
            }
            Err(_) => {
                let _ = child.kill().await;
                Err(ShellboxError::CredentialAcquisitionFailed(format!(
                    "no connection string within {:?}",
                    self.session_timeout
                )))
            }
        }
    }

    async fn container_counts(&self) -> ShellboxResult<ContainerCounts> {
        let running = self.docker(&["ps", "-q"], self.call_timeout).await?;
        let all = self.docker(&["ps", "-aq"], self.call_timeout).await?;

        if !running.status.success() || !all.status.success() {
            let stderr = String::from_utf8_lossy(&all.stderr);
            return Err(ShellboxError::EngineUnavailable(stderr.trim().to_string()));
        }

        Ok(ContainerCounts {
            running: count_lines(&running.stdout),
            total: count_lines(&all.stdout),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Returns true if the stderr output indicates the container no longer exists
/// at the engine level.
fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("no such container") || lower.contains("no such object")
}

fn count_lines(stdout: &[u8]) -> usize {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
}

/// Parses one line of `docker stats --format '{{json .}}'` output.
fn parse_stats_line(line: &str) -> Option<ContainerStats> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;

    let cpu_percent = value
        .get("CPUPerc")
        .and_then(|v| v.as_str())
        .map(parse_percent)
        .unwrap_or(0.0);

    let (memory_used, memory_limit) = value
        .get("MemUsage")
        .and_then(|v| v.as_str())
        .map(parse_mem_usage)
        .unwrap_or((0, 0));

    Some(ContainerStats {
        cpu_percent,
        memory_used,
        memory_limit,
    })
}

/// Parses a percentage like `12.34%`.
fn parse_percent(text: &str) -> f64 {
    text.trim().trim_end_matches('%').parse().unwrap_or(0.0)
}

/// Parses a usage pair like `123.4MiB / 6GiB` into `(used, limit)` bytes.
fn parse_mem_usage(text: &str) -> (u64, u64) {
    let mut parts = text.splitn(2, '/');
    let used = parts.next().map(parse_size).unwrap_or(0);
    let limit = parts.next().map(parse_size).unwrap_or(0);
    (used, limit)
}

/// Parses a human-readable size like `512KiB`, `6GiB`, or `1.5GB` into bytes.
fn parse_size(text: &str) -> u64 {
    const UNITS: &[(&str, f64)] = &[
        ("TiB", 1024f64 * 1024.0 * 1024.0 * 1024.0),
        ("GiB", 1024f64 * 1024.0 * 1024.0),
        ("MiB", 1024f64 * 1024.0),
        ("KiB", 1024f64),
        ("TB", 1e12),
        ("GB", 1e9),
        ("MB", 1e6),
        ("kB", 1e3),
        ("B", 1.0),
    ];

    let text = text.trim();
    for (suffix, factor) in UNITS {
        if let Some(number) = text.strip_suffix(suffix) {
            return number
                .trim()
                .parse::<f64>()
                .map(|n| (n * factor) as u64)
                .unwrap_or(0);
        }
    }
    text.parse().unwrap_or(0)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
