//! Container engine adapter.
//!
//! [`Engine`] is the narrow, stable boundary between the lifecycle manager and
//! the underlying container engine plus the terminal-sharing helper. Keeping
//! the boundary a trait makes the engine swappable: production uses the Docker
//! CLI implementation, tests substitute an in-memory fake.

use async_trait::async_trait;
use serde::Serialize;

use crate::{config::ResourceLimits, ShellboxResult};

mod docker;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use docker::*;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The engine-side state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// The container exists and is running.
    Running,
    /// The container exists but is not running.
    Stopped,
    /// The engine has no such container.
    NotFound,
}

/// Point-in-time resource usage of a container.
///
/// Values are zero when the engine could not produce a sample; stats queries
/// degrade rather than fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ContainerStats {
    /// CPU usage as a percentage of one core (may exceed 100 on multi-core).
    pub cpu_percent: f64,

    /// Memory in use, in bytes.
    pub memory_used: u64,

    /// Memory limit, in bytes.
    pub memory_limit: u64,
}

/// Engine-wide container counts, for the host overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContainerCounts {
    /// Containers currently running.
    pub running: usize,

    /// All containers known to the engine, running or not.
    pub total: usize,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Narrow interface over the container engine and the terminal-sharing helper.
///
/// Every call is bounded: implementations must apply a hard timeout so a hung
/// engine never stalls the whole control plane.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Ensures the image is present locally, pulling it if absent.
    ///
    /// Fails with [`ShellboxError::ImagePullFailed`] on registry or network
    /// errors.
    ///
    /// [`ShellboxError::ImagePullFailed`]: crate::ShellboxError::ImagePullFailed
    async fn ensure_image(&self, image_ref: &str) -> ShellboxResult<()>;

    /// Starts a detached, interactive-capable container under the given fixed
    /// resource limits and returns the engine-assigned instance id.
    async fn run_container(
        &self,
        image_ref: &str,
        limits: &ResourceLimits,
    ) -> ShellboxResult<ContainerId>;

    /// Reports the engine-side state of a container.
    async fn container_state(&self, instance_id: &str) -> ShellboxResult<ContainerState>;

    /// Starts a stopped container.
    async fn start_container(&self, instance_id: &str) -> ShellboxResult<()>;

    /// Stops a running container.
    async fn stop_container(&self, instance_id: &str) -> ShellboxResult<()>;

    /// Restarts a container.
    async fn restart_container(&self, instance_id: &str) -> ShellboxResult<()>;

    /// Removes a container, stopping it first if it is still running.
    async fn remove_container(&self, instance_id: &str) -> ShellboxResult<()>;

    /// Samples resource usage for a container.
    ///
    /// Returns zeroed stats when a sample is unavailable rather than failing.
    async fn container_stats(&self, instance_id: &str) -> ShellboxResult<ContainerStats>;

    /// Spawns the terminal-sharing helper inside the running container and
    /// returns the connection string it prints.
    ///
    /// The wait is bounded; fails with
    /// [`ShellboxError::CredentialAcquisitionFailed`] when the helper exits or
    /// times out without producing a connection string.
    ///
    /// [`ShellboxError::CredentialAcquisitionFailed`]: crate::ShellboxError::CredentialAcquisitionFailed
    async fn open_terminal_session(&self, instance_id: &str) -> ShellboxResult<String>;

    /// Counts running and total containers engine-wide.
    async fn container_counts(&self) -> ShellboxResult<ContainerCounts>;
}

/// An engine-assigned container identifier.
pub type ContainerId = String;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContainerStats {
    /// Memory usage as a percentage of the limit, zero when no limit is known.
    pub fn memory_percent(&self) -> f64 {
        if self.memory_limit == 0 {
            return 0.0;
        }
        (self.memory_used as f64 / self.memory_limit as f64) * 100.0
    }
}
