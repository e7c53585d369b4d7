use std::sync::Arc;

use serde::Serialize;
use sysinfo::{Disks, System};

use crate::{
    engine::{ContainerCounts, ContainerState, ContainerStats, Engine},
    ShellboxResult,
};

use super::{InstanceRecord, InstanceStatus, LifecycleManager};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A read-only snapshot of one instance: the ledger record joined with the
/// engine's live view.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceView {
    /// The ledger record.
    #[serde(flatten)]
    pub record: InstanceRecord,

    /// The state the engine reports right now.
    pub live_state: ContainerState,

    /// Point-in-time resource usage (zeroed when unavailable).
    pub stats: ContainerStats,
}

/// A point-in-time overview of the host and the engine.
#[derive(Debug, Clone, Serialize)]
pub struct HostOverview {
    /// Host CPU usage, percent across all cores.
    pub cpu_percent: f64,

    /// Host memory in use, bytes.
    pub memory_used: u64,

    /// Host memory total, bytes.
    pub memory_total: u64,

    /// Host disk in use, bytes, summed across disks.
    pub disk_used: u64,

    /// Host disk total, bytes, summed across disks.
    pub disk_total: u64,

    /// Engine-wide container counts.
    pub containers: ContainerCounts,
}

/// Read-only status queries over instances and the host.
///
/// The reporter never writes: a stale view (ledger says running, engine says
/// gone) is reported as observed, and convergence is left to the lifecycle
/// manager's reconciliation.
pub struct StatusReporter {
    manager: Arc<LifecycleManager>,
    engine: Arc<dyn Engine>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl InstanceView {
    /// True when the ledger record and the engine disagree about this
    /// instance, including the engine not knowing it at all.
    pub fn is_stale(&self) -> bool {
        !matches!(
            (self.record.status, self.live_state),
            (InstanceStatus::Running, ContainerState::Running)
                | (InstanceStatus::Stopped, ContainerState::Stopped)
        )
    }
}

impl StatusReporter {
    /// Creates a reporter sharing the manager's engine.
    pub fn new(manager: Arc<LifecycleManager>, engine: Arc<dyn Engine>) -> Self {
        Self { manager, engine }
    }

    /// Builds the live view of one instance on behalf of `requester`.
    ///
    /// Ownership rules match the lifecycle manager: the owner or an admin.
    pub async fn instance_view(
        &self,
        requester: &str,
        id_or_prefix: &str,
    ) -> ShellboxResult<InstanceView> {
        let record = self.manager.authorized_record(requester, id_or_prefix).await?;

        let live_state = self.engine.container_state(&record.instance_id).await?;
        let stats = match live_state {
            ContainerState::Running => self.engine.container_stats(&record.instance_id).await?,
            _ => ContainerStats::default(),
        };

        Ok(InstanceView {
            record,
            live_state,
            stats,
        })
    }

    /// Samples host CPU, memory and disk usage plus engine-wide container
    /// counts.
    ///
    /// The sysinfo sampling is blocking, so it runs on the blocking pool.
    pub async fn host_overview(&self) -> ShellboxResult<HostOverview> {
        let containers = self.engine.container_counts().await?;

        let (cpu_percent, memory_used, memory_total, disk_used, disk_total) =
            tokio::task::spawn_blocking(|| {
                let mut system = System::new_all();
                // Two samples separated by the minimum interval; a single
                // sample always reads zero CPU.
                system.refresh_cpu_usage();
                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
                system.refresh_cpu_usage();

                let cpu_percent = system.global_cpu_usage() as f64;
                let memory_used = system.used_memory();
                let memory_total = system.total_memory();

                let disks = Disks::new_with_refreshed_list();
                let disk_total: u64 = disks.iter().map(|d| d.total_space()).sum();
                let disk_free: u64 = disks.iter().map(|d| d.available_space()).sum();

                (
                    cpu_percent,
                    memory_used,
                    memory_total,
                    disk_total.saturating_sub(disk_free),
                    disk_total,
                )
            })
            .await?;

        Ok(HostOverview {
            cpu_percent,
            memory_used,
            memory_total,
            disk_used,
            disk_total,
            containers,
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
