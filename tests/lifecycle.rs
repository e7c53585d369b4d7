//! End-to-end lifecycle tests over an in-memory engine fake.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use shellbox::{
    config::{ImageCatalog, ManagerConfig, ResourceLimits},
    engine::{ContainerCounts, ContainerState, ContainerStats, Engine},
    management::{InstanceStatus, Ledger, LifecycleManager, StateAction, StatusReporter},
    ShellboxError, ShellboxResult,
};
use tempfile::TempDir;
use uuid::Uuid;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// In-memory engine double: containers are entries in a map, terminal
/// sessions are numbered connection strings. Failure injection flags let
/// tests exercise the teardown paths.
#[derive(Default)]
struct FakeEngine {
    containers: Mutex<HashMap<String, bool>>,
    sessions_opened: AtomicU64,
    fail_pull: AtomicBool,
    fail_run: AtomicBool,
    fail_session: AtomicBool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FakeEngine {
    fn container_exists(&self, instance_id: &str) -> bool {
        self.containers.lock().unwrap().contains_key(instance_id)
    }

    fn container_count(&self) -> usize {
        self.containers.lock().unwrap().len()
    }

    /// Simulates a container disappearing behind the manager's back.
    fn drop_container(&self, instance_id: &str) {
        self.containers.lock().unwrap().remove(instance_id);
    }

    /// Simulates a container stopping behind the manager's back.
    fn force_stop(&self, instance_id: &str) {
        if let Some(running) = self.containers.lock().unwrap().get_mut(instance_id) {
            *running = false;
        }
    }

    fn lookup(&self, instance_id: &str) -> ShellboxResult<bool> {
        self.containers
            .lock()
            .unwrap()
            .get(instance_id)
            .copied()
            .ok_or_else(|| ShellboxError::NotFound(instance_id.to_string()))
    }

    fn set_running(&self, instance_id: &str, running: bool) -> ShellboxResult<()> {
        self.lookup(instance_id)?;
        self.containers
            .lock()
            .unwrap()
            .insert(instance_id.to_string(), running);
        Ok(())
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn ensure_image(&self, image_ref: &str) -> ShellboxResult<()> {
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(ShellboxError::ImagePullFailed(image_ref.to_string()));
        }
        Ok(())
    }

    async fn run_container(
        &self,
        image_ref: &str,
        _limits: &ResourceLimits,
    ) -> ShellboxResult<String> {
        if self.fail_run.load(Ordering::SeqCst) {
            return Err(ShellboxError::ContainerCreateFailed(image_ref.to_string()));
        }
        let instance_id = Uuid::new_v4().simple().to_string();
        self.containers
            .lock()
            .unwrap()
            .insert(instance_id.clone(), true);
        Ok(instance_id)
    }

    async fn container_state(&self, instance_id: &str) -> ShellboxResult<ContainerState> {
        match self.containers.lock().unwrap().get(instance_id) {
            Some(true) => Ok(ContainerState::Running),
            Some(false) => Ok(ContainerState::Stopped),
            None => Ok(ContainerState::NotFound),
        }
    }

    async fn start_container(&self, instance_id: &str) -> ShellboxResult<()> {
        self.set_running(instance_id, true)
    }

    async fn stop_container(&self, instance_id: &str) -> ShellboxResult<()> {
        self.set_running(instance_id, false)
    }

    async fn restart_container(&self, instance_id: &str) -> ShellboxResult<()> {
        self.set_running(instance_id, true)
    }

    async fn remove_container(&self, instance_id: &str) -> ShellboxResult<()> {
        self.containers
            .lock()
            .unwrap()
            .remove(instance_id)
            .map(|_| ())
            .ok_or_else(|| ShellboxError::NotFound(instance_id.to_string()))
    }

    async fn container_stats(&self, instance_id: &str) -> ShellboxResult<ContainerStats> {
        self.lookup(instance_id)?;
        Ok(ContainerStats {
            cpu_percent: 12.5,
            memory_used: 256 * 1024 * 1024,
            memory_limit: 6 * 1024 * 1024 * 1024,
        })
    }

    async fn open_terminal_session(&self, instance_id: &str) -> ShellboxResult<String> {
        if self.fail_session.load(Ordering::SeqCst) {
            return Err(ShellboxError::CredentialAcquisitionFailed(
                "helper exited".to_string(),
            ));
        }
        if !self.lookup(instance_id)? {
            return Err(ShellboxError::CredentialAcquisitionFailed(
                "container not running".to_string(),
            ));
        }
        let n = self.sessions_opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("ssh session-{}@fake.example", n))
    }

    async fn container_counts(&self) -> ShellboxResult<ContainerCounts> {
        let containers = self.containers.lock().unwrap();
        Ok(ContainerCounts {
            running: containers.values().filter(|running| **running).count(),
            total: containers.len(),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

struct Harness {
    manager: Arc<LifecycleManager>,
    engine: Arc<FakeEngine>,
    _temp_dir: TempDir,
}

fn harness(quota: usize, admins: &[&str]) -> Harness {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Arc::new(
        ManagerConfig::builder()
            .ledger_path(temp_dir.path().join("ledger.json"))
            .quota(quota)
            .admins(admins.iter().map(|admin| admin.to_string()).collect())
            .build(),
    );

    let engine = Arc::new(FakeEngine::default());
    let ledger = Arc::new(Ledger::new(config.get_ledger_path().clone()));
    let manager = Arc::new(LifecycleManager::new(
        engine.clone(),
        ledger,
        ImageCatalog::builtin(),
        config,
    ));

    Harness {
        manager,
        engine,
        _temp_dir: temp_dir,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_provision_creates_record_with_credential() -> ShellboxResult<()> {
    let h = harness(3, &[]);

    let record = h.manager.provision("u1", "ubuntu-22.04").await?;

    assert_eq!(record.owner_id, "u1");
    assert_eq!(record.image_key, "ubuntu-22.04");
    assert_eq!(record.status, InstanceStatus::Running);
    assert!(record.access_credential.as_deref().unwrap().starts_with("ssh "));
    assert!(h.engine.container_exists(&record.instance_id));

    let listed = h.manager.list("u1").await?;
    assert_eq!(listed, vec![record]);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_quota_blocks_and_frees_on_removal() -> ShellboxResult<()> {
    let h = harness(3, &[]);

    let first = h.manager.provision("u1", "ubuntu-22.04").await?;
    h.manager.provision("u1", "ubuntu-22.04").await?;
    h.manager.provision("u1", "ubuntu-22.04").await?;

    let err = h.manager.provision("u1", "ubuntu-22.04").await.unwrap_err();
    assert!(matches!(
        err,
        ShellboxError::QuotaExceeded { quota: 3, .. }
    ));
    // The rejected attempt must not have touched the engine.
    assert_eq!(h.engine.container_count(), 3);

    // Another owner is not affected.
    h.manager.provision("u2", "ubuntu-22.04").await?;

    // Removal frees a slot.
    h.manager
        .change_state("u1", &first.instance_id, StateAction::Remove)
        .await?;
    h.manager.provision("u1", "ubuntu-22.04").await?;

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_unknown_image_is_rejected_before_engine_calls() -> ShellboxResult<()> {
    let h = harness(3, &[]);

    let err = h.manager.provision("u1", "windows-95").await.unwrap_err();
    assert!(matches!(err, ShellboxError::UnknownImage(_)));
    assert_eq!(h.engine.container_count(), 0);
    assert!(h.manager.list("u1").await?.is_empty());

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_failed_session_leaves_no_orphan() -> ShellboxResult<()> {
    let h = harness(3, &[]);
    h.engine.fail_session.store(true, Ordering::SeqCst);

    let err = h.manager.provision("u1", "ubuntu-22.04").await.unwrap_err();
    assert!(matches!(err, ShellboxError::CredentialAcquisitionFailed(_)));

    // No record and no engine resource: the failed provision is invisible.
    assert!(h.manager.list("u1").await?.is_empty());
    assert_eq!(h.engine.container_count(), 0);

    // And the slot is still usable once the engine recovers.
    h.engine.fail_session.store(false, Ordering::SeqCst);
    h.manager.provision("u1", "ubuntu-22.04").await?;

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_only_owner_or_admin_may_manage() -> ShellboxResult<()> {
    let h = harness(3, &["root-owner"]);

    let record = h.manager.provision("u1", "ubuntu-22.04").await?;

    let err = h
        .manager
        .change_state("u2", &record.instance_id, StateAction::Stop)
        .await
        .unwrap_err();
    assert!(matches!(err, ShellboxError::Forbidden(_)));

    // The instance was left alone.
    let listed = h.manager.list("u1").await?;
    assert_eq!(listed[0].status, InstanceStatus::Running);

    // An admin may act on anyone's instance.
    let stopped = h
        .manager
        .change_state("root-owner", &record.instance_id, StateAction::Stop)
        .await?
        .unwrap();
    assert_eq!(stopped.status, InstanceStatus::Stopped);

    h.manager
        .change_state("root-owner", &record.instance_id, StateAction::Remove)
        .await?;
    assert!(h.manager.list("u1").await?.is_empty());
    assert!(!h.engine.container_exists(&record.instance_id));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_removal_is_final() -> ShellboxResult<()> {
    let h = harness(3, &[]);

    let record = h.manager.provision("u1", "ubuntu-22.04").await?;
    let outcome = h
        .manager
        .change_state("u1", &record.instance_id, StateAction::Remove)
        .await?;

    assert!(outcome.is_none());
    assert!(h.manager.list("u1").await?.is_empty());
    assert!(!h.engine.container_exists(&record.instance_id));

    let err = h
        .manager
        .change_state("u1", &record.instance_id, StateAction::Start)
        .await
        .unwrap_err();
    assert!(matches!(err, ShellboxError::NotFound(_)));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_stale_record_dropped_when_container_gone() -> ShellboxResult<()> {
    let h = harness(3, &[]);

    let record = h.manager.provision("u1", "ubuntu-22.04").await?;
    h.engine.drop_container(&record.instance_id);

    let err = h
        .manager
        .change_state("u1", &record.instance_id, StateAction::Stop)
        .await
        .unwrap_err();
    assert!(matches!(err, ShellboxError::NotFound(_)));

    // The ledger converged on the failure.
    assert!(h.manager.list("u1").await?.is_empty());

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_reconcile_converges_ledger_to_engine() -> ShellboxResult<()> {
    let h = harness(5, &[]);

    let gone = h.manager.provision("u1", "ubuntu-22.04").await?;
    let stopped = h.manager.provision("u1", "ubuntu-22.04").await?;
    let running = h.manager.provision("u2", "ubuntu-22.04").await?;

    h.engine.drop_container(&gone.instance_id);
    h.engine.force_stop(&stopped.instance_id);

    h.manager.reconcile().await?;

    let u1 = h.manager.list("u1").await?;
    assert_eq!(u1.len(), 1);
    assert_eq!(u1[0].instance_id, stopped.instance_id);
    assert_eq!(u1[0].status, InstanceStatus::Stopped);

    let u2 = h.manager.list("u2").await?;
    assert_eq!(u2[0].instance_id, running.instance_id);
    assert_eq!(u2[0].status, InstanceStatus::Running);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_regenerate_requires_running_instance() -> ShellboxResult<()> {
    let h = harness(3, &[]);

    let record = h.manager.provision("u1", "ubuntu-22.04").await?;
    let original = record.access_credential.clone().unwrap();

    let refreshed = h
        .manager
        .regenerate_credential("u1", &record.instance_id)
        .await?;
    let fresh = refreshed.access_credential.unwrap();
    assert_ne!(fresh, original);

    h.engine.force_stop(&record.instance_id);
    let err = h
        .manager
        .regenerate_credential("u1", &record.instance_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ShellboxError::NotRunning(_)));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_start_and_restart_refresh_credential() -> ShellboxResult<()> {
    let h = harness(3, &[]);

    let record = h.manager.provision("u1", "ubuntu-22.04").await?;
    let original = record.access_credential.clone().unwrap();

    h.manager
        .change_state("u1", &record.instance_id, StateAction::Stop)
        .await?;
    let started = h
        .manager
        .change_state("u1", &record.instance_id, StateAction::Start)
        .await?
        .unwrap();

    assert_eq!(started.status, InstanceStatus::Running);
    let after_start = started.access_credential.unwrap();
    assert_ne!(after_start, original);

    let restarted = h
        .manager
        .change_state("u1", &record.instance_id, StateAction::Restart)
        .await?
        .unwrap();
    assert_ne!(restarted.access_credential.unwrap(), after_start);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_instances_addressable_by_id_prefix() -> ShellboxResult<()> {
    let h = harness(3, &[]);

    let record = h.manager.provision("u1", "ubuntu-22.04").await?;
    let prefix = &record.instance_id[..12];

    let stopped = h
        .manager
        .change_state("u1", prefix, StateAction::Stop)
        .await?
        .unwrap();
    assert_eq!(stopped.instance_id, record.instance_id);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_admin_list_requires_privilege() -> ShellboxResult<()> {
    let h = harness(3, &["root-owner"]);

    h.manager.provision("u1", "ubuntu-22.04").await?;
    h.manager.provision("u1", "ubuntu-22.04").await?;
    h.manager.provision("u2", "ubuntu-22.04").await?;

    let err = h.manager.admin_list("u1").await.unwrap_err();
    assert!(matches!(err, ShellboxError::Forbidden(_)));

    let mut counts = h.manager.admin_list("root-owner").await?;
    counts.sort();
    assert_eq!(
        counts,
        vec![("u1".to_string(), 2), ("u2".to_string(), 1)]
    );

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_concurrent_provisions_respect_quota() -> ShellboxResult<()> {
    let h = harness(3, &[]);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = h.manager.clone();
        handles.push(tokio::spawn(async move {
            manager.provision("u1", "ubuntu-22.04").await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(h.manager.list("u1").await?.len(), 3);
    assert_eq!(h.engine.container_count(), 3);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_reporter_joins_record_with_live_view() -> ShellboxResult<()> {
    let h = harness(3, &[]);
    let reporter = StatusReporter::new(h.manager.clone(), h.engine.clone());

    let record = h.manager.provision("u1", "ubuntu-22.04").await?;

    let view = reporter.instance_view("u1", &record.instance_id).await?;
    assert_eq!(view.live_state, ContainerState::Running);
    assert!(!view.is_stale());
    assert!(view.stats.memory_percent() > 0.0);

    h.engine.force_stop(&record.instance_id);
    let view = reporter.instance_view("u1", &record.instance_id).await?;
    assert_eq!(view.live_state, ContainerState::Stopped);
    assert!(view.is_stale());

    let err = reporter
        .instance_view("u2", &record.instance_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ShellboxError::Forbidden(_)));

    Ok(())
}
