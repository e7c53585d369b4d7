use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    config::{ImageCatalog, ManagerConfig, ResourceLimits},
    engine::{ContainerState, Engine},
    ShellboxError, ShellboxResult,
};

use super::{InstanceRecord, InstanceStatus, Ledger};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A state-changing action on an existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateAction {
    /// Start a stopped instance.
    Start,
    /// Stop a running instance.
    Stop,
    /// Restart an instance.
    Restart,
    /// Remove an instance permanently.
    Remove,
}

/// Orchestrates every instance operation against the engine and the ledger.
///
/// All writes to the ledger go through this type. Provisioning for one owner is
/// serialized by a per-owner lock so concurrent requests cannot overshoot the
/// quota; state changes on one instance are serialized by a per-instance lock.
pub struct LifecycleManager {
    /// The container engine adapter.
    engine: Arc<dyn Engine>,

    /// The durable owner→instances store.
    ledger: Arc<Ledger>,

    /// The catalog of provisionable images.
    catalog: ImageCatalog,

    /// Quota, admin list and timeout policy.
    config: Arc<ManagerConfig>,

    /// Serializes the whole provision sequence per owner.
    owner_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,

    /// Serializes state changes per instance.
    instance_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LifecycleManager {
    /// Creates a lifecycle manager over the given engine, ledger and catalog.
    pub fn new(
        engine: Arc<dyn Engine>,
        ledger: Arc<Ledger>,
        catalog: ImageCatalog,
        config: Arc<ManagerConfig>,
    ) -> Self {
        Self {
            engine,
            ledger,
            catalog,
            config,
            owner_locks: Mutex::new(HashMap::new()),
            instance_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The image catalog this manager provisions from.
    pub fn catalog(&self) -> &ImageCatalog {
        &self.catalog
    }

    /// The configuration this manager runs under.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Provisions a new sandbox for `owner` from the catalog entry `image_key`.
    ///
    /// The sequence is quota check, image pull, container start, credential
    /// acquisition, ledger append — atomic from the requester's point of view.
    /// If any step after container start fails, the container is torn down
    /// before the error is returned, so no engine resource is left behind
    /// without a ledger record.
    ///
    /// The whole sequence runs under a per-owner lock, so two concurrent
    /// requests from the same owner at quota N-1 cannot both pass the quota
    /// check.
    pub async fn provision(&self, owner: &str, image_key: &str) -> ShellboxResult<InstanceRecord> {
        let descriptor = self
            .catalog
            .get(image_key)
            .ok_or_else(|| ShellboxError::UnknownImage(image_key.to_string()))?
            .clone();

        let lock = self.owner_lock(owner).await;
        let _guard = lock.lock_owned().await;

        let quota = *self.config.get_quota();
        let held = self.ledger.count_for(owner).await?;
        if held >= quota {
            return Err(ShellboxError::QuotaExceeded {
                owner: owner.to_string(),
                quota,
            });
        }

        self.engine.ensure_image(descriptor.get_image()).await?;

        let instance_id = self
            .engine
            .run_container(descriptor.get_image(), &ResourceLimits::default())
            .await?;

        let credential = match self.engine.open_terminal_session(&instance_id).await {
            Ok(credential) => credential,
            Err(e) => {
                // The container is up but unreachable. Tear it down so the
                // failed provision leaves nothing behind.
                tracing::warn!(
                    owner,
                    instance_id,
                    error = %e,
                    "terminal session failed, removing orphan container"
                );
                if let Err(cleanup) = self.engine.remove_container(&instance_id).await {
                    tracing::error!(
                        instance_id,
                        error = %cleanup,
                        "orphan container could not be removed"
                    );
                }
                return Err(e);
            }
        };

        let record = InstanceRecord {
            instance_id: instance_id.clone(),
            owner_id: owner.to_string(),
            image_key: image_key.to_string(),
            access_credential: Some(credential),
            created_at: Utc::now(),
            status: InstanceStatus::Running,
        };

        self.ledger.append(record.clone()).await?;
        tracing::info!(owner, instance_id, "instance provisioned");

        Ok(record)
    }

    /// Applies a state action to an instance identified by id or unambiguous
    /// id prefix, on behalf of `requester`.
    ///
    /// Only the owner or an admin may act on an instance. If the engine
    /// reports the container gone, the stale ledger record is dropped and the
    /// call fails with [`ShellboxError::NotFound`].
    ///
    /// Returns the record as it stands after the action (`None` for
    /// [`StateAction::Remove`]).
    pub async fn change_state(
        &self,
        requester: &str,
        id_or_prefix: &str,
        action: StateAction,
    ) -> ShellboxResult<Option<InstanceRecord>> {
        let record = self.authorized_record(requester, id_or_prefix).await?;
        let instance_id = record.instance_id.clone();

        let lock = self.instance_lock(&instance_id).await;
        let _guard = lock.lock_owned().await;

        let outcome = match action {
            StateAction::Start => self.engine.start_container(&instance_id).await,
            StateAction::Stop => self.engine.stop_container(&instance_id).await,
            StateAction::Restart => self.engine.restart_container(&instance_id).await,
            StateAction::Remove => self.engine.remove_container(&instance_id).await,
        };

        if let Err(e) = outcome {
            if matches!(e, ShellboxError::NotFound(_)) {
                // The engine no longer knows this container; the record is
                // stale. Converge the ledger before reporting the miss.
                self.ledger.remove(&instance_id).await?;
                tracing::warn!(instance_id, "stale record dropped, container gone");
            }
            return Err(e);
        }

        let updated = match action {
            StateAction::Remove => {
                self.ledger.remove(&instance_id).await?;
                tracing::info!(instance_id, requester, "instance removed");
                None
            }
            StateAction::Stop => {
                self.ledger
                    .update_status(&instance_id, InstanceStatus::Stopped)
                    .await?;
                self.ledger.find(&instance_id).await?
            }
            StateAction::Start | StateAction::Restart => {
                self.ledger
                    .update_status(&instance_id, InstanceStatus::Running)
                    .await?;

                // A restarted terminal helper means the old connection string
                // is dead. Refresh it best-effort; the action itself already
                // succeeded.
                match self.engine.open_terminal_session(&instance_id).await {
                    Ok(credential) => {
                        self.ledger.update_credential(&instance_id, credential).await?;
                    }
                    Err(e) => {
                        tracing::warn!(
                            instance_id,
                            error = %e,
                            "credential refresh failed after state change"
                        );
                    }
                }
                self.ledger.find(&instance_id).await?
            }
        };

        Ok(updated)
    }

    /// Obtains a fresh terminal-session credential for a running instance.
    ///
    /// Fails with [`ShellboxError::NotRunning`] when the instance is not
    /// currently running. The previous credential is overwritten in the
    /// ledger; it is not revoked, it simply dies with its helper process.
    pub async fn regenerate_credential(
        &self,
        requester: &str,
        id_or_prefix: &str,
    ) -> ShellboxResult<InstanceRecord> {
        let record = self.authorized_record(requester, id_or_prefix).await?;
        let instance_id = record.instance_id.clone();

        let lock = self.instance_lock(&instance_id).await;
        let _guard = lock.lock_owned().await;

        match self.engine.container_state(&instance_id).await? {
            ContainerState::Running => {}
            ContainerState::Stopped => {
                return Err(ShellboxError::NotRunning(instance_id));
            }
            ContainerState::NotFound => {
                self.ledger.remove(&instance_id).await?;
                return Err(ShellboxError::NotFound(instance_id));
            }
        }

        let credential = self.engine.open_terminal_session(&instance_id).await?;
        self.ledger
            .update_credential(&instance_id, credential)
            .await?;
        tracing::info!(instance_id, requester, "credential regenerated");

        self.ledger
            .find(&instance_id)
            .await?
            .ok_or(ShellboxError::NotFound(instance_id))
    }

    /// Lists the requester's own instances, in creation order.
    pub async fn list(&self, owner: &str) -> ShellboxResult<Vec<InstanceRecord>> {
        self.ledger.list_for(owner).await
    }

    /// Lists every owner's instance count. Admin only.
    pub async fn admin_list(
        &self,
        requester: &str,
    ) -> ShellboxResult<Vec<(String, usize)>> {
        if !self.config.is_admin(requester) {
            return Err(ShellboxError::Forbidden(requester.to_string()));
        }

        Ok(self
            .ledger
            .load()
            .await?
            .into_iter()
            .map(|(owner, records)| (owner, records.len()))
            .collect())
    }

    /// Reconciles the ledger against engine reality.
    ///
    /// Records whose containers the engine no longer knows are dropped;
    /// statuses that disagree with the engine are rewritten. Engine resources
    /// with no record are out of scope: nothing here created them, so nothing
    /// here destroys them.
    pub async fn reconcile(&self) -> ShellboxResult<()> {
        let map = self.ledger.load().await?;

        for record in map.values().flatten() {
            let state = match self.engine.container_state(&record.instance_id).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        instance_id = record.instance_id,
                        error = %e,
                        "state probe failed during reconciliation"
                    );
                    continue;
                }
            };

            match state {
                ContainerState::NotFound => {
                    self.ledger.remove(&record.instance_id).await?;
                    tracing::info!(
                        instance_id = record.instance_id,
                        "reconciled away record for missing container"
                    );
                }
                ContainerState::Running if record.status != InstanceStatus::Running => {
                    self.ledger
                        .update_status(&record.instance_id, InstanceStatus::Running)
                        .await?;
                }
                ContainerState::Stopped if record.status != InstanceStatus::Stopped => {
                    self.ledger
                        .update_status(&record.instance_id, InstanceStatus::Stopped)
                        .await?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Resolves an instance the requester is allowed to act on.
    ///
    /// Existence is checked before authorization, so a requester probing a
    /// foreign instance learns it exists but nothing more.
    pub(crate) async fn authorized_record(
        &self,
        requester: &str,
        id_or_prefix: &str,
    ) -> ShellboxResult<InstanceRecord> {
        let record = self
            .ledger
            .find(id_or_prefix)
            .await?
            .ok_or_else(|| ShellboxError::NotFound(id_or_prefix.to_string()))?;

        if record.owner_id != requester && !self.config.is_admin(requester) {
            return Err(ShellboxError::Forbidden(requester.to_string()));
        }

        Ok(record)
    }

    async fn owner_lock(&self, owner: &str) -> Arc<Mutex<()>> {
        let mut locks = self.owner_locks.lock().await;
        locks
            .entry(owner.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn instance_lock(&self, instance_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.instance_locks.lock().await;
        locks
            .entry(instance_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
