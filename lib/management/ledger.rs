use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};

use crate::ShellboxResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The ledger status of an instance.
///
/// Updated by the lifecycle manager on every successful action; not verified
/// against the engine on every read. The live state belongs to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// The instance was running after the last successful action.
    Running,
    /// The instance was stopped after the last successful action.
    Stopped,
    /// The instance state could not be determined.
    Unknown,
}

/// One ledger entry per provisioned sandbox.
///
/// A record is created only after the engine has started a container AND a
/// credential has been obtained, and is removed only once the engine resource
/// is gone — partial provisioning never produces a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Engine-assigned identifier, unique across the whole ledger.
    pub instance_id: String,

    /// The owning identity. Immutable.
    pub owner_id: String,

    /// Reference into the image catalog. Immutable.
    pub image_key: String,

    /// The current terminal-session connection string, if any.
    pub access_credential: Option<String>,

    /// When the instance was provisioned.
    pub created_at: DateTime<Utc>,

    /// The last status written by the lifecycle manager.
    pub status: InstanceStatus,
}

/// The full persisted mapping: owner → ordered instance records
/// (insertion order = creation order).
pub type LedgerMap = BTreeMap<String, Vec<InstanceRecord>>;

/// Durable owner→instances store backed by a single JSON file.
///
/// Every mutation is a full load→mutate→save cycle serialized by an internal
/// mutex, so interleaved mutations can never lose each other's writes. Saves
/// go through a temp file and rename, so a crash mid-write leaves the previous
/// good file in place.
///
/// A missing or malformed file loads as an empty store. That favors
/// availability over hard consistency: the control plane keeps serving, and
/// reconciliation re-converges records against engine reality.
pub struct Ledger {
    /// Path of the backing JSON file.
    path: PathBuf,

    /// Serializes load→mutate→save cycles.
    write_lock: Mutex<()>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Ledger {
    /// Creates a ledger over the given backing file. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the full mapping from disk.
    ///
    /// A missing file is an empty store; a malformed file is logged and also
    /// treated as empty.
    pub async fn load(&self) -> ShellboxResult<LedgerMap> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LedgerMap::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ledger file is malformed, treating as empty"
                );
                Ok(LedgerMap::new())
            }
        }
    }

    /// Writes the full mapping to disk atomically (temp file + rename).
    pub async fn save(&self, map: &LedgerMap) -> ShellboxResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(map)?).await?;
        fs::rename(&tmp_path, &self.path).await?;

        Ok(())
    }

    /// Appends a record under its owner.
    pub async fn append(&self, record: InstanceRecord) -> ShellboxResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        map.entry(record.owner_id.clone()).or_default().push(record);
        self.save(&map).await
    }

    /// Removes the record with the given instance id, wherever it is found.
    ///
    /// Returns true if a record was removed. Owners with no remaining records
    /// stay in the mapping with an empty list.
    pub async fn remove(&self, instance_id: &str) -> ShellboxResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;

        let mut removed = false;
        for records in map.values_mut() {
            let before = records.len();
            records.retain(|record| record.instance_id != instance_id);
            removed |= records.len() != before;
        }

        if removed {
            self.save(&map).await?;
        }
        Ok(removed)
    }

    /// Updates the status of the record with the given instance id, in place.
    ///
    /// Returns true if a record was updated.
    pub async fn update_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
    ) -> ShellboxResult<bool> {
        self.update_record(instance_id, |record| record.status = status)
            .await
    }

    /// Overwrites the stored credential of the record with the given instance
    /// id. The previous credential is simply discarded.
    ///
    /// Returns true if a record was updated.
    pub async fn update_credential(
        &self,
        instance_id: &str,
        credential: String,
    ) -> ShellboxResult<bool> {
        self.update_record(instance_id, |record| {
            record.access_credential = Some(credential.clone())
        })
        .await
    }

    /// Lists records for one owner, in creation order.
    pub async fn list_for(&self, owner: &str) -> ShellboxResult<Vec<InstanceRecord>> {
        Ok(self.load().await?.remove(owner).unwrap_or_default())
    }

    /// Counts records held by one owner.
    pub async fn count_for(&self, owner: &str) -> ShellboxResult<usize> {
        Ok(self
            .load()
            .await?
            .get(owner)
            .map(Vec::len)
            .unwrap_or_default())
    }

    /// Finds a record by instance id or by an unambiguous id prefix.
    ///
    /// Returns `None` when nothing matches or when a prefix matches more than
    /// one instance.
    pub async fn find(&self, id_or_prefix: &str) -> ShellboxResult<Option<InstanceRecord>> {
        if id_or_prefix.is_empty() {
            return Ok(None);
        }

        let map = self.load().await?;
        let mut matches = map
            .values()
            .flatten()
            .filter(|record| record.instance_id.starts_with(id_or_prefix));

        let first = matches.next().cloned();
        if matches.next().is_some() {
            return Ok(None);
        }
        Ok(first)
    }

    async fn update_record(
        &self,
        instance_id: &str,
        mut apply: impl FnMut(&mut InstanceRecord),
    ) -> ShellboxResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;

        let mut updated = false;
        for records in map.values_mut() {
            for record in records.iter_mut() {
                if record.instance_id == instance_id {
                    apply(record);
                    updated = true;
                }
            }
        }

        if updated {
            self.save(&map).await?;
        }
        Ok(updated)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
