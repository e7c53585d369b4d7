//! Configuration types for the shellbox control plane.
//!
//! All process-wide knobs — quota, privileged owners, ledger location, timeout
//! policy — are carried in an explicit [`ManagerConfig`] passed into the
//! lifecycle manager at construction, so independent instances (e.g. in tests)
//! never interfere through ambient global state.

use std::{path::PathBuf, time::Duration};

use getset::Getters;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::utils::{
    DEFAULT_ENGINE_TIMEOUT, DEFAULT_PULL_TIMEOUT, DEFAULT_QUOTA, DEFAULT_SESSION_TIMEOUT,
};

mod catalog;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use catalog::*;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The fixed memory cap applied to every sandbox at run time.
pub const DEFAULT_MEMORY_LIMIT: &str = "6g";

/// The fixed CPU quota (in microseconds per scheduling period) applied to every sandbox.
pub const DEFAULT_CPU_QUOTA: u64 = 200_000;

/// The fixed CPU shares (relative weight) applied to every sandbox.
pub const DEFAULT_CPU_SHARES: u64 = 512;

/// The fixed bound on automatic on-failure restarts applied to every sandbox.
pub const DEFAULT_MAX_RESTARTS: u32 = 3;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Configuration for the lifecycle manager and its collaborators.
#[derive(Debug, Clone, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ManagerConfig {
    /// The maximum number of instances one owner may hold simultaneously.
    #[builder(default = DEFAULT_QUOTA)]
    quota: usize,

    /// Owner identities allowed to manage any instance.
    #[builder(default)]
    admins: Vec<String>,

    /// The path of the ledger file.
    #[builder(setter(transform = |path: impl Into<PathBuf>| path.into()))]
    ledger_path: PathBuf,

    /// The bounded wait for terminal-session acquisition.
    #[builder(default = DEFAULT_SESSION_TIMEOUT)]
    session_timeout: Duration,

    /// The bound applied to ordinary engine calls.
    #[builder(default = DEFAULT_ENGINE_TIMEOUT)]
    engine_timeout: Duration,

    /// The bound applied to image pulls.
    #[builder(default = DEFAULT_PULL_TIMEOUT)]
    pull_timeout: Duration,
}

/// Resource limits applied to a sandbox when it is started.
///
/// These are policy constants, not per-request configurable. The catalog's
/// declared resource classes are informational only; what the engine actually
/// enforces is this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Memory cap, in the engine's size syntax (e.g. `6g`).
    pub memory: String,

    /// CPU quota in microseconds per scheduling period.
    pub cpu_quota: u64,

    /// CPU shares (relative weight).
    pub cpu_shares: u64,

    /// Maximum automatic on-failure restarts.
    pub max_restarts: u32,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ManagerConfig {
    /// Returns true if the given owner identity is privileged.
    pub fn is_admin(&self, owner: &str) -> bool {
        self.admins.iter().any(|admin| admin == owner)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory: DEFAULT_MEMORY_LIMIT.to_string(),
            cpu_quota: DEFAULT_CPU_QUOTA,
            cpu_shares: DEFAULT_CPU_SHARES,
            max_restarts: DEFAULT_MAX_RESTARTS,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_config_defaults() {
        let config = ManagerConfig::builder()
            .ledger_path("/tmp/ledger.json")
            .build();

        assert_eq!(*config.get_quota(), DEFAULT_QUOTA);
        assert!(config.get_admins().is_empty());
        assert_eq!(*config.get_session_timeout(), DEFAULT_SESSION_TIMEOUT);
    }

    #[test]
    fn test_admin_membership() {
        let config = ManagerConfig::builder()
            .ledger_path("/tmp/ledger.json")
            .admins(vec!["root-owner".to_string()])
            .build();

        assert!(config.is_admin("root-owner"));
        assert!(!config.is_admin("someone-else"));
    }
}
