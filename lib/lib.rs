//! `shellbox` provisions short-lived, resource-bounded compute sandboxes on demand and
//! grants each requester exclusive remote-terminal access to their sandbox.
//!
//! # Overview
//!
//! shellbox is a small control plane over a container engine. It handles:
//! - Sandbox provisioning from a curated image catalog
//! - Per-owner quotas and ownership enforcement
//! - Terminal-session credential acquisition and regeneration
//! - A durable owner→instances ledger, reconciled against engine reality
//!
//! # Architecture
//!
//! shellbox consists of a few key components:
//!
//! - **Ledger**: durable owner→instance-records store (JSON file)
//! - **Engine**: narrow adapter trait over the container engine and the
//!   terminal-sharing helper, with a Docker CLI implementation
//! - **LifecycleManager**: orchestrates provisioning, state changes, credential
//!   regeneration, and ledger/engine reconciliation
//! - **StatusReporter**: read-only per-instance and host-level views
//! - **Server**: REST presentation layer over the manager and reporter
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use shellbox::{
//!     config::{ImageCatalog, ManagerConfig},
//!     engine::DockerEngine,
//!     management::{Ledger, LifecycleManager},
//! };
//!
//! #[tokio::main]
//! async fn main() -> shellbox::ShellboxResult<()> {
//!     let config = Arc::new(
//!         ManagerConfig::builder()
//!             .ledger_path("/tmp/shellbox/ledger.json")
//!             .build(),
//!     );
//!     let engine = Arc::new(DockerEngine::new(&config));
//!     let ledger = Arc::new(Ledger::new(config.get_ledger_path().clone()));
//!     let manager = LifecycleManager::new(engine, ledger, ImageCatalog::builtin(), config);
//!
//!     let record = manager.provision("owner-1", "ubuntu-22.04").await?;
//!     println!("connect with: {:?}", record.access_credential);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Manager configuration, resource limits, and the image catalog
//! - [`engine`] - Container engine adapter trait and the Docker implementation
//! - [`management`] - Ledger, lifecycle manager, and status reporter
//! - [`server`] - REST API server implementation
//! - [`utils`] - Common constants and helpers

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod config;
pub mod engine;
pub mod management;
pub mod server;
pub mod utils;

pub use error::*;
