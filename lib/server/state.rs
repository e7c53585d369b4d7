//! Shared state for the HTTP server.

use std::sync::Arc;

use crate::management::{LifecycleManager, StatusReporter};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Shared server state handed to every request handler.
///
/// The manager and reporter are internally synchronized, so the state is a
/// plain cheap-to-clone pair of handles.
#[derive(Clone)]
pub struct ServerState {
    /// The lifecycle manager, sole writer to the ledger.
    manager: Arc<LifecycleManager>,

    /// The read-only status reporter.
    reporter: Arc<StatusReporter>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ServerState {
    /// Creates the server state from the manager and reporter handles.
    pub fn new(manager: Arc<LifecycleManager>, reporter: Arc<StatusReporter>) -> Self {
        Self { manager, reporter }
    }

    /// The lifecycle manager handle.
    pub fn manager(&self) -> &Arc<LifecycleManager> {
        &self.manager
    }

    /// The status reporter handle.
    pub fn reporter(&self) -> &Arc<StatusReporter> {
        &self.reporter
    }
}
