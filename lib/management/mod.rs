//! Instance lifecycle management.
//!
//! The [`Ledger`] is the durable record of who owns what; the
//! [`LifecycleManager`] is the only writer to it and drives every engine
//! operation; the [`StatusReporter`] answers read-only queries by joining
//! ledger records with the engine's live view.

mod ledger;
mod lifecycle;
mod reporter;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use ledger::*;
pub use lifecycle::*;
pub use reporter::*;
