//! Common constants and helpers used across the crate.

mod defaults;
mod path;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use path::*;
