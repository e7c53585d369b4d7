use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default maximum number of instances one owner may hold simultaneously.
pub const DEFAULT_QUOTA: usize = 3;

/// The default host the server listens on.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// The default port the server listens on.
pub const DEFAULT_SERVER_PORT: u16 = 8787;

/// The bounded wait for the terminal-sharing helper to print a connection string.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(20);

/// The bound applied to ordinary engine calls so a hung daemon never stalls the
/// control plane.
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

/// The bound applied to image pulls, which legitimately take much longer than
/// other engine calls.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(600);
