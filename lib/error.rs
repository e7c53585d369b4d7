use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a shellbox-related operation.
pub type ShellboxResult<T> = Result<T, ShellboxError>;

/// An error that occurred during a sandbox lifecycle operation.
#[derive(Debug, Error)]
pub enum ShellboxError {
    /// The owner already holds the maximum number of instances.
    #[error("owner {owner} already holds {quota} instances")]
    QuotaExceeded {
        /// The owner that hit the quota.
        owner: String,
        /// The configured per-owner quota.
        quota: usize,
    },

    /// The requested image key is not in the catalog.
    #[error("unknown image key: {0}")]
    UnknownImage(String),

    /// The instance record or engine resource does not exist.
    #[error("instance not found: {0}")]
    NotFound(String),

    /// The caller does not own the instance and is not privileged.
    #[error("owner {0} is not allowed to manage this instance")]
    Forbidden(String),

    /// The engine failed to pull the requested image.
    #[error("image pull failed: {0}")]
    ImagePullFailed(String),

    /// The engine failed to create or start a container.
    #[error("container create failed: {0}")]
    ContainerCreateFailed(String),

    /// The terminal-sharing helper produced no connection string in time.
    #[error("credential acquisition failed: {0}")]
    CredentialAcquisitionFailed(String),

    /// The operation requires a running instance.
    #[error("instance is not running: {0}")]
    NotRunning(String),

    /// The engine daemon could not be reached or timed out.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred while serializing or deserializing JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error that occurred when a join handle returned an error.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}
