//! Request and response types for the REST API.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    config::ImageDescriptor,
    management::{InstanceRecord, InstanceView, StateAction},
    ShellboxError,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Request body for `POST /instances`.
#[derive(Debug, Deserialize)]
pub struct ProvisionRequest {
    /// Catalog key of the image to provision from.
    pub image_key: String,
}

/// Request body for `POST /instances/{id}/state`.
#[derive(Debug, Deserialize)]
pub struct StateRequest {
    /// The action to apply.
    pub action: StateAction,
}

/// Response body for `GET /instances`.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// The requester's instances, in creation order.
    pub instances: Vec<InstanceRecord>,
}

/// Response body for `GET /instances/{id}`.
#[derive(Debug, Serialize)]
pub struct DescribeResponse {
    /// The ledger record joined with the engine's live view.
    #[serde(flatten)]
    pub view: InstanceView,

    /// True when the record and the live view disagreed at read time.
    pub stale: bool,
}

/// Response body for `POST /instances/{id}/state` (absent for remove).
#[derive(Debug, Serialize)]
pub struct StateResponse {
    /// The record after the action, if the instance still exists.
    pub instance: Option<InstanceRecord>,
}

/// One entry of the admin-wide listing.
#[derive(Debug, Serialize)]
pub struct OwnerCount {
    /// The owner identity.
    pub owner_id: String,

    /// How many instances the owner holds.
    pub count: usize,
}

/// Response body for `GET /admin/instances`.
#[derive(Debug, Serialize)]
pub struct AdminListResponse {
    /// Per-owner instance counts.
    pub owners: Vec<OwnerCount>,
}

/// One entry of the catalog listing.
#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    /// The catalog key used when provisioning.
    pub image_key: String,

    /// The descriptor behind the key.
    #[serde(flatten)]
    pub descriptor: ImageDescriptor,
}

/// Response body for `GET /images`.
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    /// Catalog entries in key order.
    pub images: Vec<CatalogEntry>,
}

/// Error response returned when an operation fails.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Maps a domain error onto the HTTP status it should surface as.
pub fn error_status(error: &ShellboxError) -> StatusCode {
    match error {
        ShellboxError::QuotaExceeded { .. } | ShellboxError::NotRunning(_) => StatusCode::CONFLICT,
        ShellboxError::UnknownImage(_) => StatusCode::BAD_REQUEST,
        ShellboxError::NotFound(_) => StatusCode::NOT_FOUND,
        ShellboxError::Forbidden(_) => StatusCode::FORBIDDEN,
        ShellboxError::ImagePullFailed(_)
        | ShellboxError::ContainerCreateFailed(_)
        | ShellboxError::CredentialAcquisitionFailed(_) => StatusCode::BAD_GATEWAY,
        ShellboxError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_status(&ShellboxError::QuotaExceeded {
                owner: "u1".to_string(),
                quota: 3
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_status(&ShellboxError::UnknownImage("nope".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&ShellboxError::NotFound("abc".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&ShellboxError::Forbidden("u2".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            error_status(&ShellboxError::EngineUnavailable("down".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_status(&ShellboxError::CredentialAcquisitionFailed(
                "timeout".to_string()
            )),
            StatusCode::BAD_GATEWAY
        );
    }
}
