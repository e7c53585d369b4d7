//! HTTP request handlers for the REST API.
//!
//! Handlers are thin: they resolve the requester identity, delegate to the
//! lifecycle manager or the status reporter, and map domain errors to HTTP
//! statuses. The requester identity arrives in the `x-owner-id` header, set by
//! whatever front end sits in front of this API.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::{
    state::ServerState,
    types::{
        error_status, AdminListResponse, CatalogEntry, CatalogResponse, DescribeResponse,
        ErrorResponse, ListResponse, OwnerCount, ProvisionRequest, StateRequest, StateResponse,
    },
};
use crate::ShellboxError;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Header carrying the requester identity.
pub const OWNER_HEADER: &str = "x-owner-id";

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

/// Handler for `POST /instances`.
///
/// Provisions a new sandbox for the requester.
pub async fn provision_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<ProvisionRequest>,
) -> Response {
    let requester = match requester(&headers) {
        Ok(requester) => requester,
        Err(response) => return response,
    };

    match state.manager().provision(&requester, &req.image_key).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Handler for `GET /instances`.
///
/// Lists the requester's own instances.
pub async fn list_handler(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    let requester = match requester(&headers) {
        Ok(requester) => requester,
        Err(response) => return response,
    };

    match state.manager().list(&requester).await {
        Ok(instances) => (StatusCode::OK, Json(ListResponse { instances })).into_response(),
        Err(e) => error_response(e),
    }
}

/// Handler for `GET /instances/{id}`.
///
/// Returns the ledger record joined with the engine's live view. A stale view
/// kicks off a background reconciliation so the ledger converges without
/// blocking the response.
pub async fn describe_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let requester = match requester(&headers) {
        Ok(requester) => requester,
        Err(response) => return response,
    };

    match state.reporter().instance_view(&requester, &id).await {
        Ok(view) => {
            let stale = view.is_stale();
            if stale {
                let manager = state.manager().clone();
                tokio::spawn(async move {
                    if let Err(e) = manager.reconcile().await {
                        tracing::warn!(error = %e, "background reconciliation failed");
                    }
                });
            }
            (StatusCode::OK, Json(DescribeResponse { view, stale })).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Handler for `POST /instances/{id}/state`.
///
/// Applies a start/stop/restart/remove action to the instance.
pub async fn state_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<StateRequest>,
) -> Response {
    let requester = match requester(&headers) {
        Ok(requester) => requester,
        Err(response) => return response,
    };

    match state.manager().change_state(&requester, &id, req.action).await {
        Ok(instance) => (StatusCode::OK, Json(StateResponse { instance })).into_response(),
        Err(e) => error_response(e),
    }
}

/// Handler for `POST /instances/{id}/credential`.
///
/// Obtains a fresh terminal-session credential for a running instance.
pub async fn credential_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let requester = match requester(&headers) {
        Ok(requester) => requester,
        Err(response) => return response,
    };

    match state.manager().regenerate_credential(&requester, &id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Handler for `GET /admin/instances`.
///
/// Lists per-owner instance counts. Admin only.
pub async fn admin_list_handler(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    let requester = match requester(&headers) {
        Ok(requester) => requester,
        Err(response) => return response,
    };

    match state.manager().admin_list(&requester).await {
        Ok(counts) => {
            let owners = counts
                .into_iter()
                .map(|(owner_id, count)| OwnerCount { owner_id, count })
                .collect();
            (StatusCode::OK, Json(AdminListResponse { owners })).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Handler for `GET /images`.
///
/// Lists the provisionable image catalog.
pub async fn catalog_handler(State(state): State<ServerState>) -> Response {
    let images = state
        .manager()
        .catalog()
        .iter()
        .map(|(image_key, descriptor)| CatalogEntry {
            image_key: image_key.clone(),
            descriptor: descriptor.clone(),
        })
        .collect();

    (StatusCode::OK, Json(CatalogResponse { images })).into_response()
}

/// Handler for `GET /host`.
///
/// Samples host resource usage and engine-wide container counts.
pub async fn host_handler(State(state): State<ServerState>) -> Response {
    match state.reporter().host_overview().await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(e) => error_response(e),
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Pulls the requester identity out of the owner header.
fn requester(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: format!("missing or invalid {} header", OWNER_HEADER),
                }),
            )
                .into_response()
        })
}

/// Converts a domain error into its HTTP response.
fn error_response(error: ShellboxError) -> Response {
    let status = error_status(&error);
    if status.is_server_error() {
        tracing::error!(error = %error, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}
