//! Route definitions for the HTTP server.

use axum::{
    routing::{get, post},
    Router,
};

use super::{handlers, state::ServerState};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates the router with every API endpoint configured.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route(
            "/instances",
            post(handlers::provision_handler).get(handlers::list_handler),
        )
        .route("/instances/{id}", get(handlers::describe_handler))
        .route("/instances/{id}/state", post(handlers::state_handler))
        .route(
            "/instances/{id}/credential",
            post(handlers::credential_handler),
        )
        .route("/admin/instances", get(handlers::admin_list_handler))
        .route("/images", get(handlers::catalog_handler))
        .route("/host", get(handlers::host_handler))
        .with_state(state)
}
