//! HTTP control plane for sandbox management.
//!
//! A thin REST surface over the lifecycle manager and the status reporter:
//! provision, list, inspect, state changes, credential regeneration, the
//! admin-wide listing and the host overview. Requester identity is carried in
//! the `x-owner-id` header by whatever front end sits in front of this API.

use tokio::net::TcpListener;

use crate::ShellboxResult;

mod handlers;
mod routes;
mod state;
mod types;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use handlers::OWNER_HEADER;
pub use routes::*;
pub use state::*;
pub use types::*;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Binds the listener and serves the API until the task is cancelled.
pub async fn serve(state: ServerState, host: &str, port: u16) -> ShellboxResult<()> {
    let router = create_router(state);
    let listener = TcpListener::bind((host, port)).await?;
    tracing::info!(host, port, "control plane listening");

    axum::serve(listener, router).await?;
    Ok(())
}
