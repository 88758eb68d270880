//! HTTP layer of the chat hub: serves the chat page, streams the default
//! channel to subscribers and accepts posted chat lines.

use log::*;
use service::AppState;

mod controller;
pub mod error;
mod params;
pub mod router;
mod sse;

/// Binds the configured interface and port and serves requests until the
/// listener fails.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let listen_addr = app_state.config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;

    info!("Server starting... listening for connections on http://{listen_addr}");

    axum::serve(listener, router::define_routes(app_state)).await
}
