//! REST front end over a [`vouch_network::Network`].
//!
//! Read endpoints expose agent listings, summaries and rankings; the audit
//! endpoint drives a full pairwise exchange under the write lock.

pub mod handlers;
pub mod state;

use std::net::SocketAddr;

pub use handlers::router;
pub use state::AppState;

/// Bind `addr` and serve the REST API until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await
}
