//! REST API over the joint controller

pub mod dto;
pub mod error;
pub mod extract;
pub mod routes;

use std::future::Future;

use tokio::net::TcpListener;

pub use error::ApiError;
pub use routes::{router, AppState};

/// Serve the API on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "REST API listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
