use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use zk_executor::server::router;
use zk_executor::service::ExecutorService;

/// The main function for the HTTP mode.
pub(crate) async fn http_main(service: Arc<ExecutorService>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    Ok(axum::serve(listener, router(service)).await?)
}
