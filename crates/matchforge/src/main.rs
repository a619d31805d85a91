//! The `matchforge-server` binary: bind, run, shut down on ctrl-c.

use matchforge::{MatchServer, MatchforgeError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), MatchforgeError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u16>().ok())
        .unwrap_or(6510);

    let server = MatchServer::builder()
        .bind(&format!("0.0.0.0:{port}"))
        .build()
        .await?;
    tracing::info!(addr = %server.local_addr()?, "matchforge listening");

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            handle.shutdown();
        }
    });

    server.run().await
}
