use std::sync::Arc;

use anyhow::Context;
use db::SqliteDocumentStore;
use server::{AppState, config::ServerConfig, routes};
use tracing::info;
use utils::logging::{default_log_level, init_tracing};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    init_tracing(default_log_level());

    let config = ServerConfig::from_env()?;
    let store = SqliteDocumentStore::connect(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    let addr = config.bind_addr();
    let app = routes::router(AppState::new(Arc::new(store), config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
