//! Node Manager binary: loads configuration, brings up the JSON control
//! API, and stops every tenant cleanly on shutdown.
//!
//! Exit codes: 0 normal shutdown, 1 configuration error or fatal bind
//! failure.

use std::sync::Arc;

use hkv_manager::{http, ManagerConfig, NodeManager};

#[tokio::main]
async fn main() {
    hkv_common::logging::init();
    hkv_common::config::load_dotenv();

    if let Err(err) = run().await {
        tracing::error!(%err, "node manager exiting");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ManagerConfig::from_env()?;

    let manager = Arc::new(NodeManager::new(
        config.worker_count,
        config.request_queue_capacity,
        config.entry_overhead_bytes,
    ));

    let app = http::router(manager.clone(), config.tenant_default_memory_mb);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.node_manager_port)).await?;
    tracing::info!(port = config.node_manager_port, "node manager listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.stop_all();
    tracing::info!("node manager shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
