//! Router binary: accepts client connections on `ROUTER_PORT` and proxies
//! authenticated traffic to tenant Storage Nodes.
//!
//! Exit codes: 0 normal shutdown, 1 configuration error or fatal bind
//! failure.

use std::sync::Arc;
use std::time::Duration;

use hkv_router::{
    session, ApiKeyCache, ConnectionPool, ControlPlaneClient, ForwardDispatcher, RouterConfig,
    SessionDeps,
};

#[tokio::main]
async fn main() {
    hkv_common::logging::init();
    hkv_common::config::load_dotenv();

    if let Err(err) = run().await {
        tracing::error!(%err, "router exiting");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = RouterConfig::from_env()?;

    let pool = Arc::new(ConnectionPool::new(
        config.pool_max_idle_per_port,
        config.pool_idle_timeout,
    ));
    let deps = Arc::new(SessionDeps {
        cache: Arc::new(ApiKeyCache::new(config.cache_capacity, config.cache_ttl)),
        control_plane: Arc::new(ControlPlaneClient::new(config.control_plane_url.clone())),
        forward: ForwardDispatcher::spawn(
            config.forward_workers,
            config.forward_queue_capacity,
            pool.clone(),
        ),
        pool: pool.clone(),
    });

    spawn_pool_sweeper(pool);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.router_port)).await?;
    tracing::info!(port = config.router_port, "router listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                let deps = deps.clone();
                tokio::spawn(async move {
                    if let Err(err) = session::handle_client(stream, deps).await {
                        tracing::debug!(%peer_addr, %err, "router connection closed");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}

fn spawn_pool_sweeper(pool: Arc<ConnectionPool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            let removed = pool.sweep_once();
            if removed > 0 {
                tracing::debug!(removed, "swept idle router connections");
            }
        }
    });
}
