use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use hkv_router::{session, ApiKeyCache, ConnectionPool, ControlPlaneClient, ForwardDispatcher, SessionDeps};

/// Minimal stand-in for the control plane: serves a fixed key -> tenant
/// mapping and a fixed tenant -> (host, port) mapping.
async fn spawn_fake_control_plane(tenant_id: &'static str, backend_port: u16) -> String {
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn verify(Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
        if params.get("key").map(|k| k.as_str()) == Some("valid-key") {
            Json(serde_json::json!({"tenant_id": "T"}))
        } else {
            Json(serde_json::json!({"tenant_id": null}))
        }
    }

    async fn tenant(axum::extract::Path(_id): axum::extract::Path<String>) -> Json<serde_json::Value> {
        Json(serde_json::json!({"host": "127.0.0.1", "node_port": BACKEND_PORT.load(std::sync::atomic::Ordering::SeqCst)}))
    }

    static BACKEND_PORT: std::sync::atomic::AtomicU16 = std::sync::atomic::AtomicU16::new(0);
    BACKEND_PORT.store(backend_port, std::sync::atomic::Ordering::SeqCst);
    let _ = tenant_id;

    let app = Router::new()
        .route("/api/verify", get(verify))
        .route("/api/tenants/:id", get(tenant));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Fake Storage Node: accepts one connection, replies PONG to any PING.
async fn spawn_fake_storage_node() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                let mut line = String::new();
                while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                    let _ = write_half.write_all(b"+PONG\r\n").await;
                    line.clear();
                }
            });
        }
    });
    port
}

async fn spawn_router(control_plane_url: String) -> String {
    let pool = Arc::new(ConnectionPool::new(8, Duration::from_secs(60)));
    let deps = Arc::new(SessionDeps {
        cache: Arc::new(ApiKeyCache::new(64, Duration::from_secs(30))),
        control_plane: Arc::new(ControlPlaneClient::new(control_plane_url)),
        forward: ForwardDispatcher::spawn(4, 64, pool.clone()),
        pool,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { break };
            let deps = deps.clone();
            tokio::spawn(async move {
                let _ = session::handle_client(stream, deps).await;
            });
        }
    });
    addr
}

#[tokio::test]
async fn invalid_key_is_rejected_and_connection_closes() {
    let backend_port = spawn_fake_storage_node().await;
    let control_plane = spawn_fake_control_plane("T", backend_port).await;
    let router_addr = spawn_router(control_plane).await;

    let mut stream = TcpStream::connect(&router_addr).await.unwrap();
    stream.write_all(b"AUTH bogus-key\r\n").await.unwrap();

    let mut reader = BufReader::new(&mut stream);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "-ERR invalid API key\r\n");
}

#[tokio::test]
async fn valid_key_authenticates_and_proxies_commands() {
    let backend_port = spawn_fake_storage_node().await;
    let control_plane = spawn_fake_control_plane("T", backend_port).await;
    let router_addr = spawn_router(control_plane).await;

    let mut stream = TcpStream::connect(&router_addr).await.unwrap();
    stream.write_all(b"AUTH valid-key\r\n").await.unwrap();

    let mut reader = BufReader::new(&mut stream);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "+OK authenticated as T\r\n");

    stream.write_all(b"PING\r\n").await.unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "+PONG\r\n");
}
