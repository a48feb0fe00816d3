//! Per-client connection state machine: `unauthenticated ->
//! authenticated(tenant_id) -> closed`. Only `AUTH`/`APIKEY` is accepted
//! before authentication; afterwards every line is forwarded to the
//! tenant's Storage Node, except `QUIT` (closes) and `STATS` (answered
//! locally, no proxying).

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use hkv_common::resp;

use crate::cache::{ApiKeyCache, Lookup, TenantEndpoint};
use crate::control_plane::ControlPlaneClient;
use crate::forward::ForwardDispatcher;
use crate::pool::ConnectionPool;

pub struct SessionDeps {
    pub cache: Arc<ApiKeyCache>,
    pub control_plane: Arc<ControlPlaneClient>,
    pub forward: ForwardDispatcher,
    pub pool: Arc<ConnectionPool>,
}

pub async fn handle_client(stream: TcpStream, deps: Arc<SessionDeps>) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    let endpoint = match authenticate(&mut reader, &mut write_half, &deps).await? {
        Some(endpoint) => endpoint,
        None => return Ok(()),
    };

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            continue;
        }

        let upper_first_word = trimmed.split(' ').next().unwrap_or("").to_ascii_uppercase();
        match upper_first_word.as_str() {
            "QUIT" => break,
            "STATS" => {
                let body = stats_body(&deps, &endpoint);
                write_half.write_all(&resp::bulk(body.as_bytes())).await?;
            }
            _ => match deps
                .forward
                .try_submit(endpoint.host.clone(), endpoint.port, trimmed.to_string())
            {
                Ok(rx) => match rx.await {
                    Ok(Ok(reply)) => write_half.write_all(&reply).await?,
                    Ok(Err(err)) => {
                        write_half.write_all(&resp::error_for(&err)).await?;
                    }
                    Err(_) => write_half.write_all(&resp::error("ERR internal error")).await?,
                },
                Err(()) => write_half.write_all(&resp::error("ERR server busy")).await?,
            },
        }
    }

    Ok(())
}

async fn authenticate(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
    deps: &SessionDeps,
) -> std::io::Result<Option<TenantEndpoint>> {
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let mut parts = trimmed.splitn(2, ' ');
    let command = parts.next().unwrap_or("").to_ascii_uppercase();
    let api_key = parts.next().unwrap_or("");

    if command != "AUTH" && command != "APIKEY" || api_key.is_empty() {
        write_half
            .write_all(&resp::error("ERR invalid API key"))
            .await?;
        return Ok(None);
    }

    match resolve(deps, api_key).await {
        Some(endpoint) => {
            let message = format!("OK authenticated as {}", endpoint.tenant_id);
            write_half.write_all(&resp::simple(&message)).await?;
            Ok(Some(endpoint))
        }
        None => {
            write_half
                .write_all(&resp::error("ERR invalid API key"))
                .await?;
            Ok(None)
        }
    }
}

async fn resolve(deps: &SessionDeps, api_key: &str) -> Option<TenantEndpoint> {
    match deps.cache.get(api_key) {
        Lookup::Authenticated(endpoint) => return Some(endpoint),
        Lookup::Denied => return None,
        Lookup::Unknown => {}
    }

    let tenant_id = match deps.control_plane.verify_key(api_key).await {
        Ok(Some(tenant_id)) => tenant_id,
        _ => {
            deps.cache.put_denied(api_key);
            return None;
        }
    };

    let (host, port) = match deps.control_plane.tenant_endpoint(&tenant_id).await {
        Ok(endpoint) => endpoint,
        Err(_) => {
            deps.cache.put_denied(api_key);
            return None;
        }
    };

    let endpoint = TenantEndpoint { tenant_id, host, port };
    deps.cache.put_authenticated(api_key, endpoint.clone());
    Some(endpoint)
}

fn stats_body(deps: &SessionDeps, endpoint: &TenantEndpoint) -> String {
    format!(
        "tenant:{}\r\ncached_keys:{}\r\npooled_idle:{}\r\n",
        endpoint.tenant_id,
        deps.cache.len(),
        deps.pool.idle_count(&endpoint.host, endpoint.port)
    )
}
