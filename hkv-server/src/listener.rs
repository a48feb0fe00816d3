//! Per-tenant Storage Node: a raw TCP listener bound to the tenant's
//! assigned port, speaking the same inline-command / RESP2-reply wire the
//! Router proxies byte-for-byte.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use hkv_common::{resp, HkvError, HkvResult};
use hkv_engine::Keyspace;

use crate::dispatcher::Dispatcher;

const MAX_LINE_BYTES: usize = 64 * 1024;

/// A running Storage Node listener for one tenant. Aborting the handle
/// stops accepting new connections; connections already open run to
/// completion on their own.
pub struct StorageNode {
    pub port: u16,
    accept_task: JoinHandle<()>,
}

impl StorageNode {
    /// Binds the listener and starts accepting connections in the
    /// background. Returns once the socket is bound so the caller can
    /// report success/failure back through the control API immediately.
    pub async fn bind(keyspace: Arc<Keyspace>, dispatcher: Dispatcher) -> HkvResult<Self> {
        let port = keyspace.port;
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|err| HkvError::Transport(err.to_string()))?;

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let keyspace = keyspace.clone();
                        let dispatcher = dispatcher.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, keyspace, dispatcher).await
                            {
                                tracing::debug!(%err, "storage node connection closed");
                            }
                        });
                    }
                    Err(err) => {
                        tracing::warn!(%err, "storage node accept loop failed, stopping");
                        break;
                    }
                }
            }
        });

        Ok(StorageNode { port, accept_task })
    }

    /// Stops accepting new connections on this port.
    pub fn abort(&self) {
        self.accept_task.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    keyspace: Arc<Keyspace>,
    dispatcher: Dispatcher,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

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
        if trimmed.len() > MAX_LINE_BYTES {
            write_half
                .write_all(&resp::error("ERR command line too long"))
                .await?;
            continue;
        }

        match dispatcher.try_submit(keyspace.clone(), trimmed.to_string()) {
            Ok(rx) => match rx.await {
                Ok(response) => write_half.write_all(&response).await?,
                Err(_) => write_half.write_all(&resp::error("ERR internal error")).await?,
            },
            Err(()) => write_half.write_all(&resp::error("ERR server busy")).await?,
        }
    }

    Ok(())
}
