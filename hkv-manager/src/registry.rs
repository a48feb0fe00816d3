//! Owns `{tenant_id -> Keyspace}` and the Storage Node listener + dispatcher
//! started alongside each tenant.
//!
//! The map lock and each tenant's keyspace lock are distinct: a lookup is
//! done under the map lock, the `Arc<Keyspace>` is cloned out, and the map
//! lock is released before the keyspace operation runs. Node-Manager-map →
//! Keyspace is the only lock order this crate takes, never the reverse.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use hkv_common::{resp, HkvError, HkvResult};
use hkv_engine::Keyspace;
use hkv_server::{Dispatcher, StorageNode};

/// Point-in-time view of one tenant, as returned by `GET /node/list`.
#[derive(Debug, Clone)]
pub struct TenantSummary {
    pub tenant_id: String,
    pub port: u16,
    pub running: bool,
    pub memory_used: usize,
    pub key_count: usize,
    pub created_at: DateTime<Utc>,
}

struct TenantNode {
    keyspace: Arc<Keyspace>,
    storage_node: StorageNode,
    created_at: DateTime<Utc>,
}

/// The Node Manager's tenant registry. One instance per process, shared
/// behind an `Arc` with the HTTP control API.
pub struct NodeManager {
    worker_count: usize,
    queue_capacity: usize,
    overhead_bytes: usize,
    nodes: Mutex<HashMap<String, TenantNode>>,
}

impl NodeManager {
    pub fn new(worker_count: usize, queue_capacity: usize, overhead_bytes: usize) -> Self {
        NodeManager {
            worker_count,
            queue_capacity,
            overhead_bytes,
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// Idempotent: a tenant that already has a running Keyspace returns
    /// success without touching it.
    pub async fn start_node(
        &self,
        tenant_id: &str,
        port: u16,
        memory_limit_bytes: usize,
    ) -> HkvResult<()> {
        if self.nodes.lock().contains_key(tenant_id) {
            return Ok(());
        }

        let keyspace = Arc::new(Keyspace::new(
            tenant_id,
            port,
            memory_limit_bytes,
            self.overhead_bytes,
        ));
        keyspace.start()?;

        let dispatcher = Dispatcher::spawn(self.worker_count, self.queue_capacity);
        let storage_node = match StorageNode::bind(keyspace.clone(), dispatcher).await {
            Ok(node) => node,
            Err(err) => {
                let _ = keyspace.stop();
                return Err(err);
            }
        };

        let mut nodes = self.nodes.lock();
        // Another caller may have raced us to start the same tenant while we
        // were binding the socket; keep whichever won and tear down ours.
        if nodes.contains_key(tenant_id) {
            storage_node.abort();
            let _ = keyspace.stop();
            return Ok(());
        }
        nodes.insert(
            tenant_id.to_string(),
            TenantNode {
                keyspace,
                storage_node,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn stop_node(&self, tenant_id: &str) -> HkvResult<()> {
        let node = self.nodes.lock().remove(tenant_id);
        match node {
            Some(node) => {
                node.storage_node.abort();
                node.keyspace.stop()
            }
            None => Err(HkvError::NotFound(format!("tenant {tenant_id}"))),
        }
    }

    /// Dispatches straight into the tenant's Keyspace, bypassing any
    /// network hop — this is what gives `/node/execute` its synchronous
    /// reply.
    pub fn execute_command(&self, tenant_id: &str, command: &str) -> Vec<u8> {
        let keyspace = self.nodes.lock().get(tenant_id).map(|n| n.keyspace.clone());
        match keyspace {
            Some(keyspace) => hkv_engine::execute_line(&keyspace, command),
            None => resp::error("ERR tenant not found"),
        }
    }

    pub fn list_nodes(&self) -> Vec<TenantSummary> {
        self.nodes
            .lock()
            .iter()
            .map(|(tenant_id, node)| {
                let stats = node.keyspace.stats();
                TenantSummary {
                    tenant_id: tenant_id.clone(),
                    port: node.storage_node.port,
                    running: node.keyspace.is_running(),
                    memory_used: stats.used_memory,
                    key_count: stats.key_count,
                    created_at: node.created_at,
                }
            })
            .collect()
    }

    /// Stops and removes every tenant. Called on shutdown.
    pub fn stop_all(&self) {
        let mut nodes = self.nodes.lock();
        for (tenant_id, node) in nodes.drain() {
            node.storage_node.abort();
            if let Err(err) = node.keyspace.stop() {
                tracing::warn!(%tenant_id, %err, "error stopping tenant on shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> NodeManager {
        NodeManager::new(2, 16, 8)
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let manager = manager();
        manager.start_node("t1", 7410, 1 << 20).await.unwrap();
        manager.start_node("t1", 7410, 1 << 20).await.unwrap();
        assert_eq!(manager.list_nodes().len(), 1);
        manager.stop_all();
    }

    #[tokio::test]
    async fn stop_unknown_tenant_is_not_found() {
        let manager = manager();
        let err = manager.stop_node("ghost").unwrap_err();
        assert!(matches!(err, HkvError::NotFound(_)));
    }

    #[tokio::test]
    async fn execute_against_unknown_tenant_replies_not_found() {
        let manager = manager();
        assert_eq!(
            manager.execute_command("ghost", "PING"),
            b"-ERR tenant not found\r\n"
        );
    }

    #[tokio::test]
    async fn execute_roundtrips_through_keyspace() {
        let manager = manager();
        manager.start_node("t1", 7411, 1 << 20).await.unwrap();
        assert_eq!(manager.execute_command("t1", "SET a 1"), b"+OK\r\n");
        assert_eq!(manager.execute_command("t1", "GET a"), b"$1\r\n1\r\n");
        manager.stop_all();
    }

    #[tokio::test]
    async fn double_stop_second_call_is_not_found() {
        let manager = manager();
        manager.start_node("t1", 7412, 1 << 20).await.unwrap();
        manager.stop_node("t1").unwrap();
        assert!(matches!(manager.stop_node("t1"), Err(HkvError::NotFound(_))));
    }
}
