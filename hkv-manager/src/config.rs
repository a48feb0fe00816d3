//! Environment-driven configuration for the Node Manager binary.

use hkv_common::config::{get_parsed, require_parsed};
use hkv_common::HkvResult;

/// Knobs read once at startup. Bind ports are fatal on a present-but-garbage
/// value; tuning knobs fall back to their default.
#[derive(Debug, Clone, Copy)]
pub struct ManagerConfig {
    pub node_manager_port: u16,
    pub tenant_default_memory_mb: u64,
    pub worker_count: usize,
    pub request_queue_capacity: usize,
    pub entry_overhead_bytes: usize,
}

impl ManagerConfig {
    pub fn from_env() -> HkvResult<Self> {
        Ok(ManagerConfig {
            node_manager_port: require_parsed("NODE_MANAGER_PORT", 7000)?,
            tenant_default_memory_mb: get_parsed("TENANT_DEFAULT_MEMORY_MB", 40),
            worker_count: get_parsed("WORKER_COUNT", 4),
            request_queue_capacity: get_parsed("REQUEST_QUEUE_CAPACITY", 1024),
            entry_overhead_bytes: get_parsed("ENTRY_OVERHEAD_BYTES", 48),
        })
    }
}
