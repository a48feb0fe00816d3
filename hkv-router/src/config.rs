//! Environment-driven configuration for the Router binary.

use std::time::Duration;

use hkv_common::config::{get_parsed, get_string, require_parsed};
use hkv_common::HkvResult;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub router_port: u16,
    pub forward_workers: usize,
    pub forward_queue_capacity: usize,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub pool_max_idle_per_port: usize,
    pub pool_idle_timeout: Duration,
    pub control_plane_url: String,
}

impl RouterConfig {
    pub fn from_env() -> HkvResult<Self> {
        Ok(RouterConfig {
            router_port: require_parsed("ROUTER_PORT", 6300)?,
            forward_workers: get_parsed("FORWARD_WORKERS", 8),
            forward_queue_capacity: get_parsed("REQUEST_QUEUE_CAPACITY", 1024),
            cache_capacity: get_parsed("ROUTER_CACHE_CAPACITY", 4096),
            cache_ttl: Duration::from_secs(get_parsed("ROUTER_CACHE_TTL_SECS", 30)),
            pool_max_idle_per_port: get_parsed("ROUTER_POOL_MAX_IDLE_PER_PORT", 32),
            pool_idle_timeout: Duration::from_secs(get_parsed(
                "ROUTER_POOL_IDLE_TIMEOUT_SECS",
                60,
            )),
            control_plane_url: get_string("CONTROL_PLANE_URL", "http://127.0.0.1:5500"),
        })
    }
}
