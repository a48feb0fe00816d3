//! Bounded per-port pool of warm TCP connections to Storage Nodes.
//!
//! Mirrors the Keyspace's own sweeper design: a periodic background task
//! evicts idle connections older than the configured timeout, rather than
//! checking age on every borrow.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::net::TcpStream;

use hkv_common::{HkvError, HkvResult};

struct Idle {
    stream: TcpStream,
    since: Instant,
}

struct PortPool {
    idle: VecDeque<Idle>,
}

pub struct ConnectionPool {
    max_idle_per_port: usize,
    idle_timeout: Duration,
    ports: Mutex<HashMap<(String, u16), PortPool>>,
}

impl ConnectionPool {
    pub fn new(max_idle_per_port: usize, idle_timeout: Duration) -> Self {
        ConnectionPool {
            max_idle_per_port,
            idle_timeout,
            ports: Mutex::new(HashMap::new()),
        }
    }

    /// Borrows a warm connection if one is idle, otherwise dials a new one.
    pub async fn acquire(&self, host: &str, port: u16) -> HkvResult<TcpStream> {
        if let Some(stream) = self.pop_idle(host, port) {
            return Ok(stream);
        }
        TcpStream::connect((host, port))
            .await
            .map_err(|err| HkvError::Transport(err.to_string()))
    }

    fn pop_idle(&self, host: &str, port: u16) -> Option<TcpStream> {
        let mut ports = self.ports.lock();
        let pool = ports.get_mut(&(host.to_string(), port))?;
        pool.idle.pop_front().map(|idle| idle.stream)
    }

    /// Returns a connection to the pool for reuse, dropping it instead if
    /// the per-port idle cap is already full.
    pub fn release(&self, host: &str, port: u16, stream: TcpStream) {
        let mut ports = self.ports.lock();
        let pool = ports
            .entry((host.to_string(), port))
            .or_insert_with(|| PortPool { idle: VecDeque::new() });
        if pool.idle.len() < self.max_idle_per_port {
            pool.idle.push_back(Idle { stream, since: Instant::now() });
        }
    }

    /// Drops idle connections older than the configured timeout. Intended
    /// to run on a periodic interval from the router's main task.
    pub fn sweep_once(&self) -> usize {
        let mut removed = 0;
        let mut ports = self.ports.lock();
        for pool in ports.values_mut() {
            let before = pool.idle.len();
            pool.idle.retain(|idle| idle.since.elapsed() < self.idle_timeout);
            removed += before - pool.idle.len();
        }
        removed
    }

    pub fn idle_count(&self, host: &str, port: u16) -> usize {
        self.ports
            .lock()
            .get(&(host.to_string(), port))
            .map(|pool| pool.idle.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn echo_server() -> (String, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((_stream, _)) = listener.accept().await else { break };
            }
        });
        (addr.ip().to_string(), addr.port())
    }

    #[tokio::test]
    async fn reuses_released_connection() {
        let (host, port) = echo_server().await;
        let pool = ConnectionPool::new(4, Duration::from_secs(60));
        let conn = pool.acquire(&host, port).await.unwrap();
        pool.release(&host, port, conn);
        assert_eq!(pool.idle_count(&host, port), 1);
        let _conn = pool.acquire(&host, port).await.unwrap();
        assert_eq!(pool.idle_count(&host, port), 0);
    }

    #[tokio::test]
    async fn sweep_evicts_stale_idle_connections() {
        let (host, port) = echo_server().await;
        let pool = ConnectionPool::new(4, Duration::from_millis(10));
        let conn = pool.acquire(&host, port).await.unwrap();
        pool.release(&host, port, conn);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let removed = pool.sweep_once();
        assert_eq!(removed, 1);
        assert_eq!(pool.idle_count(&host, port), 0);
    }

    #[tokio::test]
    async fn release_beyond_capacity_drops_connection() {
        let (host, port) = echo_server().await;
        let pool = ConnectionPool::new(1, Duration::from_secs(60));
        let a = pool.acquire(&host, port).await.unwrap();
        let b = pool.acquire(&host, port).await.unwrap();
        pool.release(&host, port, a);
        pool.release(&host, port, b);
        assert_eq!(pool.idle_count(&host, port), 1);
    }
}
