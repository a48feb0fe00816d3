//! Bounded, TTL'd API-key -> tenant cache.
//!
//! The control plane is the only authority (I5); this is a write-through
//! accelerator in front of it. Both a successful verification (positive)
//! and a failed one (negative) are cached briefly so a client hammering an
//! invalid key doesn't reach the control plane on every attempt. Eviction
//! picks the least-recently-used entry by scanning for the oldest
//! `last_used` timestamp — acceptable at the bounded capacities this cache
//! runs at (a few thousand entries), and simpler than threading an
//! intrusive list through a second structure.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A resolved tenant endpoint, as cached alongside the API key that maps
/// to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantEndpoint {
    pub tenant_id: String,
    pub host: String,
    pub port: u16,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Cached and still fresh: key belongs to this tenant at this endpoint.
    Authenticated(TenantEndpoint),
    /// Cached and still fresh: key was previously rejected.
    Denied,
    /// Not cached, or the entry's TTL has elapsed. Caller must ask the
    /// control plane.
    Unknown,
}

struct Record {
    endpoint: Option<TenantEndpoint>,
    inserted_at: Instant,
    last_used: Instant,
}

pub struct ApiKeyCache {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<HashMap<String, Record>>,
}

impl ApiKeyCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        ApiKeyCache {
            capacity,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Lookup {
        let mut entries = self.entries.lock();
        let Some(record) = entries.get_mut(key) else {
            return Lookup::Unknown;
        };
        if record.inserted_at.elapsed() > self.ttl {
            entries.remove(key);
            return Lookup::Unknown;
        }
        record.last_used = Instant::now();
        match &record.endpoint {
            Some(endpoint) => Lookup::Authenticated(endpoint.clone()),
            None => Lookup::Denied,
        }
    }

    pub fn put_authenticated(&self, key: &str, endpoint: TenantEndpoint) {
        self.insert(key, Some(endpoint));
    }

    pub fn put_denied(&self, key: &str) {
        self.insert(key, None);
    }

    fn insert(&self, key: &str, endpoint: Option<TenantEndpoint>) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(key) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, record)| record.last_used)
                .map(|(key, _)| key.clone())
            {
                entries.remove(&victim);
            }
        }
        entries.insert(
            key.to_string(),
            Record {
                endpoint,
                inserted_at: now,
                last_used: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(tenant_id: &str) -> TenantEndpoint {
        TenantEndpoint {
            tenant_id: tenant_id.to_string(),
            host: "127.0.0.1".to_string(),
            port: 6400,
        }
    }

    #[test]
    fn caches_positive_and_negative_results() {
        let cache = ApiKeyCache::new(8, Duration::from_secs(30));
        cache.put_authenticated("k1", endpoint("tenantA"));
        cache.put_denied("k0");
        assert_eq!(cache.get("k1"), Lookup::Authenticated(endpoint("tenantA")));
        assert_eq!(cache.get("k0"), Lookup::Denied);
        assert_eq!(cache.get("k-missing"), Lookup::Unknown);
    }

    #[test]
    fn expires_entries_past_ttl() {
        let cache = ApiKeyCache::new(8, Duration::from_millis(10));
        cache.put_authenticated("k1", endpoint("tenantA"));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("k1"), Lookup::Unknown);
    }

    #[test]
    fn evicts_least_recently_used_when_over_capacity() {
        let cache = ApiKeyCache::new(2, Duration::from_secs(30));
        cache.put_authenticated("k1", endpoint("a"));
        std::thread::sleep(Duration::from_millis(5));
        cache.put_authenticated("k2", endpoint("b"));
        std::thread::sleep(Duration::from_millis(5));
        // touch k1 so it is no longer the least-recently-used entry
        let _ = cache.get("k1");
        cache.put_authenticated("k3", endpoint("c"));
        assert_eq!(cache.get("k2"), Lookup::Unknown);
        assert_eq!(cache.get("k1"), Lookup::Authenticated(endpoint("a")));
        assert_eq!(cache.get("k3"), Lookup::Authenticated(endpoint("c")));
    }
}
