//! # Keyspace
//!
//! A single tenant's key/value map: one exclusive lock guards the whole
//! structure for the full duration of every operation — unlike a sharded
//! engine, the unit of lock partitioning here is the tenant itself, so
//! there is exactly one lock per Keyspace rather than many shard locks
//! inside it.
//!
//! The storage layout (index-based intrusive LRU list over a slab of
//! entries, `Arc<[u8]>` keys shared between the map and the slab) mirrors
//! the sharded engine this crate grew out of; it has simply been collapsed
//! from N shards to one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::RandomState;
use parking_lot::Mutex as PLMutex;

use hkv_common::error::{HkvError, HkvResult};

use crate::entry::{footprint, Entry};

/// Lifecycle state machine: `idle -> running -> stopping -> stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyspaceState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// TTL status for a key, mirroring the shape callers already expect from
/// the single-node client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    Missing,
    NoExpiry,
    ExpiresIn(Duration),
}

/// Point-in-time statistics for `INFO` and `listNodes`.
#[derive(Debug, Clone, Copy)]
pub struct KeyspaceStats {
    pub used_memory: usize,
    pub key_count: usize,
}

struct Inner {
    map: HashMap<Arc<[u8]>, usize, RandomState>,
    slots: Vec<Option<Entry>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    current_usage: usize,
    state: KeyspaceState,
}

impl Inner {
    fn new(hash_state: RandomState) -> Self {
        Inner {
            map: HashMap::with_hasher(hash_state),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            current_usage: 0,
            state: KeyspaceState::Idle,
        }
    }

    fn lru_remove(&mut self, idx: usize) {
        let (prev, next) = {
            let entry = self.slots[idx].as_ref().expect("entry exists");
            (entry.prev, entry.next)
        };

        if let Some(prev_idx) = prev {
            if let Some(prev_entry) = self.slots[prev_idx].as_mut() {
                prev_entry.next = next;
            }
        } else {
            self.head = next;
        }

        if let Some(next_idx) = next {
            if let Some(next_entry) = self.slots[next_idx].as_mut() {
                next_entry.prev = prev;
            }
        } else {
            self.tail = prev;
        }

        if let Some(entry) = self.slots[idx].as_mut() {
            entry.prev = None;
            entry.next = None;
        }
    }

    fn lru_push_back(&mut self, idx: usize) {
        let tail = self.tail;
        if let Some(entry) = self.slots[idx].as_mut() {
            entry.prev = tail;
            entry.next = None;
        }

        if let Some(tail_idx) = tail {
            if let Some(tail_entry) = self.slots[tail_idx].as_mut() {
                tail_entry.next = Some(idx);
            }
        } else {
            self.head = Some(idx);
        }

        self.tail = Some(idx);
    }

    fn touch(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return;
        }
        self.lru_remove(idx);
        self.lru_push_back(idx);
    }

    fn insert_new(&mut self, key: Arc<[u8]>, value: Arc<[u8]>, footprint: usize, expires_at: Option<Instant>) -> usize {
        let idx = self.free.pop().unwrap_or_else(|| {
            self.slots.push(None);
            self.slots.len() - 1
        });

        self.slots[idx] = Some(Entry {
            key: Arc::clone(&key),
            value,
            expires_at,
            footprint,
            prev: None,
            next: None,
        });
        self.lru_push_back(idx);
        self.map.insert(key, idx);
        idx
    }

    /// Removes a slot, returning its reclaimed footprint.
    fn remove_idx(&mut self, idx: usize) -> Option<usize> {
        let entry = self.slots[idx].as_ref()?;
        let key = Arc::clone(&entry.key);
        let footprint = entry.footprint;

        self.lru_remove(idx);
        self.slots[idx] = None;
        self.map.remove(key.as_ref());
        self.free.push(idx);
        Some(footprint)
    }

    /// Evicts the least-recently-used entry other than `exclude`, so a SET
    /// that is overwriting an existing key never evicts the very entry
    /// it is about to replace.
    fn pop_lru_except(&mut self, exclude: Option<usize>) -> Option<usize> {
        let mut idx = self.head?;
        while Some(idx) == exclude {
            idx = self.slots[idx].as_ref()?.next?;
        }
        self.remove_idx(idx)
    }

    fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.current_usage = 0;
    }
}

struct SweeperHandle {
    stop: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl SweeperHandle {
    fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// A single tenant's thread-safe key/value map with TTL and a byte-footprint
/// quota. See module docs for the locking model.
pub struct Keyspace {
    pub tenant_id: String,
    pub port: u16,
    memory_limit_bytes: usize,
    overhead_bytes: usize,
    created_at: Instant,
    hash_state: RandomState,
    inner: PLMutex<Inner>,
    sweeper: PLMutex<Option<SweeperHandle>>,
}

impl Keyspace {
    pub fn new(tenant_id: impl Into<String>, port: u16, memory_limit_bytes: usize, overhead_bytes: usize) -> Self {
        let hash_state = RandomState::new();
        Keyspace {
            tenant_id: tenant_id.into(),
            port,
            memory_limit_bytes,
            overhead_bytes,
            created_at: Instant::now(),
            hash_state: hash_state.clone(),
            inner: PLMutex::new(Inner::new(hash_state)),
            sweeper: PLMutex::new(None),
        }
    }

    pub fn memory_limit_bytes(&self) -> usize {
        self.memory_limit_bytes
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_running(&self) -> bool {
        matches!(self.inner.lock().state, KeyspaceState::Running)
    }

    pub fn state(&self) -> KeyspaceState {
        self.inner.lock().state
    }

    /// Transitions `idle|stopped -> running` and spawns the sweeper.
    /// Idempotent: calling `start` on an already-running Keyspace is a no-op.
    pub fn start(self: &Arc<Self>) -> HkvResult<()> {
        self.start_with_interval(Duration::from_secs(1))
    }

    pub fn start_with_interval(self: &Arc<Self>, interval: Duration) -> HkvResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.state == KeyspaceState::Running {
                return Ok(());
            }
            inner.state = KeyspaceState::Running;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        let keyspace = Arc::clone(self);

        let join = std::thread::spawn(move || {
            while !stop_thread.load(Ordering::Acquire) {
                std::thread::sleep(interval);
                if stop_thread.load(Ordering::Acquire) {
                    break;
                }
                keyspace.sweep_once(Instant::now());
            }
        });

        *self.sweeper.lock() = Some(SweeperHandle {
            stop,
            join: Some(join),
        });
        Ok(())
    }

    /// Transitions `running -> stopping -> stopped`: joins the sweeper,
    /// drops all entries, and resets usage to zero.
    pub fn stop(&self) -> HkvResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.state != KeyspaceState::Running {
                return Ok(());
            }
            inner.state = KeyspaceState::Stopping;
        }

        if let Some(handle) = self.sweeper.lock().take() {
            handle.stop();
        }

        let mut inner = self.inner.lock();
        inner.clear();
        inner.state = KeyspaceState::Stopped;
        Ok(())
    }

    fn ensure_running(&self, state: &Inner) -> HkvResult<()> {
        if state.state != KeyspaceState::Running {
            return Err(HkvError::NotFound("tenant".to_string()));
        }
        Ok(())
    }

    /// Removes every expired entry under the lock. Called by the sweeper
    /// thread and exposed for tests that want deterministic sweeps.
    pub fn sweep_once(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        if inner.state != KeyspaceState::Running {
            return 0;
        }

        let expired: Vec<usize> = inner
            .map
            .values()
            .copied()
            .filter(|&idx| {
                inner.slots[idx]
                    .as_ref()
                    .map(|entry| entry.is_expired_at(now))
                    .unwrap_or(false)
            })
            .collect();

        let mut removed = 0;
        for idx in expired {
            if let Some(size) = inner.remove_idx(idx) {
                inner.current_usage -= size;
                removed += 1;
            }
        }
        removed
    }

    pub fn set(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> HkvResult<()> {
        let mut inner = self.inner.lock();
        self.ensure_running(&inner)?;

        let new_footprint = footprint(key, value, self.overhead_bytes);
        if new_footprint > self.memory_limit_bytes {
            return Err(HkvError::Quota);
        }

        let existing_idx = inner.map.get(key).copied();
        let old_footprint = existing_idx
            .and_then(|idx| inner.slots[idx].as_ref())
            .map(|entry| entry.footprint)
            .unwrap_or(0);

        // `delta = new - old`; eviction only ever targets entries other than
        // the one being overwritten, and nothing is removed until the write
        // is guaranteed to fit, so a failed SET leaves every existing entry
        // (including the one being overwritten) untouched.
        while inner.current_usage - old_footprint + new_footprint > self.memory_limit_bytes {
            match inner.pop_lru_except(existing_idx) {
                Some(size) => inner.current_usage -= size,
                None => break,
            }
        }

        if inner.current_usage - old_footprint + new_footprint > self.memory_limit_bytes {
            return Err(HkvError::Quota);
        }

        if let Some(idx) = existing_idx {
            if let Some(size) = inner.remove_idx(idx) {
                inner.current_usage -= size;
            }
        }

        let now = Instant::now();
        let expires_at = ttl.map(|d| now + d);
        let key_arc: Arc<[u8]> = Arc::from(key);
        let value_arc: Arc<[u8]> = Arc::from(value);
        inner.insert_new(key_arc, value_arc, new_footprint, expires_at);
        inner.current_usage += new_footprint;
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> HkvResult<Option<Arc<[u8]>>> {
        let mut inner = self.inner.lock();
        self.ensure_running(&inner)?;

        let idx = match inner.map.get(key).copied() {
            Some(idx) => idx,
            None => return Ok(None),
        };

        let now = Instant::now();
        let expired = inner.slots[idx]
            .as_ref()
            .map(|entry| entry.is_expired_at(now))
            .unwrap_or(false);

        if expired {
            if let Some(size) = inner.remove_idx(idx) {
                inner.current_usage -= size;
            }
            return Ok(None);
        }

        inner.touch(idx);
        Ok(inner.slots[idx].as_ref().map(|entry| Arc::clone(&entry.value)))
    }

    pub fn delete(&self, key: &[u8]) -> HkvResult<bool> {
        let mut inner = self.inner.lock();
        self.ensure_running(&inner)?;

        let idx = match inner.map.get(key).copied() {
            Some(idx) => idx,
            None => return Ok(false),
        };

        let now = Instant::now();
        let expired = inner.slots[idx]
            .as_ref()
            .map(|entry| entry.is_expired_at(now))
            .unwrap_or(false);

        if let Some(size) = inner.remove_idx(idx) {
            inner.current_usage -= size;
        }
        Ok(!expired)
    }

    pub fn exists(&self, key: &[u8]) -> HkvResult<bool> {
        let inner = self.inner.lock();
        self.ensure_running(&inner)?;

        let idx = match inner.map.get(key).copied() {
            Some(idx) => idx,
            None => return Ok(false),
        };
        let now = Instant::now();
        let expired = inner.slots[idx]
            .as_ref()
            .map(|entry| entry.is_expired_at(now))
            .unwrap_or(true);
        Ok(!expired)
    }

    /// Applies a signed delta to the integer stored at `key`, treating an
    /// absent or expired value as zero. Rewrites with no expiry, per §4.1.
    pub fn incr_by(&self, key: &[u8], delta: i64) -> HkvResult<i64> {
        let current = self.get(key)?;
        let base = match current {
            None => 0i64,
            Some(value) => parse_i64_strict(&value).ok_or(HkvError::TypeError)?,
        };

        let next = base
            .checked_add(delta)
            .ok_or(HkvError::TypeError)?;
        let text = next.to_string();
        self.set(key, text.as_bytes(), None)?;
        Ok(next)
    }

    pub fn keys_matching_star(&self) -> HkvResult<Vec<Arc<[u8]>>> {
        let inner = self.inner.lock();
        self.ensure_running(&inner)?;
        let now = Instant::now();
        Ok(inner
            .map
            .iter()
            .filter_map(|(key, &idx)| {
                let expired = inner.slots[idx]
                    .as_ref()
                    .map(|entry| entry.is_expired_at(now))
                    .unwrap_or(true);
                if expired {
                    None
                } else {
                    Some(Arc::clone(key))
                }
            })
            .collect())
    }

    pub fn flushall(&self) -> HkvResult<()> {
        let mut inner = self.inner.lock();
        self.ensure_running(&inner)?;
        inner.map.clear();
        inner.slots.clear();
        inner.free.clear();
        inner.head = None;
        inner.tail = None;
        inner.current_usage = 0;
        Ok(())
    }

    pub fn expire(&self, key: &[u8], ttl: Duration) -> HkvResult<()> {
        let mut inner = self.inner.lock();
        self.ensure_running(&inner)?;

        let idx = inner
            .map
            .get(key)
            .copied()
            .ok_or_else(|| HkvError::NotFound("key".to_string()))?;

        let now = Instant::now();
        let expired = inner.slots[idx]
            .as_ref()
            .map(|entry| entry.is_expired_at(now))
            .unwrap_or(false);
        if expired {
            if let Some(size) = inner.remove_idx(idx) {
                inner.current_usage -= size;
            }
            return Err(HkvError::NotFound("key".to_string()));
        }

        if let Some(entry) = inner.slots[idx].as_mut() {
            entry.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    pub fn ttl(&self, key: &[u8]) -> HkvResult<TtlStatus> {
        let mut inner = self.inner.lock();
        self.ensure_running(&inner)?;

        let idx = match inner.map.get(key).copied() {
            Some(idx) => idx,
            None => return Ok(TtlStatus::Missing),
        };

        let now = Instant::now();
        let expires_at = inner.slots[idx].as_ref().and_then(|entry| entry.expires_at);
        match expires_at {
            None => Ok(TtlStatus::NoExpiry),
            Some(deadline) => {
                if deadline <= now {
                    if let Some(size) = inner.remove_idx(idx) {
                        inner.current_usage -= size;
                    }
                    Ok(TtlStatus::Missing)
                } else {
                    Ok(TtlStatus::ExpiresIn(deadline - now))
                }
            }
        }
    }

    pub fn stats(&self) -> KeyspaceStats {
        let inner = self.inner.lock();
        KeyspaceStats {
            used_memory: inner.current_usage,
            key_count: inner.map.len(),
        }
    }
}

/// Strict base-10 signed 64-bit integer parse: optional leading `-`, no
/// whitespace, no leading `+`, overflow fails rather than wraps.
pub fn parse_i64_strict(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return None;
    }
    let (negative, digits) = match bytes[0] {
        b'-' => (true, &bytes[1..]),
        _ => (false, bytes),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut value: i64 = 0;
    for &b in digits {
        value = value.checked_mul(10)?.checked_add((b - b'0') as i64)?;
    }
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(tenant: &str, port: u16, limit: usize, overhead: usize) -> Arc<Keyspace> {
        let ks = Arc::new(Keyspace::new(tenant, port, limit, overhead));
        ks.start_with_interval(Duration::from_millis(20)).unwrap();
        ks
    }

    #[test]
    fn set_get_del_roundtrip() {
        let ks = running("t1", 6400, 1024, 8);
        ks.set(b"foo", b"bar", None).unwrap();
        assert_eq!(ks.get(b"foo").unwrap().as_deref(), Some(&b"bar"[..]));
        assert!(ks.delete(b"foo").unwrap());
        assert_eq!(ks.get(b"foo").unwrap(), None);
        ks.stop().unwrap();
    }

    #[test]
    fn exists_reports_without_removing_expired() {
        let ks = running("t1", 6401, 1024, 8);
        ks.set(b"k", b"v", Some(Duration::from_millis(1))).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(!ks.exists(b"k").unwrap());
        ks.stop().unwrap();
    }

    #[test]
    fn ttl_expiry_removes_on_read() {
        let ks = running("t1", 6402, 1024, 8);
        ks.set(b"k", b"v", Some(Duration::from_millis(1))).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(ks.get(b"k").unwrap(), None);
        assert_eq!(ks.stats().key_count, 0);
        ks.stop().unwrap();
    }

    #[test]
    fn incr_from_absent_and_type_error() {
        let ks = running("t1", 6403, 1024, 8);
        assert_eq!(ks.incr_by(b"n", 1).unwrap(), 1);
        assert_eq!(ks.incr_by(b"n", 1).unwrap(), 2);

        ks.set(b"s", b"hello", None).unwrap();
        assert!(matches!(ks.incr_by(b"s", 1), Err(HkvError::TypeError)));
        ks.stop().unwrap();
    }

    #[test]
    fn quota_evicts_lru_then_rejects_when_still_over() {
        let ks = running("t1", 6404, 48, 8);
        // Each entry: 8-byte key + 8-byte value + 8 overhead = 24 bytes.
        ks.set(b"key00001", b"val00001", None).unwrap();
        ks.set(b"key00002", b"val00002", None).unwrap();
        assert_eq!(ks.stats().used_memory, 48);

        // Third entry forces eviction of the first (LRU).
        ks.set(b"key00003", b"val00003", None).unwrap();
        assert_eq!(ks.stats().used_memory, 48);
        assert_eq!(ks.get(b"key00001").unwrap(), None);
        assert!(ks.get(b"key00002").unwrap().is_some());

        // A value larger than the whole quota fails immediately.
        let oversized = vec![0u8; 64];
        assert!(matches!(
            ks.set(b"big", &oversized, None),
            Err(HkvError::Quota)
        ));
        ks.stop().unwrap();
    }

    #[test]
    fn failed_overwrite_leaves_old_value_and_other_entries_intact() {
        let ks = running("t1", 6409, 48, 8);
        ks.set(b"key00001", b"val00001", None).unwrap();
        ks.set(b"key00002", b"val00002", None).unwrap();
        assert_eq!(ks.stats().used_memory, 48);

        // Overwriting key00001 with a value that alone exceeds the quota
        // must fail without destroying the old value or any other entry.
        let oversized = vec![0u8; 64];
        assert!(matches!(
            ks.set(b"key00001", &oversized, None),
            Err(HkvError::Quota)
        ));

        assert_eq!(ks.get(b"key00001").unwrap().as_deref(), Some(&b"val00001"[..]));
        assert_eq!(ks.get(b"key00002").unwrap().as_deref(), Some(&b"val00002"[..]));
        assert_eq!(ks.stats().used_memory, 48);
        ks.stop().unwrap();
    }

    #[test]
    fn get_touches_lru_so_recently_read_survives_eviction() {
        let ks = running("t1", 6405, 48, 8);
        ks.set(b"key00001", b"val00001", None).unwrap();
        ks.set(b"key00002", b"val00002", None).unwrap();
        // Touch key00001 so key00002 becomes the LRU victim.
        ks.get(b"key00001").unwrap();
        ks.set(b"key00003", b"val00003", None).unwrap();
        assert!(ks.get(b"key00001").unwrap().is_some());
        assert_eq!(ks.get(b"key00002").unwrap(), None);
        ks.stop().unwrap();
    }

    #[test]
    fn flushall_resets_usage_to_zero() {
        let ks = running("t1", 6406, 1024, 8);
        ks.set(b"a", b"1", None).unwrap();
        ks.set(b"b", b"2", None).unwrap();
        ks.flushall().unwrap();
        assert_eq!(ks.stats().used_memory, 0);
        assert_eq!(ks.stats().key_count, 0);
        ks.stop().unwrap();
    }

    #[test]
    fn stopped_keyspace_rejects_commands() {
        let ks = running("t1", 6407, 1024, 8);
        ks.stop().unwrap();
        assert!(matches!(ks.get(b"x"), Err(HkvError::NotFound(_))));
    }

    #[test]
    fn sweeper_reaps_expired_entries_in_background() {
        let ks = running("t1", 6408, 1024, 8);
        ks.set(b"k", b"v", Some(Duration::from_millis(1))).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(ks.stats().key_count, 0);
        ks.stop().unwrap();
    }

    #[test]
    fn parses_strict_signed_integers() {
        assert_eq!(parse_i64_strict(b"42"), Some(42));
        assert_eq!(parse_i64_strict(b"-7"), Some(-7));
        assert_eq!(parse_i64_strict(b""), None);
        assert_eq!(parse_i64_strict(b"12a"), None);
        assert_eq!(parse_i64_strict(b"+1"), None);
    }
}
