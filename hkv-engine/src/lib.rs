//! In-memory, per-tenant keyspace: TTL, LRU-quota eviction, and textual
//! command dispatch. See `keyspace` for the storage engine and `command`
//! for the RESP dispatch layer built on top of it.

pub mod command;
pub mod entry;
pub mod keyspace;

pub use command::{execute_args, execute_line};
pub use entry::Entry;
pub use keyspace::{parse_i64_strict, Keyspace, KeyspaceState, KeyspaceStats, TtlStatus};
