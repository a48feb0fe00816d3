//! Storage Node networking: the bounded worker pool that runs commands off
//! the connection's read loop, and the per-tenant TCP listener built on it.
//! `hkv-manager` spawns one [`listener::StorageNode`] per tenant on
//! `startNode` and tears it down on `stopNode`.

pub mod dispatcher;
pub mod listener;
pub mod metrics;

pub use dispatcher::Dispatcher;
pub use listener::StorageNode;
pub use metrics::{Metrics, MetricsSnapshot};
