//! Router: terminates client connections, authenticates them against a
//! cached + control-plane-verified API key, and proxies RESP traffic to
//! the correct Storage Node.

pub mod cache;
pub mod config;
pub mod control_plane;
pub mod forward;
pub mod pool;
pub mod resp_read;
pub mod session;

pub use cache::{ApiKeyCache, Lookup, TenantEndpoint};
pub use config::RouterConfig;
pub use control_plane::ControlPlaneClient;
pub use forward::ForwardDispatcher;
pub use pool::ConnectionPool;
pub use session::{handle_client, SessionDeps};
