//! Shared error taxonomy for every component of the service.
//!
//! Every fallible operation in the core (keyspace ops, manager dispatch,
//! router verification) resolves to one of these variants, which in turn
//! maps deterministically to a RESP error string at the dispatch boundary.
//! Nothing here is allowed to unwind past a connection handler.

use std::fmt;

/// Result alias used throughout the workspace.
pub type HkvResult<T> = Result<T, HkvError>;

#[derive(Debug, thiserror::Error)]
pub enum HkvError {
    /// Malformed command line or wrong argument count.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Unknown tenant or unknown API key.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write would exceed the tenant's memory quota even after eviction.
    #[error("OOM command not allowed when used memory > 'maxmemory'")]
    Quota,

    /// INCR/DECR family applied to a non-integer value.
    #[error("value is not an integer or out of range")]
    TypeError,

    /// A bounded queue was full; caller should back off.
    #[error("server busy")]
    Backpressure,

    /// Socket or external RPC failure. Closes the affected connection only.
    #[error("transport error: {0}")]
    Transport(String),

    /// Startup-time fault: bind failure, bad configuration. Fatal.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<std::io::Error> for HkvError {
    fn from(err: std::io::Error) -> Self {
        HkvError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for HkvError {
    fn from(err: serde_json::Error) -> Self {
        HkvError::Protocol(err.to_string())
    }
}

/// A RESP error kind, used to decide which error text format applies.
/// Distinct from `HkvError` so the wire-formatting module doesn't need to
/// match on every internal variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespErrorKind {
    Protocol,
    NotFound,
    Quota,
    TypeError,
    Backpressure,
    Generic,
}

impl HkvError {
    pub fn resp_kind(&self) -> RespErrorKind {
        match self {
            HkvError::Protocol(_) => RespErrorKind::Protocol,
            HkvError::NotFound(_) => RespErrorKind::NotFound,
            HkvError::Quota => RespErrorKind::Quota,
            HkvError::TypeError => RespErrorKind::TypeError,
            HkvError::Backpressure => RespErrorKind::Backpressure,
            _ => RespErrorKind::Generic,
        }
    }
}

impl fmt::Display for RespErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RespErrorKind::Protocol => "invalid syntax",
            RespErrorKind::NotFound => "not found",
            RespErrorKind::Quota => "OOM",
            RespErrorKind::TypeError => "type error",
            RespErrorKind::Backpressure => "server busy",
            RespErrorKind::Generic => "error",
        };
        write!(f, "{text}")
    }
}
