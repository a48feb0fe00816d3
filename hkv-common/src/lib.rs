//! Shared error taxonomy, RESP2 reply encoding, configuration, and logging
//! init used by every service in the workspace.

pub mod config;
pub mod error;
pub mod logging;
pub mod resp;

pub use error::{HkvError, HkvResult};
