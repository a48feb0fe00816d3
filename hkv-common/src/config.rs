//! # Environment-driven configuration
//!
//! Mirrors the source's `EnvLoader`: an optional `.env` file is read first,
//! then the process environment is consulted, then a typed default. Bind
//! ports and other required values are fatal (process exit 1) on an
//! invalid value; tuning knobs fall back to their default, matching
//! `EnvLoader::getInt`'s forgiving behavior.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::{HkvError, HkvResult};

/// Loads a `.env` file if present. Absence is not an error; this matches
/// the source logging a warning and continuing with the bare process
/// environment.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(?path, "loaded .env file"),
        Err(dotenvy::Error::Io(_)) => tracing::debug!(".env file not found, using process environment"),
        Err(err) => tracing::warn!(%err, "failed to parse .env file"),
    }
}

/// Reads a string env var, falling back to `default` when unset.
pub fn get_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Reads and parses an env var, falling back to `default` on a missing
/// variable OR a parse failure. Use for optional tuning knobs.
pub fn get_parsed<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// Reads and parses a required env var. A present-but-unparseable value is
/// fatal; an absent value falls back to `default` (the default itself is
/// assumed valid, e.g. a documented bind port).
pub fn require_parsed<T>(key: &str, default: T) -> HkvResult<T>
where
    T: FromStr + Copy,
    T::Err: Display,
{
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse().map_err(|err| {
            HkvError::Fatal(format!("invalid value for {key}={raw:?}: {err}"))
        }),
    }
}
