//! Process-wide structured logging init, shared by every binary.

/// Installs a `tracing-subscriber` env-filter layer driven by `RUST_LOG`,
/// defaulting to `info` when unset. Call once near the top of `main`.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .ok();
}
