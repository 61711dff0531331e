//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g.
/// `RUST_LOG=meshlod::render=trace` to see per-frame command recording.
///
/// # Example
/// ```
/// meshlod::core::logging::init();
/// log::info!("Demo started");
/// ```
pub fn init() {
    // try_init so doc tests and binaries sharing a process don't panic on re-init
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
