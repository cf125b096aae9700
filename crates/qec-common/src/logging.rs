use tracing_subscriber::{fmt, EnvFilter};

/// Initializes global structured logging from a level string (typically
/// `Config::log_level`), falling back to the `RUST_LOG` env var, then
/// `info`. Mirrors the teacher binary's `logging::init_logging_from_config`.
pub fn init_logging_from_config(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();
}
