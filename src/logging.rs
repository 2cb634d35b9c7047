//! Tracing initialization.
//!
//! Called before configuration is loaded, so the level and format come
//! straight from `LOG_LEVEL` / `LOG_FORMAT` (same variables `LoggingConfig`
//! validates later).

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `LOG_LEVEL` accepts any `EnvFilter` directive (default `info`);
/// `LOG_FORMAT=json` switches to newline-delimited JSON output.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(false)
            .init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }
}
