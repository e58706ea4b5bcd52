//! Logging setup.
//!
//! Structured logs go to stderr so stdout stays clean for listings and
//! encoded output. `RUST_LOG` wins over the configured level when set.

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Parse a level name, case-insensitively.
pub fn parse_level(level: &str) -> Option<Level> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global subscriber.
///
/// Unknown level names fall back to `info` with a warning. Calling this
/// twice leaves the first subscriber in place.
pub fn init(level: &str) {
    let parsed = parse_level(level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parsed.unwrap_or(Level::INFO).as_str()));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_target(true)
                .with_level(true),
        )
        .try_init()
        .is_ok();

    if installed && parsed.is_none() {
        tracing::warn!(level = %level, valid = ?LOG_LEVELS, "Unknown log level, using info");
    }
    tracing::debug!(level = %level, "Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level(" WARN "), Some(Level::WARN));
        assert_eq!(parse_level("verbose"), None);
        for name in LOG_LEVELS {
            assert!(parse_level(name).is_some());
        }
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init("debug");
        init("nonsense");
    }
}
