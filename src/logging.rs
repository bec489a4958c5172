//! Process-wide logging built on `tracing`, shaped after the original
//! `Logger` singleton (`original_source/src/logger.cpp`): five severity
//! levels, a single initialization point, thread-safe emission.

use std::sync::Once;

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn to_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

/// Installs the global subscriber. Safe to call more than once; only the
/// first call takes effect.
pub fn init(min_level: LogLevel) {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(min_level.to_tracing())
            .init();
    });
}

/// CRITICAL has no direct `tracing::Level` counterpart (it collapses onto
/// ERROR); this marks the record so it's distinguishable in formatted output.
pub fn critical(message: &str) {
    tracing::error!(critical = true, "{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
    }
}
