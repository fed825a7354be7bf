//! Error types and reporting for worker stations.

use std::fmt;
use tracing::{error, warn};

/// Errors that can occur while a station processes one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationError {
    /// Affects only the current input; the station keeps running.
    Recoverable(String),
    /// The station loop must stop.
    Fatal(String),
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Trait for reporting station errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a station.
    fn report(&self, station: &str, error: &StationError);
}

/// Reporter that forwards station errors to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, err: &StationError) {
        match err {
            StationError::Recoverable(msg) => warn!(station, error = %msg, "station error"),
            StationError::Fatal(msg) => error!(station, error = %msg, "station stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_error_display() {
        let recoverable = StationError::Recoverable("bad frame".to_string());
        assert_eq!(recoverable.to_string(), "Recoverable error: bad frame");

        let fatal = StationError::Fatal("input gone".to_string());
        assert_eq!(fatal.to_string(), "Fatal error: input gone");
    }

    #[test]
    fn test_log_reporter_accepts_both_kinds() {
        let reporter = LogReporter;
        reporter.report("decoder", &StationError::Recoverable("x".to_string()));
        reporter.report("decoder", &StationError::Fatal("y".to_string()));
    }
}
