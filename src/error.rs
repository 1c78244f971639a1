//! Error types for the nodestat exporter

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while wiring up or running the exporter.
///
/// Per-collector update failures are not represented here; they use
/// [`CollectorError`](crate::collector::CollectorError) and never leave the
/// orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Registry / Selection Errors
    // =========================================================================
    /// Collector name does not match the allowed pattern
    #[error("Invalid collector name {name:?}: {reason}")]
    InvalidCollectorName { name: String, reason: String },

    /// Collector is not present in the registry
    #[error("Missing collector: {0}")]
    UnknownCollector(String),

    /// Collector exists but is not enabled
    #[error("Disabled collector: {0}")]
    DisabledCollector(String),

    /// Selection options that cannot be combined
    #[error("Conflicting collector selection: {0}")]
    ConflictingSelection(String),

    /// Collector factory failed at construction time
    #[error("Failed to build collector {name}: {reason}")]
    FactoryFailed { name: String, reason: String },

    // =========================================================================
    // Metric Errors
    // =========================================================================
    /// Metric or label name is not valid in the exposition format
    #[error("Invalid metric name {name:?}: {reason}")]
    InvalidMetricName { name: String, reason: String },

    /// Exposition encoding failed
    #[error("Exposition error: {0}")]
    Exposition(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML configuration file could not be parsed
    #[error("Failed to parse configuration file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<prometheus::Error> for Error {
    fn from(e: prometheus::Error) -> Self {
        Error::Exposition(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::UnknownCollector("xfs".to_string());
        assert_eq!(err.to_string(), "Missing collector: xfs");

        let err = Error::DisabledCollector("ntp".to_string());
        assert_eq!(err.to_string(), "Disabled collector: ntp");

        let err = Error::InvalidCollectorName {
            name: "Bad-Name".to_string(),
            reason: "uppercase".to_string(),
        };
        assert!(err.to_string().contains("Bad-Name"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
