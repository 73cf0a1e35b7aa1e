//! Error types for scanx core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.
//! Cancellation of a scan is never an error: it surfaces as a return value
//! from the exchange.

use thiserror::Error;

/// Result type alias for scanx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for scanx.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Scan-related error
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by, or reported through, an index connection.
///
/// Producers report these to the request context via
/// [`IndexConnection::error`](crate::connection::IndexConnection::error);
/// the connection is a conduit and does not inspect them, except for the
/// scan-timeout class on primary fallback scans.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// A sized connection was requested with a non-positive capacity
    #[error("Invalid index scan size: {0}")]
    InvalidScanSize(i64),

    /// The index gave up on the scan because of its time budget
    #[error("Index scan timed out: {0}")]
    ScanTimeout(String),

    /// A span bound has a type the index cannot compare against
    #[error("Invalid {side} bound {value} in index scan")]
    InvalidBound { side: &'static str, value: String },

    /// Generic datastore error
    #[error("Datastore error: {0}")]
    Datastore(String),
}

impl ScanError {
    /// Whether this error belongs to the scan-timeout class.
    pub fn is_scan_timeout(&self) -> bool {
        matches!(self, ScanError::ScanTimeout(_))
    }
}

// Conversion implementations for external error types

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
