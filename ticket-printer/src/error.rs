//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Printer is offline or unreachable
    #[error("Printer offline: {0}")]
    Offline(String),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// IPP request rejected by the printer
    #[error("IPP error: {0}")]
    Ipp(String),

    /// Local spooler (`lp`) failure
    #[error("Spooler error: {0}")]
    Spooler(String),
}

impl From<reqwest::Error> for PrintError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PrintError::Timeout(e.to_string())
        } else if e.is_connect() {
            PrintError::Connection(e.to_string())
        } else {
            PrintError::Http(e.to_string())
        }
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;

/// Barcode payload rejected for the selected symbology
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarcodeError {
    #[error("empty barcode value")]
    Empty,

    #[error("{symbology} does not accept '{value}': {reason}")]
    InvalidData {
        symbology: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("barcode value too long ({0} bytes)")]
    TooLong(usize),
}
