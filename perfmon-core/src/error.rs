//! Error types for perfmon-core

use thiserror::Error;

/// Main error type for the perfmon-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Collector setup error
    #[error("collector error: {0}")]
    Collector(String),
}

/// Result type alias for perfmon-core
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single delivery attempt.
///
/// Unexpected status codes are not errors; they are classified by
/// [`Disposition`](crate::collector::Disposition).
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The configured endpoint could not be parsed as a URL
    #[error("invalid endpoint {endpoint:?}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    /// The snapshot could not be serialized
    #[error("failed to encode requests: {0}")]
    Encode(#[from] serde_json::Error),

    /// DNS, connect, TLS handshake or any other network-layer fault
    #[error("{0}")]
    Transport(String),
}

impl DeliveryError {
    /// Stable identifier used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::InvalidEndpoint { .. } => "invalid_endpoint",
            DeliveryError::Encode(_) => "encode",
            DeliveryError::Transport(_) => "transport",
        }
    }
}
