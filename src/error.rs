//! Error types for the folio library.

use thiserror::Error;

use crate::controller::Phase;

/// Errors that can occur in the cache controller and its hosts.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during storage or terminal operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored entry metadata could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized.
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Configuration is syntactically valid but unusable.
    #[error("Invalid config: {0}")]
    Config(String),

    /// A URL could not be parsed or resolved against the origin.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Only `GET` requests can be written to a cache store.
    #[error("Request method {method} cannot be cached")]
    NotCacheable {
        /// Method of the rejected request.
        method: String,
    },

    /// The network answered with a status that cannot be stored.
    #[error("Unexpected status {status} for {url}")]
    UnexpectedStatus {
        /// Requested URL.
        url: String,
        /// Status the network returned.
        status: reqwest::StatusCode,
    },

    /// A lifecycle step was attempted out of order.
    #[error("Lifecycle step requires phase {expected:?}, controller is {actual:?}")]
    Lifecycle {
        /// Phase the step requires.
        expected: Phase,
        /// Phase the controller is in.
        actual: Phase,
    },

    /// A stored entry is corrupt or the backing store misbehaved.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A specialized `Result` type for folio operations.
pub type Result<T> = std::result::Result<T, Error>;
