//! Error types produced by the hub client.

use std::io;

use thiserror::Error;

/// Errors produced while talking to the hub.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HubError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Build {
        /// Error reported by the client builder.
        #[source]
        source: reqwest::Error,
    },
    /// A request URL could not be formed from the base URL.
    #[error("invalid hub URL {url:?}: {source}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// A request body could not be serialised.
    #[error("failed to encode request body: {source}")]
    Encode {
        /// Serialisation failure.
        #[source]
        source: serde_json::Error,
    },
    /// Compressing a request body failed.
    #[error("failed to compress request body: {source}")]
    Compress {
        /// I/O failure from the encoder.
        #[source]
        source: io::Error,
    },
    /// The request timed out.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Fully qualified request URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The hub answered with a status outside the accepted range.
    #[error("request to {url} failed with status {status}: {message}")]
    Status {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
    /// The request failed before a response arrived.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// A response body did not match the expected shape.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Fully qualified request URL.
        url: String,
        /// Decoder error description.
        message: String,
    },
    /// A feature deletion named neither ids nor tags.
    #[error("deleting features requires ids or tags")]
    EmptySelection,
}

impl HubError {
    /// Whether retrying the request might succeed.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status >= 500)
    }
}
