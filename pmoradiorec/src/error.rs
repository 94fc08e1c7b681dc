//! Error types for the stream recorder

/// Result type alias for recorder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, opening or recording a stream
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed (DNS, refused connection, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    /// Connection dropped or failed while streaming
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(#[source] std::io::Error),

    /// Content type that cannot be recorded
    #[error("Unsupported stream format: {0}")]
    UnsupportedFormat(String),

    /// ICY metadata block that is not valid UTF-8 or not `key=value`
    #[error("Malformed ICY metadata: {0}")]
    MalformedMetadata(String),

    /// Widening file permissions failed
    #[error("Cannot change permissions: {0}")]
    Permission(#[source] std::io::Error),

    /// Local IO error (output files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Capture request rejected before starting
    #[error("Invalid capture request: {0}")]
    InvalidRequest(String),

    /// Cancellation arrived before any output file was created
    #[error("Capture cancelled before recording started")]
    Cancelled,

    /// Station not present in the configuration
    #[error("Unknown station name: {0}")]
    UnknownStation(String),

    /// Playlist without any stream entry
    #[error("Playlist contains no stream entry: {0}")]
    EmptyPlaylist(String),

    /// Configuration error (from pmoconfig/anyhow)
    #[cfg(feature = "pmoconfig")]
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a malformed metadata error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMetadata(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Transport-level failure opening or maintaining the connection
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::HttpStatus { .. } | Self::StreamInterrupted(_)
        )
    }

    /// Errors the engine logs and recovers from without ending the session
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedMetadata(_) | Self::Permission(_))
    }
}
