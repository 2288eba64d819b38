//! Error types for chain queries.

/// Errors raised while querying point-in-time chain state.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The node answered with a non-success status.
    #[error("{url} returned {status}: {body}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// A response or snapshot file could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// No snapshot exists at or below the requested height.
    #[error("no snapshot at or below height {height}")]
    NoSnapshot {
        /// Requested height.
        height: i64,
    },

    /// The requested record does not exist at the height.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Reading a snapshot file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
