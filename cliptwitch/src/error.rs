//! Error types for the Twitch clips client

/// Result type alias for clip fetching operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the clips API
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// API answered with a non-success status
    #[error("API returned status {code}: {message}")]
    Status { code: u16, message: String },

    /// The GraphQL layer declared errors
    #[error("GraphQL errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    /// Configuration error (from clipconfig/anyhow)
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
}
