//! Error types for clipplaylist

/// Playlist errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nothing survived fetching and filtering
    #[error(
        "no clips available for this configuration (channels: {}, days: {days}, min views: {min_views})",
        .channels.join(", ")
    )]
    NoClips {
        channels: Vec<String>,
        days: u64,
        min_views: u64,
    },

    #[error("Clip source error: {0}")]
    Source(#[from] cliptwitch::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

/// Result type for clipplaylist
pub type Result<T> = std::result::Result<T, Error>;
