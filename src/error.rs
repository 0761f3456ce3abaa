use thiserror::Error;

/// Library error type for frame operations.
#[derive(Debug, Error)]
pub enum FrameError {
    /// No OAuth token is stored yet; the album has not been linked.
    #[error("photo album is not linked yet")]
    NotLinked,

    /// The credential was rejected and could not be recovered by a refresh.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure (timeout, DNS, non-auth HTTP error).
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Sampling exhausted without finding a displayable entry.
    #[error("no eligible image in listing")]
    NoEligibleImage,

    /// The listing body could not be parsed.
    #[error("malformed album listing: {0}")]
    Listing(#[from] serde_json::Error),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
