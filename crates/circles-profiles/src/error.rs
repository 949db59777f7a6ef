use thiserror::Error;

/// Failures inside profile resolution.
///
/// None of these reach the projection: the resolver logs them and degrades
/// to "no profile".
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("Cache directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Image of {size} bytes exceeds limit of {limit} bytes")]
    ImageTooLarge { size: u64, limit: u64 },
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
