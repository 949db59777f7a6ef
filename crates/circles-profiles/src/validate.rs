//! Preview image size validation.
//!
//! Inline `data:` URLs are measured from their payload. Remote URLs are
//! fetched and measured by body length.

use crate::error::ProfileError;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

#[async_trait]
pub trait ImageCheck: Send + Sync {
    /// Returns `Ok(())` if the image at `url` is acceptable.
    async fn check(&self, url: &str) -> Result<(), ProfileError>;
}

/// Decoded size of a `data:...;base64,` URL, if `url` is one.
fn inline_size(url: &str) -> Option<u64> {
    let payload = url.strip_prefix("data:")?;
    let (header, body) = payload.split_once(',')?;
    let body = body.trim_end_matches('=');
    if header.ends_with(";base64") {
        Some(body.len() as u64 * 3 / 4)
    } else {
        Some(body.len() as u64)
    }
}

/// Rejects images larger than a byte limit.
pub struct ImageSizeValidator {
    client: Client,
    limit_bytes: u64,
}

impl ImageSizeValidator {
    pub fn new(client: Client, limit_bytes: u64) -> Self {
        Self {
            client,
            limit_bytes,
        }
    }

    fn within_limit(&self, size: u64) -> Result<(), ProfileError> {
        if size > self.limit_bytes {
            return Err(ProfileError::ImageTooLarge {
                size,
                limit: self.limit_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImageCheck for ImageSizeValidator {
    async fn check(&self, url: &str) -> Result<(), ProfileError> {
        if let Some(size) = inline_size(url) {
            return self.within_limit(size);
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProfileError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if let Some(length) = response.content_length() {
            self.within_limit(length)?;
        }
        let body = response.bytes().await?;
        debug!(%url, size = body.len(), "Measured preview image");
        self.within_limit(body.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn validator(limit_bytes: u64) -> ImageSizeValidator {
        let client = crate::sources::http_client(Duration::from_secs(1)).unwrap();
        ImageSizeValidator::new(client, limit_bytes)
    }

    #[test]
    fn test_inline_size() {
        assert_eq!(inline_size("data:image/png;base64,AAAA"), Some(3));
        assert_eq!(inline_size("data:image/png;base64,AAA="), Some(2));
        assert_eq!(inline_size("https://example.org/a.png"), None);
    }

    #[tokio::test]
    async fn test_inline_image_limits() {
        let small = format!("data:image/png;base64,{}", "A".repeat(400));
        let large = format!("data:image/png;base64,{}", "A".repeat(4_000));

        assert!(validator(1_024).check(&small).await.is_ok());
        assert!(matches!(
            validator(1_024).check(&large).await,
            Err(ProfileError::ImageTooLarge { size: 3_000, limit: 1_024 })
        ));
    }
}
