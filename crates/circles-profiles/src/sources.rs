//! # Metadata Sources
//!
//! HTTP endpoints that serve profile documents. Each source answers one
//! kind of lookup and returns `Ok(None)` for the other.

use crate::error::ProfileError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared_types::{Address, ProfileMetadata};
use std::time::Duration;
use tracing::debug;

/// What is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// V1 avatar address.
    Address(&'a Address),
    /// V2 metadata document CID.
    Cid(&'a str),
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Source name, for logs.
    fn name(&self) -> &str;

    async fn fetch(&self, lookup: Lookup<'_>) -> Result<Option<ProfileMetadata>, ProfileError>;
}

/// Shared HTTP client with connect and request timeouts.
pub fn http_client(timeout: Duration) -> Result<Client, ProfileError> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()?)
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
) -> Result<T, ProfileError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProfileError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response
        .json()
        .await
        .map_err(|e| ProfileError::Parse(e.to_string()))
}

// =============================================================================
// IPFS
// =============================================================================

/// One IPFS HTTP gateway: `GET {gateway}/{cid}`.
pub struct IpfsGatewaySource {
    client: Client,
    gateway: String,
}

impl IpfsGatewaySource {
    pub fn new(client: Client, gateway: impl Into<String>) -> Self {
        Self {
            client,
            gateway: gateway.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for IpfsGatewaySource {
    fn name(&self) -> &str {
        &self.gateway
    }

    async fn fetch(&self, lookup: Lookup<'_>) -> Result<Option<ProfileMetadata>, ProfileError> {
        let Lookup::Cid(cid) = lookup else {
            return Ok(None);
        };
        let url = format!("{}/{cid}", self.gateway);
        debug!(%url, "Fetching profile document");
        get_json(&self.client, &url).await.map(Some)
    }
}

// =============================================================================
// GARDEN API
// =============================================================================

#[derive(Debug, Deserialize)]
struct GardenResponse {
    status: String,
    #[serde(default)]
    data: Vec<GardenUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GardenUser {
    username: String,
    #[serde(default)]
    avatar_url: Option<String>,
}

/// Legacy V1 user directory: `GET {base}/api/users?address[]={address}`.
pub struct GardenApiSource {
    client: Client,
    base_url: String,
}

impl GardenApiSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

fn garden_profile(response: GardenResponse) -> Option<ProfileMetadata> {
    if response.status != "ok" {
        return None;
    }
    let user = response.data.into_iter().next()?;
    Some(ProfileMetadata {
        name: Some(user.username),
        preview_image_url: user.avatar_url,
        ..Default::default()
    })
}

#[async_trait]
impl MetadataSource for GardenApiSource {
    fn name(&self) -> &str {
        "garden-api"
    }

    async fn fetch(&self, lookup: Lookup<'_>) -> Result<Option<ProfileMetadata>, ProfileError> {
        let Lookup::Address(address) = lookup else {
            return Ok(None);
        };
        let url = format!("{}/api/users?address[]={address}", self.base_url);
        let response: GardenResponse = get_json(&self.client, &url).await?;
        Ok(garden_profile(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garden_response_mapping() {
        let json = r#"{"status":"ok","data":[{"id":7,"username":"alice","avatarUrl":"https://img/a.png"}]}"#;
        let profile = garden_profile(serde_json::from_str(json).unwrap()).unwrap();
        assert_eq!(profile.name.as_deref(), Some("alice"));
        assert_eq!(profile.preview_image_url.as_deref(), Some("https://img/a.png"));
    }

    #[test]
    fn test_garden_empty_or_failed() {
        let empty = r#"{"status":"ok","data":[]}"#;
        assert!(garden_profile(serde_json::from_str(empty).unwrap()).is_none());
        let failed = r#"{"status":"error"}"#;
        assert!(garden_profile(serde_json::from_str(failed).unwrap()).is_none());
    }
}
