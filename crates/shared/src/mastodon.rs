use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::config::MastodonCredentials;
use crate::error::EpisodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
    Direct,
}

/// A social network that takes status updates
#[async_trait]
pub trait SocialNetwork: Send + Sync {
    /// Post a status and return its public URL
    async fn post_status(&self, text: &str, visibility: Visibility) -> Result<String>;
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    status: &'a str,
    visibility: Visibility,
}

#[derive(Deserialize)]
struct StatusResponse {
    url: Option<String>,
    uri: Option<String>,
}

pub struct MastodonClient {
    client: Client,
    statuses_url: Url,
    access_token: String,
}

impl MastodonClient {
    pub fn new(credentials: MastodonCredentials, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let statuses_url = credentials
            .base_url
            .join("/api/v1/statuses")
            .context("Failed to build Mastodon statuses URL")?;

        Ok(Self {
            client,
            statuses_url,
            access_token: credentials.access_token,
        })
    }
}

#[async_trait]
impl SocialNetwork for MastodonClient {
    async fn post_status(&self, text: &str, visibility: Visibility) -> Result<String> {
        let response = self
            .client
            .post(self.statuses_url.clone())
            .bearer_auth(&self.access_token)
            .json(&StatusRequest {
                status: text,
                visibility,
            })
            .send()
            .await
            .context("Failed to send status to Mastodon")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(EpisodeError::Status(format!("{} - {}", status, error_text)).into());
        }

        let posted: StatusResponse = response
            .json()
            .await
            .context("Failed to parse Mastodon status")?;

        // `url` is null for some remote or non-public statuses; `uri` always resolves
        let url = posted
            .url
            .or(posted.uri)
            .ok_or_else(|| EpisodeError::Status("status has no url".to_string()))?;
        info!(%url, "Posted status");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_url_ignores_base_path() {
        let client = MastodonClient::new(
            MastodonCredentials {
                base_url: Url::parse("https://mastodon.social/some/path").unwrap(),
                access_token: "token".to_string(),
            },
            30,
        )
        .unwrap();

        assert_eq!(
            client.statuses_url.as_str(),
            "https://mastodon.social/api/v1/statuses"
        );
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(StatusRequest {
            status: "Nuevo episodio",
            visibility: Visibility::Public,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"status": "Nuevo episodio", "visibility": "public"})
        );
    }
}
