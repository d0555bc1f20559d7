use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

use crate::config::CloudinaryCredentials;
use crate::error::EpisodeError;

/// Somewhere to put the episode so it gets a public URL
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Upload `path` as audio/video media, replacing any existing asset with the
    /// same id. Returns the secure retrieval URL.
    async fn upload(&self, path: &Path, folder: &str, public_id: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct CloudinaryClient {
    client: Client,
    credentials: CloudinaryCredentials,
}

impl CloudinaryClient {
    pub fn new(credentials: CloudinaryCredentials, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            credentials,
        })
    }

    fn upload_url(&self) -> String {
        // Audio goes through the "video" resource type
        format!(
            "https://api.cloudinary.com/v1_1/{}/video/upload",
            urlencoding::encode(&self.credentials.cloud_name)
        )
    }
}

/// Cloudinary request signature: SHA-256 over the alphabetically sorted
/// `key=value` pairs joined with `&`, followed by the API secret.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl MediaHost for CloudinaryClient {
    async fn upload(&self, path: &Path, folder: &str, public_id: &str) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "episode.wav".to_string());

        let params = vec![
            ("folder", folder.to_string()),
            ("overwrite", "true".to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];
        let signature = sign_params(&params, &self.credentials.api_secret);

        let mut form = Form::new();
        for (key, value) in params {
            form = form.text(key, value);
        }
        let form = form
            .text("api_key", self.credentials.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part(
                "file",
                Part::bytes(bytes).file_name(file_name).mime_str("audio/wav")?,
            );

        debug!(%folder, %public_id, "Uploading to Cloudinary");
        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .context("Failed to send upload to Cloudinary")?;

        let status = response.status();
        let body: UploadResponse = response
            .json()
            .await
            .context("Failed to parse Cloudinary response")?;

        if let Some(error) = body.error {
            return Err(EpisodeError::Upload(format!("{} ({})", error.message, status)).into());
        }
        if !status.is_success() {
            return Err(EpisodeError::Upload(format!("HTTP {}", status)).into());
        }

        let url = body
            .secure_url
            .ok_or_else(|| EpisodeError::Upload("response had no secure_url".to_string()))?;
        info!(%url, "Uploaded episode");
        Ok(url)
    }
}
