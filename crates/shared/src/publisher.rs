use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::cloudinary::MediaHost;
use crate::mastodon::{SocialNetwork, Visibility};
use crate::models::{PublishedEpisode, ShowInfo};

pub struct Publisher {
    media: Arc<dyn MediaHost>,
    social: Arc<dyn SocialNetwork>,
    show: ShowInfo,
}

impl Publisher {
    pub fn new(media: Arc<dyn MediaHost>, social: Arc<dyn SocialNetwork>, show: ShowInfo) -> Self {
        Self {
            media,
            social,
            show,
        }
    }

    /// `shd-2025-06-10-<run id>`
    pub fn public_id(&self, date: NaiveDate, run_id: &str) -> String {
        format!("{}-{}-{}", self.show.slug, date.format("%Y-%m-%d"), run_id)
    }

    pub fn announcement(&self, cdn_url: &str) -> String {
        format!("{}\n\n{}: {}", self.show.caption, self.show.link_label, cdn_url)
    }

    /// Upload the episode, then announce it. Either failure ends the run.
    pub async fn publish(&self, audio: &Path, run_id: &str, date: NaiveDate) -> Result<PublishedEpisode> {
        let public_id = self.public_id(date, run_id);

        let cdn_url = self
            .media
            .upload(audio, &self.show.folder, &public_id)
            .await
            .context("Failed to upload episode")?;

        let status_url = self
            .social
            .post_status(&self.announcement(&cdn_url), Visibility::Public)
            .await
            .context("Failed to announce episode")?;

        info!(%cdn_url, %status_url, "Episode published");
        Ok(PublishedEpisode {
            cdn_url,
            status_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingHost(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl MediaHost for RecordingHost {
        async fn upload(&self, _path: &Path, folder: &str, public_id: &str) -> Result<String> {
            self.0.lock().unwrap().push((folder.to_string(), public_id.to_string()));
            Ok(format!("https://cdn.example/{}/{}.wav", folder, public_id))
        }
    }

    struct FailingHost;

    #[async_trait]
    impl MediaHost for FailingHost {
        async fn upload(&self, _path: &Path, _folder: &str, _public_id: &str) -> Result<String> {
            anyhow::bail!("401 Unauthorized")
        }
    }

    struct RecordingNetwork(Mutex<Vec<(String, Visibility)>>);

    #[async_trait]
    impl SocialNetwork for RecordingNetwork {
        async fn post_status(&self, text: &str, visibility: Visibility) -> Result<String> {
            self.0.lock().unwrap().push((text.to_string(), visibility));
            Ok("https://social.example/@shd/1".to_string())
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    #[tokio::test]
    async fn uploads_then_announces() {
        let host = Arc::new(RecordingHost(Mutex::new(Vec::new())));
        let network = Arc::new(RecordingNetwork(Mutex::new(Vec::new())));
        let publisher = Publisher::new(host.clone(), network.clone(), ShowInfo::default());

        let published = publisher
            .publish(Path::new("episode-abc.wav"), "abc", date())
            .await
            .unwrap();

        assert_eq!(
            host.0.lock().unwrap().as_slice(),
            [("super-happy-dev".to_string(), "shd-2025-06-10-abc".to_string())]
        );
        assert_eq!(
            published.cdn_url,
            "https://cdn.example/super-happy-dev/shd-2025-06-10-abc.wav"
        );
        assert_eq!(published.status_url, "https://social.example/@shd/1");

        let posts = network.0.lock().unwrap();
        assert_eq!(
            posts[0].0,
            "Nuevo episodio de Super Happy Dev 🎧\n\nEscúchalo aquí: https://cdn.example/super-happy-dev/shd-2025-06-10-abc.wav"
        );
        assert_eq!(posts[0].1, Visibility::Public);
    }

    #[tokio::test]
    async fn failed_upload_posts_nothing() {
        let network = Arc::new(RecordingNetwork(Mutex::new(Vec::new())));
        let publisher = Publisher::new(Arc::new(FailingHost), network.clone(), ShowInfo::default());

        let err = publisher
            .publish(Path::new("episode-abc.wav"), "abc", date())
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("401 Unauthorized"));
        assert!(network.0.lock().unwrap().is_empty());
    }
}
