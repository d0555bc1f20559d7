use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One dialogue role and the prebuilt voice that reads it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerVoice {
    /// Label used as the line prefix in the script, e.g. `Speaker 1`
    pub speaker: String,
    /// Name the host goes by on air
    pub persona: String,
    pub voice: String,
}

impl SpeakerVoice {
    pub fn new(
        speaker: impl Into<String>,
        persona: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            persona: persona.into(),
            voice: voice.into(),
        }
    }
}

/// Metadata about the show
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowInfo {
    pub name: String,
    /// Media host folder episodes are uploaded into
    pub folder: String,
    /// Prefix of the public id given to each upload
    pub slug: String,
    pub caption: String,
    pub link_label: String,
    pub speakers: [SpeakerVoice; 2],
}

impl ShowInfo {
    pub fn new(name: impl Into<String>, folder: impl Into<String>, slug: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            caption: format!("Nuevo episodio de {} 🎧", name),
            link_label: "Escúchalo aquí".to_string(),
            speakers: [
                SpeakerVoice::new("Speaker 1", "Happy", "Kore"),
                SpeakerVoice::new("Speaker 2", "Dev", "Puck"),
            ],
            name,
            folder: folder.into(),
            slug: slug.into(),
        }
    }

    pub fn super_happy_dev() -> Self {
        Self::new("Super Happy Dev", "super-happy-dev", "shd")
    }

    /// The exact line every script has to open with
    pub fn opening_line(&self) -> String {
        format!(
            "{}: Hola, bienvenidos al podcast de {}.",
            self.speakers[0].speaker, self.name
        )
    }
}

impl Default for ShowInfo {
    fn default() -> Self {
        Self::super_happy_dev()
    }
}

/// A single entry as parsed from a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl FeedItem {
    /// Identity used for cross-feed dedupe: the link, or the title when there is no link
    pub fn dedupe_key(&self) -> &str {
        match self.link.as_deref() {
            Some(link) if !link.is_empty() => link,
            _ => &self.title,
        }
    }
}

/// A feed item that survived the recency window, dedupe and cap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl From<FeedItem> for Story {
    fn from(item: FeedItem) -> Self {
        Self {
            title: item.title,
            link: item.link,
            summary: item.summary,
            published_at: item.published_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedStory {
    pub story: Story,
    pub body: String,
}

/// A feed that was skipped during collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFeed {
    pub url: String,
    pub reason: String,
}

/// The externally visible result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEpisode {
    pub cdn_url: String,
    pub status_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: Option<&str>) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: link.map(str::to_string),
            summary: None,
            published_at: Utc::now(),
        }
    }

    #[test]
    fn dedupe_key_prefers_link() {
        assert_eq!(item("Title", Some("https://a.dev/x")).dedupe_key(), "https://a.dev/x");
    }

    #[test]
    fn dedupe_key_falls_back_to_title() {
        assert_eq!(item("Title", None).dedupe_key(), "Title");
        assert_eq!(item("Title", Some("")).dedupe_key(), "Title");
    }

    #[test]
    fn opening_line_names_the_show() {
        let show = ShowInfo::super_happy_dev();
        assert_eq!(
            show.opening_line(),
            "Speaker 1: Hola, bienvenidos al podcast de Super Happy Dev."
        );
        assert_eq!(show.caption, "Nuevo episodio de Super Happy Dev 🎧");
    }
}
