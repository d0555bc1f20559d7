use anyhow::{Context, Result};
use chrono::Duration;
use std::env;
use url::Url;

/// Feeds polled when no `--feed` override is given.
pub const DEFAULT_FEEDS: &[&str] = &[
    // AI
    "https://ai.googleblog.com/feeds/posts/default?alt=rss",
    "https://openai.com/blog/rss",
    // Web / dev
    "https://developer.chrome.com/feeds/blog.xml",
    "https://nodejs.org/en/feed/blog.xml",
    "https://webkit.org/feed/",
    "https://www.typescriptlang.org/feed.xml",
    "https://news.mit.edu/rss/topic/artificial-intelligence2",
];

const CONFIG_DIR_NAME: &str = "super-happy-dev";

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        try_load_dotenv();

        let gemini_api_key = env::var("GEMINI_API_KEY").context(
            "GEMINI_API_KEY not found.\n\n\
            To fix this, create ~/.config/super-happy-dev/.env with:\n  \
            GEMINI_API_KEY=your_key_here\n\n\
            Get a Gemini API key from: https://aistudio.google.com/apikey",
        )?;

        Ok(Self { gemini_api_key })
    }
}

#[derive(Debug, Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudinaryCredentials {
    pub fn from_env() -> Result<Self> {
        try_load_dotenv();

        Ok(Self {
            cloud_name: required_var("CLOUDINARY_CLOUD_NAME")?,
            api_key: required_var("CLOUDINARY_API_KEY")?,
            api_secret: required_var("CLOUDINARY_API_SECRET")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MastodonCredentials {
    pub base_url: Url,
    pub access_token: String,
}

impl MastodonCredentials {
    pub fn from_env() -> Result<Self> {
        try_load_dotenv();

        let raw_url = required_var("MASTODON_URL")?;
        let base_url = Url::parse(&raw_url)
            .with_context(|| format!("MASTODON_URL is not a valid URL: {}", raw_url))?;

        Ok(Self {
            base_url,
            access_token: required_var("MASTODON_TOKEN")?,
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).with_context(|| {
        format!(
            "{} not found. Set it as an environment variable or add it to ~/.config/{}/.env \
            (only needed when publishing; use --dry-run to skip publishing)",
            name, CONFIG_DIR_NAME
        )
    })
}

fn try_load_dotenv() {
    // Try locations in order of preference:

    // 1. Current directory (for development)
    if dotenvy::dotenv().is_ok() {
        return;
    }

    // 2. ~/.config/super-happy-dev/.env (standard config location)
    if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join(CONFIG_DIR_NAME).join(".env");
        if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
            return;
        }
    }

    // 3. ~/.env (home directory)
    if let Some(home_dir) = dirs::home_dir() {
        let home_path = home_dir.join(".env");
        if home_path.exists() {
            let _ = dotenvy::from_path(&home_path);
        }
    }

    // If none found, that's okay - environment variables might be set system-wide
}

/// Knobs for a single run. Defaults reproduce the weekly show.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub feeds: Vec<String>,
    pub recency_window: Duration,
    pub max_stories: usize,
    /// Summaries strictly longer than this are used as the story body as-is.
    pub min_summary_chars: usize,
    pub max_body_chars: usize,
    pub fetch_concurrency: usize,
    pub http_timeout_secs: u64,
    pub model_timeout_secs: u64,
    pub text_model: String,
    pub speech_model: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            feeds: DEFAULT_FEEDS.iter().map(|f| f.to_string()).collect(),
            recency_window: Duration::hours(48),
            max_stories: 6,
            min_summary_chars: 200,
            max_body_chars: 4000,
            fetch_concurrency: 4,
            http_timeout_secs: 30,
            model_timeout_secs: 300,
            text_model: "gemini-2.5-pro".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
        }
    }
}
