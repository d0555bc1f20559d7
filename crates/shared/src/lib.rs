// Public modules
pub mod cloudinary;
pub mod config;
pub mod error;
pub mod extractor;
pub mod feeds;
pub mod gemini;
pub mod mastodon;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod script;
pub mod speech;
pub mod wav;

// Re-export commonly used types
pub use cloudinary::{CloudinaryClient, MediaHost};
pub use config::{CloudinaryCredentials, Config, MastodonCredentials, PipelineSettings};
pub use error::EpisodeError;
pub use extractor::{ArticleEnricher, HttpPageFetcher, PageFetcher};
pub use feeds::{FeedCollection, FeedCollector, FeedSource, HttpFeedSource};
pub use gemini::GeminiClient;
pub use mastodon::{MastodonClient, SocialNetwork, Visibility};
pub use models::{EnrichedStory, FeedItem, PublishedEpisode, ShowInfo, SkippedFeed, SpeakerVoice, Story};
pub use pipeline::{EpisodePipeline, ProducedEpisode};
pub use publisher::Publisher;
pub use script::{ScriptGenerator, TextModel};
pub use speech::{SpeechModel, SpeechSynthesizer};
