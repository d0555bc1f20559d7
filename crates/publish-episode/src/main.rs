use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use shared::{
    ArticleEnricher, CloudinaryClient, CloudinaryCredentials, Config, EpisodePipeline,
    FeedCollector, GeminiClient, HttpFeedSource, HttpPageFetcher, MastodonClient,
    MastodonCredentials, PipelineSettings, ProducedEpisode, Publisher, ScriptGenerator, ShowInfo,
    SpeechSynthesizer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// One year; anything larger is a typo
const MAX_HOURS: i64 = 24 * 366;

#[derive(Parser, Debug)]
#[command(name = "publish-episode")]
#[command(about = "Turn this week's dev news into a two-host audio episode and publish it")]
struct Args {
    /// Only keep stories published within this many hours
    #[arg(long, default_value = "48", value_parser = clap::value_parser!(i64).range(1..=MAX_HOURS))]
    hours: i64,

    /// Maximum number of stories in the episode
    #[arg(long, default_value = "6")]
    max_stories: usize,

    /// Feed URL to poll (repeatable; replaces the default feed list)
    #[arg(long = "feed")]
    feeds: Vec<String>,

    /// Directory the episode WAV is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Stop after synthesis: don't upload or post
    #[arg(long)]
    dry_run: bool,

    /// Also save the generated script to this file
    #[arg(long)]
    script_out: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> PipelineSettings {
        let mut settings = PipelineSettings {
            recency_window: Duration::hours(self.hours),
            max_stories: self.max_stories,
            ..PipelineSettings::default()
        };
        if !self.feeds.is_empty() {
            settings.feeds = self.feeds.clone();
        }
        settings
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_pipeline(settings: &PipelineSettings, show: &ShowInfo, gemini: Arc<GeminiClient>) -> Result<EpisodePipeline> {
    let feeds = Arc::new(HttpFeedSource::new(settings.http_timeout_secs)?);
    let pages = Arc::new(HttpPageFetcher::new(settings.http_timeout_secs)?);

    Ok(EpisodePipeline::new(
        FeedCollector::new(feeds, settings.clone()),
        ArticleEnricher::new(pages, settings),
        ScriptGenerator::new(gemini.clone(), show.clone()),
        SpeechSynthesizer::new(gemini, show.clone()),
    ))
}

fn build_publisher(settings: &PipelineSettings, show: &ShowInfo) -> Result<Publisher> {
    let cloudinary = CloudinaryClient::new(CloudinaryCredentials::from_env()?, settings.model_timeout_secs)?;
    let mastodon = MastodonClient::new(MastodonCredentials::from_env()?, settings.http_timeout_secs)?;
    Ok(Publisher::new(Arc::new(cloudinary), Arc::new(mastodon), show.clone()))
}

async fn save_script(path: &Path, script: &str) -> Result<()> {
    tokio::fs::write(path, script)
        .await
        .with_context(|| format!("Failed to write script to {}", path.display()))?;
    println!("📝 Script saved to: {}", path.display());
    Ok(())
}

fn report(produced: &ProducedEpisode) {
    println!("✓ Selected {} stories", produced.stories.len());
    for enriched in &produced.stories {
        let source = if enriched.body.is_empty() { " (no body)" } else { "" };
        println!("  • {}{}", enriched.story.title, source);
    }
    if !produced.skipped_feeds.is_empty() {
        println!("\n⚠ Skipped {} feeds:", produced.skipped_feeds.len());
        for skipped in &produced.skipped_feeds {
            println!("  ✗ {}", skipped.url);
            println!("    {}", skipped.reason);
        }
    }
    println!("✓ Script: {} lines", produced.script.lines().count());
    println!("✓ Audio: {}", produced.audio_path.display());
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = Config::from_env()?;
    let settings = args.settings();
    let show = ShowInfo::super_happy_dev();

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    // Resolve publishing credentials up front so a bad config fails before any model calls
    let publisher = if args.dry_run {
        None
    } else {
        Some(build_publisher(&settings, &show)?)
    };

    let gemini = Arc::new(GeminiClient::new(
        config.gemini_api_key,
        settings.text_model.clone(),
        settings.speech_model.clone(),
        settings.model_timeout_secs,
    )?);
    let pipeline = build_pipeline(&settings, &show, gemini)?;

    let now = Utc::now();
    let run_id = uuid::Uuid::new_v4().to_string();

    println!("📡 Fetching {} feeds, producing episode {}...", settings.feeds.len(), run_id);
    println!("  (This may take a few minutes...)");

    let produced = pipeline.produce(now, &run_id, &args.output_dir).await?;
    report(&produced);

    // Saved before publishing so a failed upload or post keeps the script
    if let Some(path) = &args.script_out {
        save_script(path, &produced.script).await?;
    }

    match &publisher {
        None => println!("\n🔇 Dry run: nothing uploaded or posted"),
        Some(publisher) => {
            let published = pipeline.publish(publisher, &produced, now, &run_id).await?;
            println!("\n☁️  Uploaded: {}", published.cdn_url);
            println!("🐘 Published at: {}", published.status_url);
        }
    }

    println!("\n✅ Done!");
    Ok(())
}
