use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::extractor::ArticleEnricher;
use crate::feeds::FeedCollector;
use crate::models::{EnrichedStory, PublishedEpisode, SkippedFeed};
use crate::publisher::Publisher;
use crate::script::ScriptGenerator;
use crate::speech::SpeechSynthesizer;

/// Everything a run produces before it goes public
#[derive(Debug)]
pub struct ProducedEpisode {
    pub stories: Vec<EnrichedStory>,
    pub skipped_feeds: Vec<SkippedFeed>,
    pub script: String,
    pub audio_path: PathBuf,
}

pub fn audio_file_name(run_id: &str) -> String {
    format!("episode-{}.wav", run_id)
}

/// Collector → enricher → script → speech, each stage taking the previous
/// one's full output.
pub struct EpisodePipeline {
    collector: FeedCollector,
    enricher: ArticleEnricher,
    writer: ScriptGenerator,
    synthesizer: SpeechSynthesizer,
}

impl EpisodePipeline {
    pub fn new(
        collector: FeedCollector,
        enricher: ArticleEnricher,
        writer: ScriptGenerator,
        synthesizer: SpeechSynthesizer,
    ) -> Self {
        Self {
            collector,
            enricher,
            writer,
            synthesizer,
        }
    }

    pub async fn produce(&self, now: DateTime<Utc>, run_id: &str, out_dir: &Path) -> Result<ProducedEpisode> {
        info!("Collecting recent stories");
        let collection = self.collector.collect(now).await?;

        info!("Enriching stories");
        let stories = self.enricher.enrich_all(collection.stories).await;

        info!("Generating episode script");
        let script = self
            .writer
            .generate(&stories)
            .await
            .context("Failed to generate script")?;

        info!("Synthesizing episode audio");
        let audio_path = self
            .synthesizer
            .synthesize(&script, &out_dir.join(audio_file_name(run_id)))
            .await
            .context("Failed to synthesize episode")?;

        Ok(ProducedEpisode {
            stories,
            skipped_feeds: collection.skipped,
            script,
            audio_path,
        })
    }

    /// Produce the episode and publish it. All or nothing: the first failure
    /// ends the run.
    pub async fn run(
        &self,
        publisher: &Publisher,
        now: DateTime<Utc>,
        run_id: &str,
        out_dir: &Path,
    ) -> Result<(ProducedEpisode, PublishedEpisode)> {
        let produced = self.produce(now, run_id, out_dir).await?;
        let published = self.publish(publisher, &produced, now, run_id).await?;
        Ok((produced, published))
    }

    /// Upload a produced episode and announce it.
    pub async fn publish(
        &self,
        publisher: &Publisher,
        produced: &ProducedEpisode,
        now: DateTime<Utc>,
        run_id: &str,
    ) -> Result<PublishedEpisode> {
        info!("Publishing episode");
        publisher
            .publish(&produced.audio_path, run_id, now.date_naive())
            .await
    }
}
