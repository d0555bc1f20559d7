use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PipelineSettings;
use crate::error::EpisodeError;
use crate::models::{FeedItem, SkippedFeed, Story};

/// Anything that can turn a feed URL into parsed entries
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// `now` stands in for entries that carry no date
    async fn fetch_items(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<FeedItem>>;
}

pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; SuperHappyDev/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_items(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<FeedItem>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send HTTP request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP error: {}", status);
        }

        let body = response.bytes().await.context("Failed to read feed body")?;
        parse_feed(&body, now)
    }
}

/// Parse an RSS, Atom or JSON feed document into items.
pub fn parse_feed(content: &[u8], now: DateTime<Utc>) -> Result<Vec<FeedItem>> {
    let feed = feed_rs::parser::parse(content).context("Failed to parse feed")?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|html| content_snippet(&html))
                .filter(|s| !s.is_empty());

            FeedItem {
                title: entry.title.map(|t| t.content.trim().to_string()).unwrap_or_default(),
                link: entry.links.into_iter().next().map(|l| l.href),
                summary,
                published_at: entry.published.or(entry.updated).unwrap_or(now),
            }
        })
        .collect();

    Ok(items)
}

/// Strip markup from a feed summary and collapse whitespace.
pub fn content_snippet(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep items published at or after `cutoff`, dedupe by link (or title),
/// first occurrence wins, then cap at `max`.
pub fn select_stories(items: Vec<FeedItem>, cutoff: DateTime<Utc>, max: usize) -> Vec<Story> {
    let mut seen = HashSet::new();

    items
        .into_iter()
        .filter(|item| item.published_at >= cutoff)
        .filter(|item| {
            let fresh = seen.insert(item.dedupe_key().to_string());
            if !fresh {
                debug!(key = item.dedupe_key(), "Dropping duplicate story");
            }
            fresh
        })
        .take(max)
        .map(Story::from)
        .collect()
}

#[derive(Debug)]
pub struct FeedCollection {
    pub stories: Vec<Story>,
    pub skipped: Vec<SkippedFeed>,
}

pub struct FeedCollector {
    source: Arc<dyn FeedSource>,
    settings: PipelineSettings,
}

impl FeedCollector {
    pub fn new(source: Arc<dyn FeedSource>, settings: PipelineSettings) -> Self {
        Self { source, settings }
    }

    /// Fetch every configured feed and select the run's stories.
    ///
    /// Feeds are fetched concurrently but merged back in configured order, so
    /// "first occurrence" always means the earliest feed in the list. A feed that
    /// fails is recorded in `skipped` and never aborts the run; only an empty
    /// selection does.
    pub async fn collect(&self, now: DateTime<Utc>) -> Result<FeedCollection> {
        let cutoff = now - self.settings.recency_window;

        let results: Vec<(String, Result<Vec<FeedItem>>)> = stream::iter(self.settings.feeds.clone())
            .map(|url| async move {
                let result = self.source.fetch_items(&url, now).await;
                (url, result)
            })
            .buffered(self.settings.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut items = Vec::new();
        let mut skipped = Vec::new();
        for (url, result) in results {
            match result {
                Ok(feed_items) => {
                    debug!(%url, count = feed_items.len(), "Fetched feed");
                    items.extend(feed_items);
                }
                Err(e) => {
                    warn!(%url, error = %format!("{:#}", e), "Skipping feed");
                    skipped.push(SkippedFeed {
                        url,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        let stories = select_stories(items, cutoff, self.settings.max_stories);
        if stories.is_empty() {
            return Err(EpisodeError::NoRecentStories {
                feeds: self.settings.feeds.len(),
            }
            .into());
        }

        info!(stories = stories.len(), skipped = skipped.len(), "Collected stories");
        Ok(FeedCollection { stories, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn item(title: &str, link: Option<&str>, age_hours: i64) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: link.map(str::to_string),
            summary: None,
            published_at: now() - Duration::hours(age_hours),
        }
    }

    #[test]
    fn keeps_first_of_duplicate_links() {
        let items = vec![
            item("First", Some("https://a.dev/1"), 1),
            item("Second", Some("https://a.dev/1"), 2),
            item("Third", Some("https://a.dev/3"), 3),
        ];
        let stories = select_stories(items, now() - Duration::hours(48), 6);
        let titles: Vec<_> = stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Third"]);
    }

    #[test]
    fn dedupes_linkless_items_by_title() {
        let items = vec![item("Same", None, 1), item("Same", None, 2), item("Other", None, 3)];
        let stories = select_stories(items, now() - Duration::hours(48), 6);
        assert_eq!(stories.len(), 2);
    }

    #[test]
    fn cutoff_is_inclusive() {
        let cutoff = now() - Duration::hours(48);
        let mut boundary = item("Boundary", Some("https://a.dev/b"), 0);
        boundary.published_at = cutoff;
        let mut stale = item("Stale", Some("https://a.dev/s"), 0);
        stale.published_at = cutoff - Duration::seconds(1);

        let stories = select_stories(vec![stale, boundary], cutoff, 6);
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].title, "Boundary");
    }

    #[test]
    fn caps_at_max() {
        let items = (0..10)
            .map(|i| item(&format!("Story {}", i), Some(&format!("https://a.dev/{}", i)), 1))
            .collect();
        let stories = select_stories(items, now() - Duration::hours(48), 6);
        assert_eq!(stories.len(), 6);
        assert_eq!(stories[0].title, "Story 0");
        assert_eq!(stories[5].title, "Story 5");
    }

    #[test]
    fn duplicates_do_not_count_toward_cap() {
        let mut items = vec![item("Dup", Some("https://a.dev/d"), 1); 5];
        items.push(item("Unique", Some("https://a.dev/u"), 1));
        let stories = select_stories(items, now() - Duration::hours(48), 2);
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[1].title, "Unique");
    }

    #[test]
    fn parses_rss_items() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Blog</title>
<item>
  <title>Node 24 released</title>
  <link>https://nodejs.org/en/blog/release/v24</link>
  <description>&lt;p&gt;The &lt;b&gt;new&lt;/b&gt;
   release&lt;/p&gt;</description>
  <pubDate>Mon, 09 Jun 2025 10:00:00 GMT</pubDate>
</item>
<item>
  <title>Undated</title>
  <link>https://nodejs.org/en/blog/undated</link>
</item>
</channel></rss>"#;

        let items = parse_feed(rss.as_bytes(), now()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Node 24 released");
        assert_eq!(
            items[0].link.as_deref(),
            Some("https://nodejs.org/en/blog/release/v24")
        );
        assert_eq!(items[0].summary.as_deref(), Some("The new release"));
        assert_eq!(
            items[0].published_at,
            Utc.with_ymd_and_hms(2025, 6, 9, 10, 0, 0).unwrap()
        );
        assert_eq!(items[1].summary, None);
        assert_eq!(items[1].published_at, now());
    }

    #[test]
    fn parses_atom_entries() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>WebKit</title>
  <id>urn:webkit</id>
  <updated>2025-06-10T08:00:00Z</updated>
  <entry>
    <title>Release Notes for Safari Technology Preview</title>
    <id>urn:webkit:1</id>
    <link href="https://webkit.org/blog/1/"/>
    <updated>2025-06-10T08:00:00Z</updated>
    <summary>Fixes and features.</summary>
  </entry>
</feed>"#;

        let items = parse_feed(atom.as_bytes(), now()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link.as_deref(), Some("https://webkit.org/blog/1/"));
        assert_eq!(items[0].summary.as_deref(), Some("Fixes and features."));
        assert_eq!(
            items[0].published_at,
            Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_non_feed_documents() {
        assert!(parse_feed(b"<html><body>not a feed</body></html>", now()).is_err());
    }

    #[test]
    fn snippet_strips_markup() {
        assert_eq!(
            content_snippet("<p>Hello <a href=\"x\">world</a></p>\n\n<p>again</p>"),
            "Hello world again"
        );
    }
}
