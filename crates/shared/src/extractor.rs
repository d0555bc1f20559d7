use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PipelineSettings;
use crate::models::{EnrichedStory, Story};

/// Containers whose paragraphs are never article content
const BOILERPLATE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "form", "script", "style", "noscript", "menu",
];

/// class/id fragments that mark navigation, comments and the like
const UNLIKELY_MARKERS: &[&str] = &[
    "comment", "sidebar", "footer", "menu", "share", "related", "promo", "banner", "cookie",
];

const MIN_PARAGRAPH_CHARS: usize = 25;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; SuperHappyDev/1.0)")
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
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

        response.text().await.context("Failed to read response body")
    }
}

/// Pull the main article text out of a page, readability style.
///
/// Every paragraph outside boilerplate containers adds to its parent's score
/// (and half of that to the grandparent). The paragraphs under the best
/// scoring container are the article. Pages without usable paragraphs fall
/// back to a plain-text rendering of `<body>` with the boilerplate removed.
pub fn extract_readable_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let paragraph = Selector::parse("p").ok()?;

    let mut candidates: Vec<(ElementRef, f64)> = Vec::new();
    for p in document.select(&paragraph) {
        if in_boilerplate(&p) {
            continue;
        }

        let text = normalized_text(&p);
        let len = text.chars().count();
        if len < MIN_PARAGRAPH_CHARS {
            continue;
        }

        let commas = text.matches(',').count() as f64;
        let score = 1.0 + commas + (len as f64 / 100.0).min(3.0);

        let parent = p.parent().and_then(ElementRef::wrap);
        let grandparent = parent.and_then(|el| el.parent()).and_then(ElementRef::wrap);
        for (ancestor, weight) in [(parent, 1.0), (grandparent, 0.5)] {
            if let Some(ancestor) = ancestor {
                add_score(&mut candidates, ancestor, score * weight);
            }
        }
    }

    let best = candidates
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(el, _)| el);

    let text = match best {
        Some(container) => container
            .select(&paragraph)
            .filter(|p| !in_boilerplate(p))
            .map(|p| normalized_text(&p))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        None => fallback_text(&document),
    };

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn add_score<'a>(candidates: &mut Vec<(ElementRef<'a>, f64)>, element: ElementRef<'a>, score: f64) {
    match candidates.iter_mut().find(|(el, _)| *el == element) {
        Some((_, total)) => *total += score,
        None => candidates.push((element, score)),
    }
}

/// Whether any container between `element` and `<body>` is boilerplate.
/// Classes on `<body>` and `<html>` describe the whole page and are ignored.
fn in_boilerplate(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|ancestor| !is_document_root(ancestor))
        .any(|ancestor| is_boilerplate(&ancestor))
}

fn is_document_root(element: &ElementRef) -> bool {
    matches!(element.value().name(), "body" | "html")
}

fn is_boilerplate(element: &ElementRef) -> bool {
    let node = element.value();
    if BOILERPLATE_TAGS.contains(&node.name()) {
        return true;
    }
    let marker = format!(
        "{} {}",
        node.attr("class").unwrap_or(""),
        node.attr("id").unwrap_or("")
    )
    .to_lowercase();
    UNLIKELY_MARKERS.iter().any(|m| marker.contains(m))
}

fn normalized_text(element: &ElementRef) -> String {
    element.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fallback_text(document: &Html) -> String {
    let Ok(body) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&body).next() else {
        return String::new();
    };

    let mut cleaned = String::new();
    push_content(&body, &mut cleaned);
    let text = html2text::config::plain()
        .string_from_read(cleaned.as_bytes(), 100)
        .unwrap_or_default();

    // Tiny renderings are error pages and cookie walls, not articles
    if text.trim().chars().count() < 100 {
        String::new()
    } else {
        text
    }
}

/// Re-serialize the children of `element`, leaving out boilerplate subtrees.
/// Attributes are dropped; only the structure matters for rendering.
fn push_content(element: &ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if is_boilerplate(&el) {
                continue;
            }
            let name = el.value().name();
            out.push_str(&format!("<{}>", name));
            push_content(&el, out);
            out.push_str(&format!("</{}>", name));
        } else if let Some(text) = child.value().as_text() {
            out.push_str(
                &text
                    .replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;"),
            );
        }
    }
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

pub struct ArticleEnricher {
    fetcher: Arc<dyn PageFetcher>,
    min_summary_chars: usize,
    max_body_chars: usize,
    concurrency: usize,
}

impl ArticleEnricher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: &PipelineSettings) -> Self {
        Self {
            fetcher,
            min_summary_chars: settings.min_summary_chars,
            max_body_chars: settings.max_body_chars,
            concurrency: settings.fetch_concurrency.max(1),
        }
    }

    /// Give a story its body. Never fails: an unreachable or unreadable page
    /// yields an empty body.
    pub async fn enrich(&self, story: Story) -> EnrichedStory {
        let body = match story.summary.as_deref() {
            Some(summary) if summary.chars().count() > self.min_summary_chars => {
                debug!(title = %story.title, "Using feed summary as body");
                summary.to_string()
            }
            _ => match story.link.as_deref() {
                Some(link) => self.fetch_article_text(link).await,
                None => String::new(),
            },
        };

        EnrichedStory {
            body: truncate_chars(&body, self.max_body_chars),
            story,
        }
    }

    /// Enrich stories concurrently; output order matches input order.
    pub async fn enrich_all(&self, stories: Vec<Story>) -> Vec<EnrichedStory> {
        let enriched: Vec<EnrichedStory> = stream::iter(stories)
            .map(|story| self.enrich(story))
            .buffered(self.concurrency)
            .collect()
            .await;

        let empty = enriched.iter().filter(|s| s.body.is_empty()).count();
        info!(stories = enriched.len(), empty_bodies = empty, "Enriched stories");
        enriched
    }

    async fn fetch_article_text(&self, url: &str) -> String {
        match self.fetcher.fetch_html(url).await {
            Ok(html) => extract_readable_text(&html).unwrap_or_else(|| {
                warn!(%url, "No readable content found");
                String::new()
            }),
            Err(e) => {
                warn!(%url, error = %format!("{:#}", e), "Failed to fetch article");
                String::new()
            }
        }
    }
}
