//! Ingestion pipeline.
//!
//! Source-channel posts are mined for URLs; each URL flows through
//! fetch, validation, urgency classification, rewrite, and enqueue. A
//! fixed worker pool behind a bounded queue caps concurrent fetches, so
//! a burst of posts cannot spawn unbounded work.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kiosko_core::clock::Clock;
use kiosko_core::error::Result;
use kiosko_core::settings::SharedSettings;
use kiosko_core::traits::{ArticleSource, Rewriter};
use kiosko_core::types::EnqueueOutcome;
use kiosko_scheduler::{Publisher, SlotPlanner};
use kiosko_store::{NewArticle, NewsStore};

/// Queued URLs waiting for a worker. Beyond this the post is partially
/// dropped with a warning rather than stalling the polling loop.
pub const QUEUE_DEPTH: usize = 64;

/// Concurrent fetch/rewrite workers.
pub const WORKERS: usize = 3;

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"https?://[^\s<>()]+").unwrap_or_else(|e| panic!("url regex: {e}"))
    })
}

/// Extract distinct article URLs from a post, in order of appearance.
/// Trailing punctuation that Telegram keeps glued to links is stripped.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for m in url_regex().find_iter(text) {
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', '"', '\'']);
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// An article is urgent when its title or body contains one of the
/// configured keywords. Keywords are stored lowercased; matching is
/// case-insensitive substring.
pub fn is_urgent(title: &str, text: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let haystack = format!("{} {}", title.to_lowercase(), text.to_lowercase());
    keywords.iter().any(|k| !k.is_empty() && haystack.contains(k.as_str()))
}

/// Everything one URL needs to travel from link to queue row.
pub struct IngestPipeline {
    pub store: NewsStore,
    pub source: Arc<dyn ArticleSource>,
    pub rewriter: Arc<dyn Rewriter>,
    pub publisher: Arc<Publisher>,
    pub settings: SharedSettings,
    pub clock: Clock,
}

impl IngestPipeline {
    /// Process one URL end to end. Each failure mode logs and returns;
    /// errors here must never take down a worker.
    pub async fn process_url(&self, url: &str) -> Result<()> {
        let settings = self.settings.snapshot();

        let article = self.source.fetch(url).await?;
        if !article.is_valid() {
            info!(url, "⏭️ skipping: too short or untitled");
            return Ok(());
        }

        let urgent = is_urgent(&article.title, &article.text, &settings.urgent_keywords);
        let processed = match self
            .rewriter
            .rewrite(&article.title, &article.text, settings.style, settings.text_length)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                // The dispatcher falls back to the original body.
                warn!(url, "rewrite failed, queueing original: {e}");
                String::new()
            }
        };

        let now = self.clock.now();
        let planner = SlotPlanner::new(&settings.publish_hours);
        let record = NewArticle {
            url,
            title: &article.title,
            original_text: &article.text,
            processed_text: &processed,
            is_urgent: urgent,
        };

        if urgent {
            let slot = planner.urgent_slot(now);
            match self.store.enqueue(&record, slot, now)? {
                EnqueueOutcome::Queued(id) => {
                    info!(id, url, "🚨 urgent article, publishing immediately");
                    self.publisher.publish_by_id(id).await?;
                }
                EnqueueOutcome::Duplicate => debug!(url, "already queued"),
            }
        } else {
            let candidates = planner.candidate_slots(now);
            match self.store.enqueue_at_first_free(&record, &candidates, now)? {
                (EnqueueOutcome::Queued(id), slot) => {
                    info!(id, url, "📥 queued for {}", slot.format("%Y-%m-%d %H:%M"));
                }
                (EnqueueOutcome::Duplicate, _) => debug!(url, "already queued"),
            }
        }
        Ok(())
    }
}

/// Accepts source posts and fans their URLs out to the worker pool.
pub struct IngestionCoordinator {
    tx: mpsc::Sender<String>,
    workers: Vec<JoinHandle<()>>,
}

impl IngestionCoordinator {
    pub fn start(pipeline: Arc<IngestPipeline>) -> Self {
        Self::with_capacity(pipeline, WORKERS, QUEUE_DEPTH)
    }

    pub fn with_capacity(
        pipeline: Arc<IngestPipeline>,
        workers: usize,
        queue_depth: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<String>(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..workers.max(1))
            .map(|n| {
                let rx = Arc::clone(&rx);
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    loop {
                        let url = { rx.lock().await.recv().await };
                        let Some(url) = url else { break };
                        if let Err(e) = pipeline.process_url(&url).await {
                            warn!(worker = n, url, "ingest failed: {e}");
                        }
                    }
                    debug!(worker = n, "ingest worker stopped");
                })
            })
            .collect();
        Self { tx, workers }
    }

    /// Queue the URLs of one source post, newest-first order preserved,
    /// capped at `max_urls`. Returns how many were accepted.
    pub async fn submit_post(&self, text: &str, max_urls: usize) -> usize {
        let mut accepted = 0;
        for url in extract_urls(text).into_iter().take(max_urls) {
            match self.tx.try_send(url) {
                Ok(()) => accepted += 1,
                Err(mpsc::error::TrySendError::Full(url)) => {
                    warn!(url, "ingest queue full, dropping");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
        accepted
    }

    /// Close the intake and wait for in-flight work to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
