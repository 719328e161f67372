//! Publication dispatch.
//!
//! The dispatcher wakes at each configured slot instant, pulls due
//! articles urgent-first, and hands the formatted post to the channel
//! sink. Delivery outcomes are recorded per article; a failure marks
//! that row failed and never tears down the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use kiosko_core::clock::Clock;
use kiosko_core::error::{KioskoError, Result};
use kiosko_core::settings::SharedSettings;
use kiosko_core::traits::ChannelSink;
use kiosko_core::types::ArticleRecord;
use kiosko_store::NewsStore;

use crate::slots::SlotPlanner;

/// Telegram message size cap, counted in characters.
pub const POST_MAX_CHARS: usize = 4096;

/// How many due articles one slot trigger may publish.
const PER_SLOT_LIMIT: usize = 1;

/// Delivery side of the queue. Shared between the slot loop and the
/// operator command handlers.
pub struct Publisher {
    store: NewsStore,
    sink: Arc<dyn ChannelSink>,
    clock: Clock,
}

impl Publisher {
    pub fn new(store: NewsStore, sink: Arc<dyn ChannelSink>, clock: Clock) -> Self {
        Self { store, sink, clock }
    }

    /// Deliver one article right now, regardless of its slot. Used for
    /// urgent publications and the manual publish command.
    pub async fn publish_by_id(&self, id: i64) -> Result<()> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| KioskoError::NotFound(format!("article {id}")))?;
        self.deliver(&record).await
    }

    async fn deliver(&self, record: &ArticleRecord) -> Result<()> {
        let post = format_post(record);
        match self.sink.deliver(&post).await {
            Ok(()) => {
                self.store.mark_published(record.id, self.clock.now())?;
                info!(id = record.id, title = %record.title, "📰 published");
                Ok(())
            }
            Err(e) => {
                if let Err(store_err) = self.store.mark_failed(record.id) {
                    error!(id = record.id, "could not record failure: {store_err}");
                }
                warn!(id = record.id, "delivery failed: {e}");
                Err(e)
            }
        }
    }

    /// One dispatch pass: publish due articles, urgent first. Errors
    /// are logged per article and never propagate out of the loop.
    pub async fn run_tick(&self) {
        let now = self.clock.now();
        let due = match self.store.due_for_publication(now, PER_SLOT_LIMIT) {
            Ok(due) => due,
            Err(e) => {
                error!("due query failed: {e}");
                return;
            }
        };
        for record in due {
            // deliver() already marked the row and logged the outcome.
            let _ = self.deliver(&record).await;
        }
    }

    /// Run the slot-aligned publication loop until the task is aborted.
    pub fn spawn_publication_loop(
        self: Arc<Self>,
        settings: SharedSettings,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let snapshot = settings.snapshot();
                let planner = SlotPlanner::new(&snapshot.publish_hours);
                let now = self.clock.now();
                let next = planner.next_publication_instant(now);
                let wait = sleep_until(now, next, snapshot.check_interval_secs);
                tokio::time::sleep(wait).await;
                if self.clock.now() >= next {
                    info!("⏰ publication slot {}", next.format("%Y-%m-%d %H:%M"));
                    self.run_tick().await;
                }
            }
        })
    }
}

/// Sleep duration from `now` to `next`, capped at the check interval so
/// a publish-hours change shortens the wait.
fn sleep_until(now: NaiveDateTime, next: NaiveDateTime, check_interval_secs: u64) -> Duration {
    let secs = (next - now).num_seconds().max(1) as u64;
    Duration::from_secs(secs.min(check_interval_secs.max(1)))
}

/// Periodically drop published rows older than the retention window.
pub fn spawn_retention_loop(
    store: NewsStore,
    clock: Clock,
    retention_days: u32,
) -> JoinHandle<()> {
    const SWEEP_EVERY: Duration = Duration::from_secs(6 * 60 * 60);
    tokio::spawn(async move {
        loop {
            let cutoff = clock.now() - chrono::Duration::days(retention_days as i64);
            match store.purge_published_before(cutoff) {
                Ok(0) => {}
                Ok(n) => info!("🧹 purged {n} published articles older than {retention_days}d"),
                Err(e) => error!("retention sweep failed: {e}"),
            }
            tokio::time::sleep(SWEEP_EVERY).await;
        }
    })
}

/// Render a queue row as the outgoing post: rewritten body (original
/// body if the rewrite is empty) plus a source link footer, truncated
/// to [`POST_MAX_CHARS`] characters.
pub fn format_post(record: &ArticleRecord) -> String {
    let body = if record.processed_text.trim().is_empty() {
        record.original_text.as_str()
    } else {
        record.processed_text.as_str()
    };
    let footer = format!("\n\n[Источник]({})", record.url);
    let budget = POST_MAX_CHARS.saturating_sub(footer.chars().count());
    let mut post = String::with_capacity(body.len() + footer.len());
    if body.chars().count() <= budget {
        post.push_str(body);
    } else {
        post.extend(body.chars().take(budget.saturating_sub(1)));
        post.push('…');
    }
    post.push_str(&footer);
    post
}
