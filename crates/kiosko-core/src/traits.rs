//! Collaborator traits consumed by the scheduler core.
//!
//! The queueing engine never talks to Telegram, the article sites, or the
//! rewrite API directly — only through these seams, so tests can swap in
//! in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FetchedArticle, Style, TextLength};

/// Delivers a finished post to the target channel.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<()>;
}

/// Fetches a URL and extracts title/body.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedArticle>;
}

/// Rewrites an article in the requested style and length.
#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(
        &self,
        title: &str,
        text: &str,
        style: Style,
        length: TextLength,
    ) -> Result<String>;
}
