//! # kiosko-fetch
//!
//! Fetches article pages over HTTP and extracts a title and readable
//! body from the HTML. Extraction is heuristic: Open Graph metadata
//! first, then the document structure.

mod extract;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use kiosko_core::error::{KioskoError, Result};
use kiosko_core::traits::ArticleSource;
use kiosko_core::types::FetchedArticle;

pub use extract::extract_article;

const USER_AGENT: &str = concat!("kiosko/", env!("CARGO_PKG_VERSION"));

/// [`ArticleSource`] backed by a plain HTTP GET.
pub struct HttpArticleSource {
    client: reqwest::Client,
}

impl HttpArticleSource {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| KioskoError::Fetch(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArticleSource for HttpArticleSource {
    async fn fetch(&self, url: &str) -> Result<FetchedArticle> {
        debug!(url, "fetching article");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KioskoError::Fetch(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(KioskoError::Fetch(format!("GET {url}: HTTP {status}")));
        }
        let html = response
            .text()
            .await
            .map_err(|e| KioskoError::Fetch(format!("read body of {url}: {e}")))?;
        // Parsing is sync so the non-Send DOM never crosses an await.
        Ok(extract_article(url, &html))
    }
}
