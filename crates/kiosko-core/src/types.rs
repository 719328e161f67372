//! Domain types shared across the workspace.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{KioskoError, Result};

/// Lifecycle of a queued article. `Published` and `Failed` are terminal
/// for the dispatcher; a failed record may only be republished manually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Pending,
    Published,
    Failed,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Published => "published",
            ArticleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ArticleStatus::Pending),
            "published" => Ok(ArticleStatus::Published),
            "failed" => Ok(ArticleStatus::Failed),
            other => Err(KioskoError::Store(format!("unknown status '{other}'"))),
        }
    }
}

/// One row of the publication queue, keyed by source URL.
/// `scheduled_time` is civil local time at second precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub original_text: String,
    pub processed_text: String,
    pub scheduled_time: NaiveDateTime,
    pub status: ArticleStatus,
    pub is_urgent: bool,
    pub created_at: NaiveDateTime,
    pub published_at: Option<NaiveDateTime>,
}

/// Result of inserting into the queue. Re-posting a known URL is an
/// expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued(i64),
    Duplicate,
}

/// Short preview row for status summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPreview {
    pub id: i64,
    pub title: String,
    pub scheduled_time: NaiveDateTime,
    pub is_urgent: bool,
}

/// Aggregate queue statistics plus the next few pending articles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSummary {
    pub total: i64,
    pub pending: i64,
    pub published: i64,
    pub failed: i64,
    pub urgent: i64,
    #[serde(default)]
    pub next: Vec<PendingPreview>,
}

/// Extracted article content as returned by the fetch collaborator.
#[derive(Debug, Clone)]
pub struct FetchedArticle {
    pub url: String,
    pub title: String,
    pub text: String,
    pub author: Option<String>,
}

impl FetchedArticle {
    /// Minimum body length for an article to be worth queueing.
    pub const MIN_TEXT_LEN: usize = 100;

    /// Articles without a title or with a near-empty body are skipped.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && self.text.trim().chars().count() >= Self::MIN_TEXT_LEN
    }
}

/// Editorial voice applied by the rewrite collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Informative,
    Ironic,
    Cynical,
    Playful,
    Mocking,
}

impl Style {
    pub const ALL: [Style; 5] = [
        Style::Informative,
        Style::Ironic,
        Style::Cynical,
        Style::Playful,
        Style::Mocking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Informative => "informative",
            Style::Ironic => "ironic",
            Style::Cynical => "cynical",
            Style::Playful => "playful",
            Style::Mocking => "mocking",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "informative" => Ok(Style::Informative),
            "ironic" => Ok(Style::Ironic),
            "cynical" => Ok(Style::Cynical),
            "playful" => Ok(Style::Playful),
            "mocking" => Ok(Style::Mocking),
            other => Err(KioskoError::Config(format!(
                "unknown style '{other}' (expected one of: informative, ironic, cynical, playful, mocking)"
            ))),
        }
    }
}

/// Target length of a rewritten article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextLength {
    Short,
    Medium,
    Long,
}

impl TextLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextLength::Short => "short",
            TextLength::Medium => "medium",
            TextLength::Long => "long",
        }
    }

    /// Approximate character budget communicated to the rewrite API.
    pub fn target_chars(&self) -> usize {
        match self {
            TextLength::Short => 1000,
            TextLength::Medium => 2000,
            TextLength::Long => 3000,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(TextLength::Short),
            "medium" => Ok(TextLength::Medium),
            "long" => Ok(TextLength::Long),
            other => Err(KioskoError::Config(format!(
                "unknown text length '{other}' (expected short, medium or long)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in [
            ArticleStatus::Pending,
            ArticleStatus::Published,
            ArticleStatus::Failed,
        ] {
            assert_eq!(ArticleStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(ArticleStatus::parse("gone").is_err());
    }

    #[test]
    fn style_parse_is_case_insensitive() {
        assert_eq!(Style::parse("IRONIC").unwrap(), Style::Ironic);
        assert!(Style::parse("sardonic").is_err());
    }

    #[test]
    fn length_targets() {
        assert_eq!(TextLength::parse("short").unwrap().target_chars(), 1000);
        assert_eq!(TextLength::parse("medium").unwrap().target_chars(), 2000);
        assert_eq!(TextLength::parse("long").unwrap().target_chars(), 3000);
    }

    #[test]
    fn fetched_article_validation() {
        let ok = FetchedArticle {
            url: "http://example.com/a".into(),
            title: "Title".into(),
            text: "x".repeat(200),
            author: None,
        };
        assert!(ok.is_valid());

        let short = FetchedArticle { text: "too short".into(), ..ok.clone() };
        assert!(!short.is_valid());

        let untitled = FetchedArticle { title: "  ".into(), ..ok };
        assert!(!untitled.is_valid());
    }
}
