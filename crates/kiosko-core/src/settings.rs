//! Runtime-mutable settings.
//!
//! Unlike [`crate::config::KioskoConfig`] (read once at startup), these
//! values can be changed by operator commands while the bot runs. They are
//! persisted in the store's key-value table and cached in-process as an
//! immutable snapshot; updates replace the whole snapshot at once so no
//! reader ever observes a half-applied change.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::SettingsDefaults;
use crate::error::{KioskoError, Result};
use crate::types::{Style, TextLength};

pub const KEY_PUBLISH_HOURS: &str = "publish_hours";
pub const KEY_URGENT_KEYWORDS: &str = "urgent_keywords";
pub const KEY_ARTICLE_STYLE: &str = "article_style";
pub const KEY_TEXT_LENGTH: &str = "text_length";
pub const KEY_MAX_ARTICLES: &str = "max_articles_per_run";
pub const KEY_CHECK_INTERVAL: &str = "check_interval_secs";

pub const ALL_KEYS: [&str; 6] = [
    KEY_PUBLISH_HOURS,
    KEY_URGENT_KEYWORDS,
    KEY_ARTICLE_STYLE,
    KEY_TEXT_LENGTH,
    KEY_MAX_ARTICLES,
    KEY_CHECK_INTERVAL,
];

/// One immutable settings snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Publication hours of day, sorted ascending, deduplicated, non-empty.
    pub publish_hours: Vec<u32>,
    /// Lowercased keywords that mark an article urgent.
    pub urgent_keywords: Vec<String>,
    pub style: Style,
    pub text_length: TextLength,
    /// Cap on URLs processed from a single channel post.
    pub max_articles_per_run: usize,
    /// Listener/dispatcher housekeeping interval.
    pub check_interval_secs: u64,
}

impl Settings {
    pub fn from_defaults(d: &SettingsDefaults) -> Result<Self> {
        Ok(Self {
            publish_hours: parse_hours(&d.publish_hours)?,
            urgent_keywords: parse_keywords(&d.urgent_keywords),
            style: Style::parse(&d.style)?,
            text_length: TextLength::parse(&d.text_length)?,
            max_articles_per_run: d.max_articles_per_run,
            check_interval_secs: d.check_interval_secs,
        })
    }

    /// Apply one persisted key-value pair onto this snapshot.
    /// Rejects unknown keys and invalid values; never half-applies.
    pub fn apply_kv(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            KEY_PUBLISH_HOURS => self.publish_hours = parse_hours(value)?,
            KEY_URGENT_KEYWORDS => self.urgent_keywords = parse_keywords(value),
            KEY_ARTICLE_STYLE => self.style = Style::parse(value)?,
            KEY_TEXT_LENGTH => self.text_length = TextLength::parse(value)?,
            KEY_MAX_ARTICLES => {
                self.max_articles_per_run = value
                    .trim()
                    .parse()
                    .map_err(|_| KioskoError::Config(format!("invalid {KEY_MAX_ARTICLES}: '{value}'")))?;
            }
            KEY_CHECK_INTERVAL => {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .map_err(|_| KioskoError::Config(format!("invalid {KEY_CHECK_INTERVAL}: '{value}'")))?;
                if secs == 0 {
                    return Err(KioskoError::Config("check interval must be positive".into()));
                }
                self.check_interval_secs = secs;
            }
            other => {
                return Err(KioskoError::Config(format!("unknown config key '{other}'")));
            }
        }
        Ok(())
    }

    /// Read one setting in its persisted string form.
    pub fn get_kv(&self, key: &str) -> Result<String> {
        let value = match key {
            KEY_PUBLISH_HOURS => fmt_hours(&self.publish_hours),
            KEY_URGENT_KEYWORDS => self.urgent_keywords.join(","),
            KEY_ARTICLE_STYLE => self.style.as_str().to_string(),
            KEY_TEXT_LENGTH => self.text_length.as_str().to_string(),
            KEY_MAX_ARTICLES => self.max_articles_per_run.to_string(),
            KEY_CHECK_INTERVAL => self.check_interval_secs.to_string(),
            other => {
                return Err(KioskoError::Config(format!("unknown config key '{other}'")));
            }
        };
        Ok(value)
    }

    /// All settings as persistable key-value pairs.
    pub fn kv_pairs(&self) -> Vec<(&'static str, String)> {
        ALL_KEYS
            .iter()
            .map(|k| (*k, self.get_kv(k).unwrap_or_default()))
            .collect()
    }
}

/// Parse "8,12,16,20" into sorted unique hours. An empty or out-of-range
/// schedule is a configuration error — the allocator never sees one.
pub fn parse_hours(s: &str) -> Result<Vec<u32>> {
    let mut hours = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let h: u32 = part
            .parse()
            .map_err(|_| KioskoError::Config(format!("invalid publish hour '{part}'")))?;
        if h > 23 {
            return Err(KioskoError::Config(format!("publish hour {h} out of range 0-23")));
        }
        hours.push(h);
    }
    hours.sort_unstable();
    hours.dedup();
    if hours.is_empty() {
        return Err(KioskoError::Config("publish schedule must list at least one hour".into()));
    }
    Ok(hours)
}

pub fn parse_keywords(s: &str) -> Vec<String> {
    s.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn fmt_hours(hours: &[u32]) -> String {
    hours
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Process-wide handle to the current snapshot. Cloning is cheap; readers
/// call [`SharedSettings::snapshot`] and keep the `Arc` for the duration
/// of one operation.
#[derive(Clone)]
pub struct SharedSettings {
    inner: Arc<RwLock<Arc<Settings>>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self { inner: Arc::new(RwLock::new(Arc::new(settings))) }
    }

    pub fn snapshot(&self) -> Arc<Settings> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the whole snapshot.
    pub fn swap(&self, settings: Settings) {
        let next = Arc::new(settings);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        Settings::from_defaults(&SettingsDefaults::default()).unwrap()
    }

    #[test]
    fn default_schedule_parses() {
        let s = base();
        assert_eq!(s.publish_hours, vec![8, 12, 16, 20]);
        assert_eq!(s.style, Style::Informative);
        assert_eq!(s.text_length, TextLength::Medium);
    }

    #[test]
    fn hours_are_sorted_and_deduped() {
        assert_eq!(parse_hours("20, 8, 8, 12").unwrap(), vec![8, 12, 20]);
    }

    #[test]
    fn empty_schedule_is_rejected() {
        assert!(parse_hours("").is_err());
        assert!(parse_hours(" , ,").is_err());
        assert!(parse_hours("25").is_err());
    }

    #[test]
    fn keywords_are_lowercased() {
        assert_eq!(parse_keywords("Молния, BREAKING"), vec!["молния", "breaking"]);
    }

    #[test]
    fn apply_kv_round_trips() {
        let mut s = base();
        s.apply_kv(KEY_ARTICLE_STYLE, "ironic").unwrap();
        assert_eq!(s.style, Style::Ironic);
        assert_eq!(s.get_kv(KEY_ARTICLE_STYLE).unwrap(), "ironic");

        s.apply_kv(KEY_PUBLISH_HOURS, "9,21").unwrap();
        assert_eq!(s.get_kv(KEY_PUBLISH_HOURS).unwrap(), "9,21");

        assert!(s.apply_kv("no_such_key", "1").is_err());
        assert!(s.apply_kv(KEY_CHECK_INTERVAL, "0").is_err());
    }

    #[test]
    fn shared_swap_is_whole_snapshot() {
        let shared = SharedSettings::new(base());
        let before = shared.snapshot();

        let mut next = base();
        next.apply_kv(KEY_PUBLISH_HOURS, "6").unwrap();
        next.apply_kv(KEY_ARTICLE_STYLE, "mocking").unwrap();
        shared.swap(next);

        let after = shared.snapshot();
        assert_eq!(before.publish_hours, vec![8, 12, 16, 20]);
        assert_eq!(after.publish_hours, vec![6]);
        assert_eq!(after.style, Style::Mocking);
    }
}
