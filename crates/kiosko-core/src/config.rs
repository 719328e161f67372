//! kiosko startup configuration.
//!
//! Loaded once from TOML (with serde-level defaults), then overridden by
//! environment variables for secrets. Validation of the required fields is
//! the only fatal error path in the whole process: a bot with no token or
//! no channels refuses to start.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KioskoError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskoConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub rewrite: RewriteConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub defaults: SettingsDefaults,
    /// IANA zone all slot arithmetic happens in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "Europe/Madrid".into()
}

impl Default for KioskoConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            rewrite: RewriteConfig::default(),
            store: StoreConfig::default(),
            defaults: SettingsDefaults::default(),
            timezone: default_timezone(),
        }
    }
}

impl KioskoConfig {
    /// Load from the default path (~/.kiosko/config.toml), falling back to
    /// pure defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() { Self::load_from(&path)? } else { Self::default() };
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KioskoError::Config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| KioskoError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| KioskoError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kiosko")
    }

    /// Environment variables override file values for secrets and channel
    /// identifiers, so deployments can keep the TOML checked in.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("KIOSKO_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Ok(v) = std::env::var("KIOSKO_SOURCE_CHANNEL") {
            self.telegram.source_channel = v;
        }
        if let Ok(v) = std::env::var("KIOSKO_TARGET_CHANNEL") {
            self.telegram.target_channel = v;
        }
        if let Ok(v) = std::env::var("KIOSKO_ADMIN_USER_ID") {
            self.telegram.admin_user_id = v.parse().ok();
        }
        if let Ok(v) = std::env::var("KIOSKO_REWRITE_API_KEY") {
            self.rewrite.api_key = v;
        }
        if let Ok(v) = std::env::var("KIOSKO_DATABASE_PATH") {
            self.store.path = v;
        }
    }

    /// Startup validation. Collects every missing required value so the
    /// operator sees them all at once.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.telegram.bot_token.is_empty() {
            missing.push("telegram.bot_token (KIOSKO_BOT_TOKEN)");
        }
        if self.telegram.source_channel.is_empty() {
            missing.push("telegram.source_channel (KIOSKO_SOURCE_CHANNEL)");
        }
        if self.telegram.target_channel.is_empty() {
            missing.push("telegram.target_channel (KIOSKO_TARGET_CHANNEL)");
        }
        if self.rewrite.api_key.is_empty() {
            missing.push("rewrite.api_key (KIOSKO_REWRITE_API_KEY)");
        }
        if !missing.is_empty() {
            return Err(KioskoError::Config(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        }
        crate::clock::Clock::from_name(&self.timezone)?;
        crate::settings::parse_hours(&self.defaults.publish_hours)?;
        Ok(())
    }
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Channel the bot watches for links ("@handle" or numeric id).
    #[serde(default)]
    pub source_channel: String,
    /// Channel rewritten articles are posted to.
    #[serde(default)]
    pub target_channel: String,
    /// When set, mutating operator commands are restricted to this user.
    #[serde(default)]
    pub admin_user_id: Option<i64>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    1
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            source_channel: String::new(),
            target_channel: String::new(),
            admin_user_id: None,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Rewrite API configuration (any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_rewrite_base_url")]
    pub base_url: String,
    #[serde(default = "default_rewrite_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_rewrite_timeout")]
    pub timeout_secs: u64,
}

fn default_rewrite_base_url() -> String {
    "https://api.deepseek.com/v1".into()
}
fn default_rewrite_model() -> String {
    "deepseek-chat".into()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_temperature() -> f32 {
    0.8
}
fn default_rewrite_timeout() -> u64 {
    60
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_rewrite_base_url(),
            model: default_rewrite_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_rewrite_timeout(),
        }
    }
}

/// Queue store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Upper bound of the connection pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Published records older than this many days are swept.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_store_path() -> String {
    "~/.kiosko/queue.db".into()
}
fn default_max_connections() -> u32 {
    10
}
fn default_retention_days() -> u32 {
    7
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            max_connections: default_max_connections(),
            retention_days: default_retention_days(),
        }
    }
}

/// Fallback values for the runtime settings when the key-value store has
/// no persisted entry yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsDefaults {
    #[serde(default = "default_publish_hours")]
    pub publish_hours: String,
    #[serde(default = "default_urgent_keywords")]
    pub urgent_keywords: String,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_text_length")]
    pub text_length: String,
    #[serde(default = "default_max_articles")]
    pub max_articles_per_run: usize,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_publish_hours() -> String {
    "8,12,16,20".into()
}
fn default_urgent_keywords() -> String {
    "молния,breaking".into()
}
fn default_style() -> String {
    "informative".into()
}
fn default_text_length() -> String {
    "medium".into()
}
fn default_max_articles() -> usize {
    5
}
fn default_check_interval() -> u64 {
    60
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        Self {
            publish_hours: default_publish_hours(),
            urgent_keywords: default_urgent_keywords(),
            style: default_style(),
            text_length: default_text_length(),
            max_articles_per_run: default_max_articles(),
            check_interval_secs: default_check_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = KioskoConfig::default();
        assert_eq!(config.timezone, "Europe/Madrid");
        assert_eq!(config.store.max_connections, 10);
        assert_eq!(config.store.retention_days, 7);
        assert_eq!(config.defaults.publish_hours, "8,12,16,20");
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
            timezone = "Europe/Berlin"

            [telegram]
            bot_token = "123:abc"
            source_channel = "@wire"
            target_channel = "@out"

            [defaults]
            publish_hours = "9,18"
        "#;
        let config: KioskoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.timezone, "Europe/Berlin");
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.defaults.publish_hours, "9,18");
        // Untouched sections keep their defaults
        assert_eq!(config.rewrite.model, "deepseek-chat");
    }

    #[test]
    fn validate_reports_all_missing_fields() {
        let config = KioskoConfig::default();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("bot_token"));
        assert!(err.contains("source_channel"));
        assert!(err.contains("target_channel"));
        assert!(err.contains("api_key"));
    }

    #[test]
    fn validate_accepts_complete_config() {
        let mut config = KioskoConfig::default();
        config.telegram.bot_token = "t".into();
        config.telegram.source_channel = "@a".into();
        config.telegram.target_channel = "@b".into();
        config.rewrite.api_key = "k".into();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_timezone_or_schedule() {
        let mut config = KioskoConfig::default();
        config.telegram.bot_token = "t".into();
        config.telegram.source_channel = "@a".into();
        config.telegram.target_channel = "@b".into();
        config.rewrite.api_key = "k".into();

        config.timezone = "Nowhere/Void".into();
        assert!(config.validate().is_err());

        config.timezone = "Europe/Madrid".into();
        config.defaults.publish_hours = "".into();
        assert!(config.validate().is_err());
    }
}
