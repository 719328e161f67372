//! Persisted runtime settings.
//!
//! Operator-tunable knobs live in the `bot_config` key/value table and
//! are projected into a [`Settings`] snapshot on load. Config-file
//! defaults fill any key that has never been written.

use chrono::NaiveDateTime;
use rusqlite::{OptionalExtension, params};
use tracing::info;

use kiosko_core::config::SettingsDefaults;
use kiosko_core::error::{KioskoError, Result};
use kiosko_core::settings::{Settings, SharedSettings};

use crate::{NewsStore, TIME_FMT};

impl NewsStore {
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT value FROM bot_config WHERE key = ?1",
            params![key],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| KioskoError::Store(format!("get config: {e}")))
    }

    pub fn set_config(&self, key: &str, value: &str, now: NaiveDateTime) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO bot_config (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            params![key, value, now.format(TIME_FMT).to_string()],
        )
        .map_err(|e| KioskoError::Store(format!("set config: {e}")))?;
        Ok(())
    }

    /// Build a [`Settings`] snapshot from defaults plus every stored
    /// override. A stored value that no longer parses is an error, not
    /// a silent fallback.
    pub fn load_settings(&self, defaults: &SettingsDefaults) -> Result<Settings> {
        let mut settings = Settings::from_defaults(defaults)?;
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM bot_config")
            .map_err(|e| KioskoError::Store(format!("load settings: {e}")))?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
            .map_err(|e| KioskoError::Store(format!("load settings: {e}")))?;
        for row in rows {
            let (key, value) =
                row.map_err(|e| KioskoError::Store(format!("load settings: {e}")))?;
            settings.apply_kv(&key, &value)?;
        }
        Ok(settings)
    }

    /// Write every key of a snapshot back to the database.
    pub fn persist_settings(&self, settings: &Settings, now: NaiveDateTime) -> Result<()> {
        for (key, value) in settings.kv_pairs() {
            self.set_config(key, &value, now)?;
        }
        Ok(())
    }
}

/// Couples the in-memory settings snapshot with its durable backing.
/// Writes validate first, then persist, then swap — readers never see
/// a half-applied update.
#[derive(Clone)]
pub struct SettingsManager {
    store: NewsStore,
    shared: SharedSettings,
    defaults: SettingsDefaults,
}

impl SettingsManager {
    /// Load settings from the store and seed any missing keys so that
    /// operators see the effective values with a plain `SELECT`.
    pub fn load(
        store: NewsStore,
        defaults: SettingsDefaults,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let settings = store.load_settings(&defaults)?;
        store.persist_settings(&settings, now)?;
        Ok(Self {
            store,
            shared: SharedSettings::new(settings),
            defaults,
        })
    }

    pub fn shared(&self) -> SharedSettings {
        self.shared.clone()
    }

    pub fn snapshot(&self) -> std::sync::Arc<Settings> {
        self.shared.snapshot()
    }

    /// Apply one key/value update. The new snapshot is only swapped in
    /// after the value parses and the write lands.
    pub fn set(&self, key: &str, value: &str, now: NaiveDateTime) -> Result<()> {
        let mut next = (*self.shared.snapshot()).clone();
        next.apply_kv(key, value)?;
        self.store.set_config(key, &next.get_kv(key)?, now)?;
        info!(key, value, "⚙️ setting updated");
        self.shared.swap(next);
        Ok(())
    }

    /// Re-read everything from the database, discarding the in-memory
    /// snapshot. Used by the reload command after out-of-band edits.
    pub fn reload(&self) -> Result<()> {
        let settings = self.store.load_settings(&self.defaults)?;
        self.shared.swap(settings);
        Ok(())
    }
}
