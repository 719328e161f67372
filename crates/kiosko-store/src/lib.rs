//! # kiosko-store
//!
//! Durable state for the publication queue and the runtime settings,
//! backed by SQLite behind a bounded connection pool. Every write is a
//! single short transaction; the pool keeps a slow caller elsewhere in
//! the process from starving queue reads.

pub mod queue;
pub mod settings;

use std::path::Path;

use r2d2_sqlite::SqliteConnectionManager;

use kiosko_core::error::{KioskoError, Result};

pub use queue::NewArticle;
pub use settings::SettingsManager;

const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

type Pool = r2d2::Pool<SqliteConnectionManager>;
type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Handle to the kiosko database. Cheap to clone — clones share the pool.
#[derive(Clone)]
pub struct NewsStore {
    pool: Pool,
}

impl NewsStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path, max_connections: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )
        });
        let pool = r2d2::Pool::builder()
            .max_size(max_connections.max(1))
            .build(manager)
            .map_err(|e| KioskoError::Store(format!("pool init: {e}")))?;
        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConn> {
        self.pool
            .get()
            .map_err(|e| KioskoError::Store(format!("connection checkout: {e}")))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            -- Publication queue, one row per distinct source URL
            CREATE TABLE IF NOT EXISTS news_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT UNIQUE NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                original_text TEXT NOT NULL DEFAULT '',
                processed_text TEXT NOT NULL DEFAULT '',
                scheduled_time TEXT NOT NULL,     -- civil local time, second precision
                status TEXT NOT NULL DEFAULT 'pending',
                is_urgent INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                published_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_status ON news_queue(status);
            CREATE INDEX IF NOT EXISTS idx_scheduled_time ON news_queue(scheduled_time);
            CREATE INDEX IF NOT EXISTS idx_is_urgent ON news_queue(is_urgent);
            CREATE INDEX IF NOT EXISTS idx_status_scheduled ON news_queue(status, scheduled_time);

            -- Runtime settings, written through by operator commands
            CREATE TABLE IF NOT EXISTS bot_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| KioskoError::Store(format!("migration: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Fresh store in a unique temp directory.
    pub fn temp_store(tag: &str) -> (NewsStore, std::path::PathBuf) {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("kiosko-store-{tag}-{nonce}"));
        std::fs::create_dir_all(&dir).ok();
        let store = NewsStore::open(&dir.join("test.db"), 4).unwrap();
        (store, dir)
    }
}
