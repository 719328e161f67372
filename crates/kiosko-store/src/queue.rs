//! Publication queue operations.
//!
//! Slot occupancy is decided by exact equality on `scheduled_time`, so
//! every write goes through [`NewsStore`] helpers that format timestamps
//! with one shared second-precision layout.

use chrono::NaiveDateTime;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use kiosko_core::error::{KioskoError, Result};
use kiosko_core::types::{
    ArticleRecord, ArticleStatus, EnqueueOutcome, PendingPreview, QueueSummary,
};

use crate::{NewsStore, TIME_FMT};

/// Fields of a not-yet-stored article. Borrowed so the ingestion
/// pipeline can enqueue without cloning the article body.
#[derive(Debug, Clone, Copy)]
pub struct NewArticle<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub original_text: &'a str,
    pub processed_text: &'a str,
    pub is_urgent: bool,
}

fn fmt_time(t: NaiveDateTime) -> String {
    t.format(TIME_FMT).to_string()
}

fn parse_time(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIME_FMT)
        .map_err(|e| KioskoError::Store(format!("bad timestamp '{s}': {e}")))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArticleRecord> {
    let scheduled: String = row.get("scheduled_time")?;
    let status: String = row.get("status")?;
    let created: String = row.get("created_at")?;
    let published: Option<String> = row.get("published_at")?;
    let bad = |e: KioskoError| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    };
    Ok(ArticleRecord {
        id: row.get("id")?,
        url: row.get("url")?,
        title: row.get("title")?,
        original_text: row.get("original_text")?,
        processed_text: row.get("processed_text")?,
        scheduled_time: parse_time(&scheduled).map_err(bad)?,
        status: ArticleStatus::parse(&status).map_err(bad)?,
        is_urgent: row.get::<_, i64>("is_urgent")? != 0,
        created_at: parse_time(&created).map_err(bad)?,
        published_at: match published {
            Some(p) => Some(parse_time(&p).map_err(bad)?),
            None => None,
        },
    })
}

const SELECT_COLS: &str = "id, url, title, original_text, processed_text, \
                           scheduled_time, status, is_urgent, created_at, published_at";

impl NewsStore {
    /// Insert an article at a fixed slot. Returns [`EnqueueOutcome::Duplicate`]
    /// when the URL is already queued in any status.
    pub fn enqueue(
        &self,
        article: &NewArticle<'_>,
        slot: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<EnqueueOutcome> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO news_queue
                 (url, title, original_text, processed_text, scheduled_time,
                  status, is_urgent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7)",
            params![
                article.url,
                article.title,
                article.original_text,
                article.processed_text,
                fmt_time(slot),
                article.is_urgent as i64,
                fmt_time(now),
            ],
        );
        match inserted {
            Ok(_) => Ok(EnqueueOutcome::Queued(conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => {
                debug!(url = article.url, "already queued, skipping");
                Ok(EnqueueOutcome::Duplicate)
            }
            Err(e) => Err(KioskoError::Store(format!("enqueue: {e}"))),
        }
    }

    /// Insert an article at the first candidate slot with no pending
    /// occupant, falling back to the last candidate when every slot is
    /// taken. The occupancy probe and the insert run in one immediate
    /// transaction, so two concurrent ingests cannot both claim the
    /// same free slot.
    pub fn enqueue_at_first_free(
        &self,
        article: &NewArticle<'_>,
        candidates: &[NaiveDateTime],
        now: NaiveDateTime,
    ) -> Result<(EnqueueOutcome, NaiveDateTime)> {
        let last = *candidates
            .last()
            .ok_or_else(|| KioskoError::Store("empty slot candidate list".into()))?;
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| KioskoError::Store(format!("begin enqueue: {e}")))?;

        let mut chosen = last;
        {
            let mut stmt = tx
                .prepare(
                    "SELECT COUNT(*) FROM news_queue
                      WHERE scheduled_time = ?1 AND status = 'pending'",
                )
                .map_err(|e| KioskoError::Store(format!("probe slots: {e}")))?;
            for &slot in candidates {
                let occupied: i64 = stmt
                    .query_row(params![fmt_time(slot)], |r| r.get(0))
                    .map_err(|e| KioskoError::Store(format!("probe slots: {e}")))?;
                if occupied == 0 {
                    chosen = slot;
                    break;
                }
            }
        }

        let inserted = tx.execute(
            "INSERT INTO news_queue
                 (url, title, original_text, processed_text, scheduled_time,
                  status, is_urgent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7)",
            params![
                article.url,
                article.title,
                article.original_text,
                article.processed_text,
                fmt_time(chosen),
                article.is_urgent as i64,
                fmt_time(now),
            ],
        );
        let outcome = match inserted {
            Ok(_) => EnqueueOutcome::Queued(tx.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => EnqueueOutcome::Duplicate,
            Err(e) => return Err(KioskoError::Store(format!("enqueue: {e}"))),
        };
        tx.commit()
            .map_err(|e| KioskoError::Store(format!("commit enqueue: {e}")))?;
        Ok((outcome, chosen))
    }

    /// Number of pending articles scheduled exactly at `slot`.
    pub fn count_at_slot(&self, slot: NaiveDateTime) -> Result<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM news_queue
              WHERE scheduled_time = ?1 AND status = 'pending'",
            params![fmt_time(slot)],
            |r| r.get(0),
        )
        .map_err(|e| KioskoError::Store(format!("count slot: {e}")))
    }

    /// Pending articles whose slot has arrived, urgent first, oldest
    /// slot first within each urgency class.
    pub fn due_for_publication(
        &self,
        now: NaiveDateTime,
        limit: usize,
    ) -> Result<Vec<ArticleRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLS} FROM news_queue
                  WHERE status = 'pending' AND scheduled_time <= ?1
                  ORDER BY is_urgent DESC, scheduled_time ASC
                  LIMIT ?2"
            ))
            .map_err(|e| KioskoError::Store(format!("due query: {e}")))?;
        let rows = stmt
            .query_map(params![fmt_time(now), limit as i64], row_to_record)
            .map_err(|e| KioskoError::Store(format!("due query: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| KioskoError::Store(format!("due query: {e}")))
    }

    pub fn get(&self, id: i64) -> Result<Option<ArticleRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM news_queue WHERE id = ?1"),
            params![id],
            row_to_record,
        )
        .optional()
        .map_err(|e| KioskoError::Store(format!("get: {e}")))
    }

    /// Pending articles ordered by slot, for the operator queue view.
    pub fn list_pending(&self, limit: usize) -> Result<Vec<ArticleRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLS} FROM news_queue
                  WHERE status = 'pending'
                  ORDER BY scheduled_time ASC
                  LIMIT ?1"
            ))
            .map_err(|e| KioskoError::Store(format!("list pending: {e}")))?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_record)
            .map_err(|e| KioskoError::Store(format!("list pending: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| KioskoError::Store(format!("list pending: {e}")))
    }

    /// Mark an article published and stamp `published_at`. A no-op on
    /// rows already published, so a retried delivery never rewrites the
    /// original publication time.
    pub fn mark_published(&self, id: i64, now: NaiveDateTime) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE news_queue
                    SET status = 'published', published_at = ?2
                  WHERE id = ?1 AND status <> 'published'",
                params![id, fmt_time(now)],
            )
            .map_err(|e| KioskoError::Store(format!("mark published: {e}")))?;
        Ok(changed > 0)
    }

    /// Mark a pending article failed. Published rows are left alone.
    pub fn mark_failed(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE news_queue SET status = 'failed'
                  WHERE id = ?1 AND status = 'pending'",
                params![id],
            )
            .map_err(|e| KioskoError::Store(format!("mark failed: {e}")))?;
        Ok(changed > 0)
    }

    /// Replace the rewritten body of a queued article.
    pub fn update_processed_text(&self, id: i64, text: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE news_queue SET processed_text = ?2 WHERE id = ?1",
                params![id, text],
            )
            .map_err(|e| KioskoError::Store(format!("update text: {e}")))?;
        Ok(changed > 0)
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM news_queue WHERE id = ?1", params![id])
            .map_err(|e| KioskoError::Store(format!("delete: {e}")))?;
        Ok(changed > 0)
    }

    /// Drop every pending article. Published and failed history stays.
    pub fn clear_pending(&self) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM news_queue WHERE status = 'pending'", [])
            .map_err(|e| KioskoError::Store(format!("clear pending: {e}")))
    }

    /// Remove published rows whose publication time is before `cutoff`.
    pub fn purge_published_before(&self, cutoff: NaiveDateTime) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM news_queue
              WHERE status = 'published' AND published_at < ?1",
            params![fmt_time(cutoff)],
        )
        .map_err(|e| KioskoError::Store(format!("purge published: {e}")))
    }

    /// Aggregate counts plus a short preview of the next pending slots.
    pub fn status_summary(&self, preview: usize) -> Result<QueueSummary> {
        let conn = self.conn()?;
        let mut summary = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'pending'), 0),
                        COALESCE(SUM(status = 'published'), 0),
                        COALESCE(SUM(status = 'failed'), 0),
                        COALESCE(SUM(is_urgent = 1 AND status = 'pending'), 0)
                   FROM news_queue",
                [],
                |r| {
                    Ok(QueueSummary {
                        total: r.get(0)?,
                        pending: r.get(1)?,
                        published: r.get(2)?,
                        failed: r.get(3)?,
                        urgent: r.get(4)?,
                        next: Vec::new(),
                    })
                },
            )
            .map_err(|e| KioskoError::Store(format!("summary: {e}")))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, title, scheduled_time, is_urgent FROM news_queue
                  WHERE status = 'pending'
                  ORDER BY scheduled_time ASC
                  LIMIT ?1",
            )
            .map_err(|e| KioskoError::Store(format!("summary preview: {e}")))?;
        let rows = stmt
            .query_map(params![preview as i64], |row| {
                let scheduled: String = row.get(2)?;
                Ok(PendingPreview {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    scheduled_time: parse_time(&scheduled).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    is_urgent: row.get::<_, i64>(3)? != 0,
                })
            })
            .map_err(|e| KioskoError::Store(format!("summary preview: {e}")))?;
        summary.next = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| KioskoError::Store(format!("summary preview: {e}")))?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::temp_store;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn article(url: &str) -> NewArticle<'_> {
        NewArticle {
            url,
            title: "Title",
            original_text: "original body",
            processed_text: "processed body",
            is_urgent: false,
        }
    }

    #[test]
    fn duplicate_url_is_reported_not_inserted() {
        let (store, _dir) = temp_store("dup");
        let a = article("http://example.com/one");
        let first = store.enqueue(&a, dt(1, 8), dt(1, 7)).unwrap();
        assert!(matches!(first, EnqueueOutcome::Queued(_)));
        let second = store.enqueue(&a, dt(1, 12), dt(1, 7)).unwrap();
        assert_eq!(second, EnqueueOutcome::Duplicate);
        assert_eq!(store.status_summary(0).unwrap().total, 1);
    }

    #[test]
    fn due_orders_urgent_first_then_oldest_slot() {
        let (store, _dir) = temp_store("due");
        store
            .enqueue(&article("http://e.com/a"), dt(1, 8), dt(1, 7))
            .unwrap();
        store
            .enqueue(&article("http://e.com/b"), dt(1, 12), dt(1, 7))
            .unwrap();
        let urgent = NewArticle { is_urgent: true, ..article("http://e.com/c") };
        store.enqueue(&urgent, dt(1, 12), dt(1, 7)).unwrap();

        let due = store.due_for_publication(dt(1, 12), 10).unwrap();
        let urls: Vec<&str> = due.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["http://e.com/c", "http://e.com/a", "http://e.com/b"]);

        // Nothing after the horizon is due.
        store
            .enqueue(&article("http://e.com/d"), dt(1, 16), dt(1, 7))
            .unwrap();
        assert_eq!(store.due_for_publication(dt(1, 12), 10).unwrap().len(), 3);
    }

    #[test]
    fn first_free_slot_skips_occupied_candidates() {
        let (store, _dir) = temp_store("slots");
        let candidates = [dt(1, 8), dt(1, 12), dt(1, 16)];
        store
            .enqueue(&article("http://e.com/a"), dt(1, 8), dt(1, 7))
            .unwrap();

        let (outcome, slot) = store
            .enqueue_at_first_free(&article("http://e.com/b"), &candidates, dt(1, 7))
            .unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Queued(_)));
        assert_eq!(slot, dt(1, 12));
    }

    #[test]
    fn full_horizon_falls_back_to_last_candidate() {
        let (store, _dir) = temp_store("full");
        let candidates = [dt(1, 8), dt(1, 12)];
        store
            .enqueue(&article("http://e.com/a"), dt(1, 8), dt(1, 7))
            .unwrap();
        store
            .enqueue(&article("http://e.com/b"), dt(1, 12), dt(1, 7))
            .unwrap();

        let (_, slot) = store
            .enqueue_at_first_free(&article("http://e.com/c"), &candidates, dt(1, 7))
            .unwrap();
        assert_eq!(slot, dt(1, 12));
        assert_eq!(store.count_at_slot(dt(1, 12)).unwrap(), 2);
    }

    #[test]
    fn published_slot_no_longer_counts_as_occupied() {
        let (store, _dir) = temp_store("freed");
        let candidates = [dt(1, 8), dt(1, 12)];
        let id = match store
            .enqueue(&article("http://e.com/a"), dt(1, 8), dt(1, 7))
            .unwrap()
        {
            EnqueueOutcome::Queued(id) => id,
            other => panic!("unexpected outcome {other:?}"),
        };
        store.mark_published(id, dt(1, 8)).unwrap();

        let (_, slot) = store
            .enqueue_at_first_free(&article("http://e.com/b"), &candidates, dt(1, 9))
            .unwrap();
        assert_eq!(slot, dt(1, 8));
    }

    #[test]
    fn mark_published_is_idempotent() {
        let (store, _dir) = temp_store("pub");
        let id = match store
            .enqueue(&article("http://e.com/a"), dt(1, 8), dt(1, 7))
            .unwrap()
        {
            EnqueueOutcome::Queued(id) => id,
            other => panic!("unexpected outcome {other:?}"),
        };

        assert!(store.mark_published(id, dt(1, 8)).unwrap());
        assert!(!store.mark_published(id, dt(2, 8)).unwrap());
        let rec = store.get(id).unwrap().unwrap();
        assert_eq!(rec.published_at, Some(dt(1, 8)));

        // Terminal for the dispatcher: a published row cannot fail.
        assert!(!store.mark_failed(id).unwrap());
    }

    #[test]
    fn failed_row_can_be_republished_manually() {
        let (store, _dir) = temp_store("retry");
        let id = match store
            .enqueue(&article("http://e.com/a"), dt(1, 8), dt(1, 7))
            .unwrap()
        {
            EnqueueOutcome::Queued(id) => id,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert!(store.mark_failed(id).unwrap());
        assert!(store.mark_published(id, dt(1, 9)).unwrap());
        let rec = store.get(id).unwrap().unwrap();
        assert_eq!(rec.status, ArticleStatus::Published);
    }

    #[test]
    fn clear_pending_keeps_history() {
        let (store, _dir) = temp_store("clear");
        let id = match store
            .enqueue(&article("http://e.com/a"), dt(1, 8), dt(1, 7))
            .unwrap()
        {
            EnqueueOutcome::Queued(id) => id,
            other => panic!("unexpected outcome {other:?}"),
        };
        store.mark_published(id, dt(1, 8)).unwrap();
        store
            .enqueue(&article("http://e.com/b"), dt(1, 12), dt(1, 7))
            .unwrap();

        assert_eq!(store.clear_pending().unwrap(), 1);
        let summary = store.status_summary(5).unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.published, 1);
        assert!(summary.next.is_empty());
    }

    #[test]
    fn purge_removes_only_old_published_rows() {
        let (store, _dir) = temp_store("purge");
        let old = match store
            .enqueue(&article("http://e.com/a"), dt(1, 8), dt(1, 7))
            .unwrap()
        {
            EnqueueOutcome::Queued(id) => id,
            other => panic!("unexpected outcome {other:?}"),
        };
        store.mark_published(old, dt(1, 8)).unwrap();
        let fresh = match store
            .enqueue(&article("http://e.com/b"), dt(10, 8), dt(1, 7))
            .unwrap()
        {
            EnqueueOutcome::Queued(id) => id,
            other => panic!("unexpected outcome {other:?}"),
        };
        store.mark_published(fresh, dt(10, 8)).unwrap();
        store
            .enqueue(&article("http://e.com/c"), dt(1, 12), dt(1, 7))
            .unwrap();

        assert_eq!(store.purge_published_before(dt(9, 0)).unwrap(), 1);
        let summary = store.status_summary(0).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.published, 1);
    }

    #[test]
    fn summary_preview_lists_next_pending() {
        let (store, _dir) = temp_store("preview");
        store
            .enqueue(&article("http://e.com/b"), dt(1, 12), dt(1, 7))
            .unwrap();
        store
            .enqueue(&article("http://e.com/a"), dt(1, 8), dt(1, 7))
            .unwrap();

        let summary = store.status_summary(1).unwrap();
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.next.len(), 1);
        assert_eq!(summary.next[0].scheduled_time, dt(1, 8));
    }
}
