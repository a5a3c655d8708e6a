use std::path::Path;

use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{normalize, FeedScheduleEntry};

use super::schema::SCHEMA;

/// Persistent refresh schedule.
///
/// All access goes through one `tokio_rusqlite::Connection`, which runs every
/// call on a dedicated thread, so request handlers and the refresh scheduler
/// can share a clone of this handle. Every method issues a single statement.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
    created: bool,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let created = !Path::new(db_path).exists();
        let conn = Connection::open(db_path).await?;
        Self::init(conn, created).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, true).await
    }

    async fn init(conn: Connection, created: bool) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, created })
    }

    /// True when the database file did not exist before this handle opened it.
    pub fn is_new(&self) -> bool {
        self.created
    }

    /// Record a successful on-demand request: creates the row or moves both
    /// timestamps of an existing one.
    pub async fn record_request(
        &self,
        display_id: &str,
        requested_at: i64,
        next_eligible_at: i64,
    ) -> Result<()> {
        let normalized_id = normalize(display_id);
        let display_id = display_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO feed_schedule (normalized_id, display_id, last_requested_at, next_eligible_at)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(normalized_id) DO UPDATE SET
                           display_id = excluded.display_id,
                           last_requested_at = excluded.last_requested_at,
                           next_eligible_at = excluded.next_eligible_at"#,
                    params![normalized_id, display_id, requested_at, next_eligible_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Seed an entry from a subscription list. New rows keep the default
    /// `next_eligible_at`, so they are due immediately.
    pub async fn seed(&self, display_id: &str, requested_at: i64) -> Result<()> {
        let normalized_id = normalize(display_id);
        let display_id = display_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO feed_schedule (normalized_id, display_id, last_requested_at)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(normalized_id) DO UPDATE SET
                           display_id = excluded.display_id,
                           last_requested_at = excluded.last_requested_at"#,
                    params![normalized_id, display_id, requested_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// The most overdue entry requested no earlier than `requested_since`.
    pub async fn next_due(
        &self,
        now: i64,
        requested_since: i64,
    ) -> Result<Option<FeedScheduleEntry>> {
        let entry = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT normalized_id, display_id, last_requested_at, next_eligible_at
                       FROM feed_schedule
                       WHERE last_requested_at >= ?1 AND next_eligible_at <= ?2
                       ORDER BY next_eligible_at ASC
                       LIMIT 1"#,
                )?;
                let entry = stmt
                    .query_row(params![requested_since, now], entry_from_row)
                    .optional()?;
                Ok(entry)
            })
            .await?;
        Ok(entry)
    }

    /// Push `next_eligible_at` out to at least `next_eligible_at`. A request
    /// recorded while the refresh was in flight keeps its later value.
    pub async fn reschedule(&self, normalized_id: &str, next_eligible_at: i64) -> Result<()> {
        let normalized_id = normalized_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feed_schedule SET next_eligible_at = MAX(next_eligible_at, ?1) WHERE normalized_id = ?2",
                    params![next_eligible_at, normalized_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn get(&self, id: &str) -> Result<Option<FeedScheduleEntry>> {
        let normalized_id = normalize(id);
        let entry = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT normalized_id, display_id, last_requested_at, next_eligible_at
                       FROM feed_schedule WHERE normalized_id = ?1"#,
                )?;
                let entry = stmt
                    .query_row(params![normalized_id], entry_from_row)
                    .optional()?;
                Ok(entry)
            })
            .await?;
        Ok(entry)
    }

    #[cfg(test)]
    pub async fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM feed_schedule", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    #[cfg(test)]
    pub async fn execute_batch(&self, sql: &'static str) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

fn entry_from_row(row: &Row) -> rusqlite::Result<FeedScheduleEntry> {
    Ok(FeedScheduleEntry {
        normalized_id: row.get(0)?,
        display_id: row.get(1)?,
        last_requested_at: row.get(2)?,
        next_eligible_at: row.get(3)?,
    })
}
