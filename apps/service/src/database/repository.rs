use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Row, params};

use super::models::{MonitoredUrl, datetime_to_millis, millis_to_datetime};
use crate::monitoring::types::{ProbeResult, Target};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Database trait for abstracting the storage collaborator
#[async_trait]
pub trait Database: Send + Sync {
    /// Append a probe result to the history
    async fn persist_result(&self, result: &ProbeResult) -> Result<i64>;

    /// Insert a target, or update its interval if the URL is already stored
    async fn persist_target(&self, url: &str, interval: u64) -> Result<()>;

    /// Delete a target. Returns whether it existed.
    async fn delete_target(&self, url: &str) -> Result<bool>;

    /// All stored targets, used once at startup to seed the registry
    async fn load_all_targets(&self) -> Result<Vec<Target>>;

    /// Most recent results first, optionally for a single URL
    async fn load_results(&self, url: Option<&str>, limit: usize) -> Result<Vec<ProbeResult>>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    async fn load_monitored_urls(&self) -> Result<Vec<MonitoredUrl>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id, url, interval_seconds, created_at FROM monitored_urls ORDER BY id", ())
            .await?;

        let mut urls = Vec::new();
        while let Some(row) = rows.next().await? {
            urls.push(MonitoredUrl {
                id: Some(row.get(0)?),
                url: row.get(1)?,
                interval_seconds: row.get::<i64>(2)?.max(0) as u64,
                created_at: millis_to_datetime(row.get(3)?),
            });
        }

        Ok(urls)
    }
}

fn result_from_row(row: &Row) -> Result<ProbeResult> {
    Ok(ProbeResult {
        url: row.get(0)?,
        status_code: u16::try_from(row.get::<i64>(1)?).unwrap_or_default(),
        response_time: row.get::<i64>(2)?.max(0) as u64,
        is_up: row.get::<i64>(3)? != 0,
        checked_at: millis_to_datetime(row.get(4)?),
        check_id: row.get::<i64>(5)?.max(0) as u64,
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn persist_result(&self, result: &ProbeResult) -> Result<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO monitoring_results (url, status_code, response_time, is_up, checked_at, check_id) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                result.url.clone(),
                i64::from(result.status_code),
                result.response_time as i64,
                if result.is_up { 1 } else { 0 },
                datetime_to_millis(result.checked_at),
                result.check_id as i64
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn persist_target(&self, url: &str, interval: u64) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO monitored_urls (url, interval_seconds, created_at) VALUES (?, ?, ?)
             ON CONFLICT(url) DO UPDATE SET interval_seconds = excluded.interval_seconds",
            params![url.to_owned(), interval as i64, datetime_to_millis(Utc::now())],
        )
        .await?;
        Ok(())
    }

    async fn delete_target(&self, url: &str) -> Result<bool> {
        let conn = self.get_conn().await?;

        let deleted = conn
            .execute("DELETE FROM monitored_urls WHERE url = ?", params![url.to_owned()])
            .await?;
        Ok(deleted > 0)
    }

    async fn load_all_targets(&self) -> Result<Vec<Target>> {
        Ok(self
            .load_monitored_urls()
            .await?
            .into_iter()
            .map(MonitoredUrl::into_target)
            .collect())
    }

    async fn load_results(&self, url: Option<&str>, limit: usize) -> Result<Vec<ProbeResult>> {
        let conn = self.get_conn().await?;
        let limit = limit as i64;

        let mut rows = match url {
            Some(url) => {
                conn.query(
                    "SELECT url, status_code, response_time, is_up, checked_at, check_id FROM monitoring_results WHERE url = ? ORDER BY checked_at DESC, id DESC LIMIT ?",
                    params![url.to_owned(), limit],
                )
                .await?
            }
            None => {
                conn.query(
                    "SELECT url, status_code, response_time, is_up, checked_at, check_id FROM monitoring_results ORDER BY checked_at DESC, id DESC LIMIT ?",
                    params![limit],
                )
                .await?
            }
        };

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(result_from_row(&row)?);
        }

        Ok(results)
    }
}
