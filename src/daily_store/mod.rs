// SQLite daily rollups: one row per local calendar date holding the first and
// last counter snapshot seen that day. Net daily traffic is `last - first`.
//
// Traffic before the first sample this process takes on a given date is not
// counted; the rollup only sees what the agent observed.

use crate::models::{CounterSample, DailyRollup, DailyTraffic};
use chrono::{Days, Local, NaiveDate};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("daily store I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("daily store database: {0}")]
    Database(#[from] sqlx::Error),
}

/// Which path `record_sample` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First sample of the date; it is both the first and last snapshot.
    Created,
    /// Last-seen counters and timestamp moved forward.
    Updated,
}

pub struct DailyStore {
    pool: SqlitePool,
}

impl DailyStore {
    /// Connect to SQLite at `path`, creating the parent dir and DB if missing (WAL + busy timeout).
    pub async fn connect(path: &str, max_pool_size: u32) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size.max(1))
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_traffic (
                date TEXT PRIMARY KEY,
                first_bytes_recv INTEGER NOT NULL,
                first_bytes_sent INTEGER NOT NULL,
                last_bytes_recv INTEGER NOT NULL,
                last_bytes_sent INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert the first row of the sample's local date, or move its last-seen
    /// counters forward. Existence check and write share one transaction; the
    /// primary key rejects a racing second insert for the same date.
    #[instrument(skip(self, sample), fields(repo = "daily", operation = "record_sample"))]
    pub async fn record_sample(&self, sample: &CounterSample) -> Result<RecordOutcome, StoreError> {
        let date = local_date_key(sample);
        let recv = counter_to_i64(sample.bytes_recv);
        let sent = counter_to_i64(sample.bytes_sent);
        let ts = sample.captured_at.timestamp();

        let mut tx = self.pool.begin().await?;
        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM daily_traffic WHERE date = $1")
                .bind(&date)
                .fetch_one(&mut *tx)
                .await?;

        let outcome = if existing == 0 {
            sqlx::query(
                "INSERT INTO daily_traffic (date, first_bytes_recv, first_bytes_sent, last_bytes_recv, last_bytes_sent, timestamp)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&date)
            .bind(recv)
            .bind(sent)
            .bind(recv)
            .bind(sent)
            .bind(ts)
            .execute(&mut *tx)
            .await?;
            RecordOutcome::Created
        } else {
            sqlx::query(
                "UPDATE daily_traffic SET last_bytes_recv = $1, last_bytes_sent = $2, timestamp = $3 WHERE date = $4",
            )
            .bind(recv)
            .bind(sent)
            .bind(ts)
            .bind(&date)
            .execute(&mut *tx)
            .await?;
            RecordOutcome::Updated
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Net traffic for dates within the last `days` days (today included), most recent first.
    pub async fn query_recent_days(&self, days: u32) -> Result<Vec<DailyTraffic>, StoreError> {
        self.query_recent_days_from(Local::now().date_naive(), days)
            .await
    }

    /// As [`query_recent_days`](Self::query_recent_days) with an explicit "today".
    /// Dates without a row are absent; callers must not expect a dense result.
    #[instrument(skip(self), fields(repo = "daily", operation = "query_recent_days"))]
    pub async fn query_recent_days_from(
        &self,
        today: NaiveDate,
        days: u32,
    ) -> Result<Vec<DailyTraffic>, StoreError> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let from = window_start(today, days);
        let rows = sqlx::query(
            "SELECT date, last_bytes_recv - first_bytes_recv AS down_bytes, last_bytes_sent - first_bytes_sent AS up_bytes
             FROM daily_traffic WHERE date >= $1 ORDER BY date DESC",
        )
        .bind(from.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(DailyTraffic {
                date: row.try_get("date")?,
                down_bytes: row.try_get("down_bytes")?,
                up_bytes: row.try_get("up_bytes")?,
            });
        }
        Ok(out)
    }

    pub async fn get_rollup(&self, date: NaiveDate) -> Result<Option<DailyRollup>, StoreError> {
        let row = sqlx::query(
            "SELECT date, first_bytes_recv, first_bytes_sent, last_bytes_recv, last_bytes_sent, timestamp
             FROM daily_traffic WHERE date = $1",
        )
        .bind(date.format(DATE_FORMAT).to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::parse_rollup_row(&r)).transpose()
    }

    /// Every stored row, most recent first.
    pub async fn all_rollups(&self) -> Result<Vec<DailyRollup>, StoreError> {
        let rows = sqlx::query(
            "SELECT date, first_bytes_recv, first_bytes_sent, last_bytes_recv, last_bytes_sent, timestamp
             FROM daily_traffic ORDER BY date DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_rollup_row).collect()
    }

    /// Delete rows older than the `retention_days` window ending at `today`.
    #[instrument(skip(self), fields(repo = "daily", operation = "prune_older_than"))]
    pub async fn prune_older_than(
        &self,
        today: NaiveDate,
        retention_days: u32,
    ) -> Result<u64, StoreError> {
        let cutoff = window_start(today, retention_days.max(1));
        let r = sqlx::query("DELETE FROM daily_traffic WHERE date < $1")
            .bind(cutoff.format(DATE_FORMAT).to_string())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Reclaim space after deletes.
    #[instrument(skip(self), fields(repo = "daily", operation = "vacuum"))]
    pub async fn vacuum(&self) -> Result<(), StoreError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool; later calls fail with a store error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn parse_rollup_row(row: &sqlx::sqlite::SqliteRow) -> Result<DailyRollup, StoreError> {
        Ok(DailyRollup {
            date: row.try_get("date")?,
            first_bytes_recv: row.try_get("first_bytes_recv")?,
            first_bytes_sent: row.try_get("first_bytes_sent")?,
            last_bytes_recv: row.try_get("last_bytes_recv")?,
            last_bytes_sent: row.try_get("last_bytes_sent")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

/// `YYYY-MM-DD` of the sample's capture time in local time.
pub fn local_date_key(sample: &CounterSample) -> String {
    sample
        .captured_at
        .with_timezone(&Local)
        .format(DATE_FORMAT)
        .to_string()
}

/// First date of a `days`-long window that ends at `today`.
fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// SQLite integers are signed; counters past i64::MAX are clamped.
fn counter_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
