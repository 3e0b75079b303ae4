//! Postgres-backed status and result storage.
//!
//! Status rows are upserted with a stage guard so that concurrent or
//! duplicate writes can never move a row backwards. Results are plain
//! inserts; open ports are stored in their `{80,443}` text form.

use super::{ResultStore, StatusStore, RECENT_HISTORY_LIMIT};
use crate::error::{StoreError, StoreResult};
use crate::models::{HostStatus, JobState, ScanResult, StatusRecord};
use crate::types::{Host, OpenPorts, ScanId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const UPSERT_STATUS: &str = r#"
    INSERT INTO scan_status (scan_id, host, status, stage, started_at, completed_at)
    VALUES ($1, $2, $3, $4,
            CASE WHEN $5 THEN now() END,
            CASE WHEN $6 THEN now() END)
    ON CONFLICT (scan_id, host) DO UPDATE SET
        status = EXCLUDED.status,
        stage = EXCLUDED.stage,
        started_at = COALESCE(scan_status.started_at, EXCLUDED.started_at),
        completed_at = COALESCE(scan_status.completed_at, EXCLUDED.completed_at)
    WHERE scan_status.stage < EXCLUDED.stage
"#;

/// Connection settings for [`PgStore::connect`].
#[derive(Debug, Clone)]
pub struct PgConnectOptions {
    pub max_connections: u32,
    /// Total connection attempts before giving up.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for PgConnectOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            attempts: 10,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Status and result store on a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PgStore {
    /// Connect, retrying while the database comes up, and apply migrations.
    pub async fn connect(url: &str, options: &PgConnectOptions) -> StoreResult<Self> {
        let attempts = options.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match PgPoolOptions::new()
                .max_connections(options.max_connections)
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!(attempt, "Connected to Postgres");
                    let store = Self::from_pool(pool);
                    store.migrate().await?;
                    return Ok(store);
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Waiting for Postgres to be ready");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(options.backoff).await;
                    }
                }
            }
        }

        Err(StoreError::ConnectFailed {
            attempts,
            reason: last_error,
        })
    }

    /// Wrap an existing pool. Migrations are not applied.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    scan_id: Uuid,
    host: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<StatusRow> for StatusRecord {
    type Error = StoreError;

    fn try_from(row: StatusRow) -> Result<Self, Self::Error> {
        Ok(Self {
            scan_id: ScanId::from_uuid(row.scan_id),
            host: Host::new_unchecked(row.host),
            state: row.status.parse().map_err(StoreError::CorruptRow)?,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResultRow {
    scan_id: Uuid,
    host: String,
    scanned_at: DateTime<Utc>,
    open_ports: String,
}

impl TryFrom<ResultRow> for ScanResult {
    type Error = StoreError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        let open_ports: OpenPorts = row
            .open_ports
            .parse()
            .map_err(|e: crate::types::PortError| StoreError::CorruptRow(e.to_string()))?;

        Ok(Self {
            scan_id: ScanId::from_uuid(row.scan_id),
            host: Host::new_unchecked(row.host),
            scanned_at: row.scanned_at,
            open_ports,
        })
    }
}

fn collect_results(rows: Vec<ResultRow>) -> StoreResult<Vec<ScanResult>> {
    rows.into_iter().map(ScanResult::try_from).collect()
}

#[async_trait]
impl StatusStore for PgStore {
    async fn set_status(&self, scan_id: ScanId, host: &Host, state: JobState) -> StoreResult<bool> {
        let outcome = sqlx::query(UPSERT_STATUS)
            .bind(scan_id.as_uuid())
            .bind(host.as_str())
            .bind(state.as_str())
            .bind(state.stage())
            .bind(state == JobState::InProgress)
            .bind(state.is_terminal())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(scan_id = %scan_id, host = %host, state = %state, error = %e, "Failed to update scan_status");
                StoreError::from(e)
            })?;

        Ok(outcome.rows_affected() > 0)
    }

    async fn statuses(&self, scan_id: ScanId) -> StoreResult<Vec<HostStatus>> {
        let rows: Vec<StatusRow> = sqlx::query_as(
            r#"
            SELECT scan_id, host, status, started_at, completed_at
            FROM scan_status
            WHERE scan_id = $1
            ORDER BY host
            "#,
        )
        .bind(scan_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                StatusRecord::try_from(row).map(|record| HostStatus {
                    host: record.host,
                    status: record.state,
                })
            })
            .collect()
    }

    async fn status(&self, scan_id: ScanId, host: &Host) -> StoreResult<Option<StatusRecord>> {
        let row: Option<StatusRow> = sqlx::query_as(
            r#"
            SELECT scan_id, host, status, started_at, completed_at
            FROM scan_status
            WHERE scan_id = $1 AND host = $2
            "#,
        )
        .bind(scan_id.as_uuid())
        .bind(host.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(StatusRecord::try_from).transpose()
    }
}

#[async_trait]
impl ResultStore for PgStore {
    async fn store_result(&self, result: &ScanResult) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scan_results (scan_id, host, scanned_at, open_ports)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(result.scan_id.as_uuid())
        .bind(result.host.as_str())
        .bind(result.scanned_at)
        .bind(result.open_ports.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::duplicate_result(result),
            _ => StoreError::from(e),
        })?;

        Ok(())
    }

    async fn history(&self, host: &Host, scan_id: Option<ScanId>) -> StoreResult<Vec<ScanResult>> {
        let rows: Vec<ResultRow> = match scan_id {
            Some(id) => {
                sqlx::query_as(
                    r#"
                    SELECT scan_id, host, scanned_at, open_ports
                    FROM scan_results
                    WHERE host = $1 AND scan_id = $2
                    ORDER BY scanned_at DESC
                    "#,
                )
                .bind(host.as_str())
                .bind(id.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
            None => return self.latest(host, RECENT_HISTORY_LIMIT).await,
        };

        collect_results(rows)
    }

    async fn latest(&self, host: &Host, limit: usize) -> StoreResult<Vec<ScanResult>> {
        let rows: Vec<ResultRow> = sqlx::query_as(
            r#"
            SELECT scan_id, host, scanned_at, open_ports
            FROM scan_results
            WHERE host = $1
            ORDER BY scanned_at DESC
            LIMIT $2
            "#,
        )
        .bind(host.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        collect_results(rows)
    }
}
