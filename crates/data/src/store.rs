//! Trade store trait and the Postgres-backed implementation.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;

use crate::models::{LocalOrderRecord, OrderChanges};

/// Read/write access to the local order ledger.
///
/// The reconciliation core consumes this trait; it never issues SQL itself.
#[async_trait]
pub trait LocalTradeStore: Send + Sync {
    /// All orders entered on or after `since` (the active reconciliation window).
    async fn trades_in_window(&self, since: NaiveDate) -> Result<Vec<LocalOrderRecord>>;

    /// Filled orders with no recorded exit.
    async fn open_positions(&self) -> Result<Vec<LocalOrderRecord>>;

    /// Looks up a single record.
    async fn get_by_id(&self, id: i64) -> Result<Option<LocalOrderRecord>>;

    /// Applies a field-change set to a record.
    async fn update(&self, id: i64, changes: &OrderChanges) -> Result<()>;
}

/// Postgres-backed trade store.
#[derive(Debug, Clone)]
pub struct PgTradeStore {
    pool: PgPool,
}

const SELECT_COLUMNS: &str = r#"
    id, broker_order_id, broker_perm_id, symbol, strike, expiry, "right",
    contracts, limit_price, status, fill_price, filled_contracts, fill_time,
    commission, exit_price, exit_reason, exit_time, realized_pnl, roi_pct,
    entered_at, reconciled_at
"#;

impl PgTradeStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and creates a store.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl LocalTradeStore for PgTradeStore {
    async fn trades_in_window(&self, since: NaiveDate) -> Result<Vec<LocalOrderRecord>> {
        let records = sqlx::query_as::<_, LocalOrderRecord>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM put_orders
            WHERE entered_at >= $1
            ORDER BY entered_at ASC
            "#
        ))
        .bind(since.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn open_positions(&self) -> Result<Vec<LocalOrderRecord>> {
        let records = sqlx::query_as::<_, LocalOrderRecord>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM put_orders
            WHERE status = 'filled' AND exit_time IS NULL AND exit_reason IS NULL
            ORDER BY entered_at ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<LocalOrderRecord>> {
        let record = sqlx::query_as::<_, LocalOrderRecord>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM put_orders
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update(&self, id: i64, changes: &OrderChanges) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE put_orders
            SET broker_order_id = COALESCE($2, broker_order_id),
                broker_perm_id  = COALESCE($3, broker_perm_id),
                status          = COALESCE($4, status),
                fill_price      = COALESCE($5, fill_price),
                filled_contracts = COALESCE($6, filled_contracts),
                fill_time       = COALESCE($7, fill_time),
                commission      = COALESCE($8, commission),
                exit_price      = COALESCE($9, exit_price),
                exit_reason     = COALESCE($10, exit_reason),
                exit_time       = COALESCE($11, exit_time),
                realized_pnl    = COALESCE($12, realized_pnl),
                roi_pct         = COALESCE($13, roi_pct),
                reconciled_at   = COALESCE($14, reconciled_at)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(changes.broker_order_id)
        .bind(changes.broker_perm_id)
        .bind(&changes.status)
        .bind(changes.fill_price)
        .bind(changes.filled_contracts)
        .bind(changes.fill_time)
        .bind(changes.commission)
        .bind(changes.exit_price)
        .bind(&changes.exit_reason)
        .bind(changes.exit_time)
        .bind(changes.realized_pnl)
        .bind(changes.roi_pct)
        .bind(changes.reconciled_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("no order record with id {id}");
        }
        debug!(order_id = id, "Order record updated");
        Ok(())
    }
}
