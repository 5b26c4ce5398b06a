use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::PgPool;
use trade_sentinel_core::{LevelAllocation, LevelStatus, StopLossStatus, TradeStatus};

use crate::models::{ActiveStopLossRow, PendingTakeProfitRow};

/// Repository for take-profit and stop-loss level rows.
///
/// Status values are always bound from the core enums, never inlined.
#[derive(Debug, Clone)]
pub struct LevelRepository {
    pool: PgPool,
}

impl LevelRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Counts existing level rows for a trade, in any status.
    ///
    /// Materialization is guarded on this being (0, 0) so a re-polled fill
    /// never duplicates levels.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn counts_for_trade(&self, trade_id: i64) -> Result<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM take_profit_levels WHERE trade_id = $1),
                (SELECT COUNT(*) FROM stop_loss_levels WHERE trade_id = $1)
            "#,
        )
        .bind(trade_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count levels for trade")?;

        Ok(row)
    }

    /// Inserts the materialized take-profit ladder for a trade.
    ///
    /// # Errors
    /// Returns an error if any insert fails.
    pub async fn insert_take_profits(
        &self,
        trade_id: i64,
        allocations: &[LevelAllocation],
    ) -> Result<()> {
        for alloc in allocations {
            sqlx::query(
                r#"
                INSERT INTO take_profit_levels
                    (trade_id, level_number, price, percentage, shares_quantity, status)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(trade_id)
            .bind(alloc.level_number)
            .bind(alloc.price)
            .bind(alloc.percentage)
            .bind(alloc.shares)
            .bind(LevelStatus::Pending.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to insert take-profit level")?;
        }

        Ok(())
    }

    /// Inserts the active stop-loss for a trade.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_stop_loss(&self, trade_id: i64, price: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stop_loss_levels (trade_id, price, status)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(trade_id)
        .bind(price)
        .bind(StopLossStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to insert stop-loss level")?;

        Ok(())
    }

    /// Distinct symbols the account needs prices for this cycle: any symbol
    /// with a pending take-profit or an active stop-loss on a filled trade.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn symbols_with_active_levels(&self, account_id: i32) -> Result<Vec<String>> {
        let symbols = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT t.symbol
            FROM trades t
            WHERE t.account_id = $1
              AND t.status = $2
              AND (
                EXISTS (
                    SELECT 1 FROM take_profit_levels tp
                    WHERE tp.trade_id = t.id AND tp.status = $3
                )
                OR EXISTS (
                    SELECT 1 FROM stop_loss_levels sl
                    WHERE sl.trade_id = t.id AND sl.status = $4
                )
              )
            ORDER BY t.symbol
            "#,
        )
        .bind(account_id)
        .bind(TradeStatus::Filled.as_str())
        .bind(LevelStatus::Pending.as_str())
        .bind(StopLossStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list symbols with active levels")?;

        Ok(symbols)
    }

    /// Accounts that currently have live levels to monitor.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn accounts_with_active_levels(&self) -> Result<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT t.account_id
            FROM trades t
            WHERE t.status = $1
              AND (
                EXISTS (
                    SELECT 1 FROM take_profit_levels tp
                    WHERE tp.trade_id = t.id AND tp.status = $2
                )
                OR EXISTS (
                    SELECT 1 FROM stop_loss_levels sl
                    WHERE sl.trade_id = t.id AND sl.status = $3
                )
              )
            "#,
        )
        .bind(TradeStatus::Filled.as_str())
        .bind(LevelStatus::Pending.as_str())
        .bind(StopLossStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts with active levels")?;

        Ok(ids)
    }

    /// Pending take-profits on filled trades, ordered so lower level numbers
    /// execute first within a trade.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn pending_take_profits(&self, account_id: i32) -> Result<Vec<PendingTakeProfitRow>> {
        let rows = sqlx::query_as::<_, PendingTakeProfitRow>(
            r#"
            SELECT tp.id AS level_id,
                   tp.trade_id,
                   t.account_id,
                   tp.level_number,
                   tp.price,
                   tp.shares_quantity,
                   t.symbol,
                   t.side,
                   t.quantity AS trade_quantity
            FROM take_profit_levels tp
            JOIN trades t ON t.id = tp.trade_id
            WHERE t.account_id = $1
              AND t.status = $2
              AND tp.status = $3
            ORDER BY tp.trade_id, tp.level_number
            "#,
        )
        .bind(account_id)
        .bind(TradeStatus::Filled.as_str())
        .bind(LevelStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending take-profits")?;

        Ok(rows)
    }

    /// Active stop-losses on filled trades, with the shares already taken
    /// out by executed take-profit siblings.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn active_stop_losses(&self, account_id: i32) -> Result<Vec<ActiveStopLossRow>> {
        let rows = sqlx::query_as::<_, ActiveStopLossRow>(
            r#"
            SELECT sl.id AS level_id,
                   sl.trade_id,
                   t.account_id,
                   sl.price,
                   t.symbol,
                   t.side,
                   t.quantity AS trade_quantity,
                   COALESCE((
                       SELECT SUM(tp.shares_quantity)
                       FROM take_profit_levels tp
                       WHERE tp.trade_id = sl.trade_id
                         AND tp.status = $4
                   ), 0) AS executed_tp_shares
            FROM stop_loss_levels sl
            JOIN trades t ON t.id = sl.trade_id
            WHERE t.account_id = $1
              AND t.status = $2
              AND sl.status = $3
            ORDER BY sl.trade_id
            "#,
        )
        .bind(account_id)
        .bind(TradeStatus::Filled.as_str())
        .bind(StopLossStatus::Active.as_str())
        .bind(LevelStatus::Executed.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch active stop-losses")?;

        Ok(rows)
    }
}
