use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use trade_sentinel_core::{TradeSide, TradeStatus};

use crate::models::TradeRecord;

/// Repository for trade rows.
///
/// Status values are always bound from the core enums, never inlined, so
/// the store cannot drift from the engine's vocabulary.
#[derive(Debug, Clone)]
pub struct TradeRepository {
    pool: PgPool,
}

impl TradeRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pending trades for an account that already have a brokerage order id,
    /// i.e. orders whose fill state is worth polling.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn pending_with_broker_orders(&self, account_id: i32) -> Result<Vec<TradeRecord>> {
        let trades = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT id, account_id, signal_id, symbol, side, quantity,
                   entry_price, exit_price, current_price, pnl, floating_pnl,
                   status, broker_order_id, opened_at, closed_at, close_reason,
                   link_group_id, created_at
            FROM trades
            WHERE account_id = $1
              AND status = $2
              AND broker_order_id IS NOT NULL
            ORDER BY created_at
            "#,
        )
        .bind(account_id)
        .bind(TradeStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending trades")?;

        Ok(trades)
    }

    /// Filled (open) trades for an account.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn open_trades(&self, account_id: i32) -> Result<Vec<TradeRecord>> {
        let trades = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT id, account_id, signal_id, symbol, side, quantity,
                   entry_price, exit_price, current_price, pnl, floating_pnl,
                   status, broker_order_id, opened_at, closed_at, close_reason,
                   link_group_id, created_at
            FROM trades
            WHERE account_id = $1
              AND status = $2
            ORDER BY opened_at
            "#,
        )
        .bind(account_id)
        .bind(TradeStatus::Filled.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch open trades")?;

        Ok(trades)
    }

    /// Promotes a pending trade to filled with its actual fill data.
    ///
    /// The quantity is overwritten with the filled quantity so downstream
    /// level math always works from real shares. Returns `false` when the
    /// row was no longer pending.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_filled(
        &self,
        trade_id: i64,
        fill_price: Decimal,
        filled_quantity: Decimal,
        filled_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET status = $2,
                entry_price = $3,
                quantity = $4,
                opened_at = $5
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(trade_id)
        .bind(TradeStatus::Filled.as_str())
        .bind(fill_price)
        .bind(filled_quantity)
        .bind(filled_at)
        .bind(TradeStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to mark trade filled")?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancels a pending trade whose brokerage order died.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_cancelled(&self, trade_id: i64, reason: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET status = $2,
                close_reason = $3,
                closed_at = NOW()
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(trade_id)
        .bind(TradeStatus::Cancelled.as_str())
        .bind(reason)
        .bind(TradeStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to cancel trade")?;

        Ok(result.rows_affected() > 0)
    }

    /// Refreshes the cached market price and floating P&L for an open trade.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_market_price(
        &self,
        trade_id: i64,
        current_price: Decimal,
        floating_pnl: Option<Decimal>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trades
            SET current_price = $2,
                floating_pnl = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(trade_id)
        .bind(current_price)
        .bind(floating_pnl)
        .bind(TradeStatus::Filled.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to update market price")?;

        Ok(())
    }

    /// Writes realized P&L onto the closing (sell-side) trade that carries
    /// the given brokerage order id. Returns the number of rows touched.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_realized_pnl_by_order(
        &self,
        broker_order_id: &str,
        pnl: Decimal,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET pnl = $2
            WHERE broker_order_id = $1
              AND side = $3
            "#,
        )
        .bind(broker_order_id)
        .bind(pnl)
        .bind(TradeSide::Sell.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to write realized P&L")?;

        Ok(result.rows_affected())
    }

    /// Accounts that currently hold pending trades with brokerage orders.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn accounts_with_pending_orders(&self) -> Result<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT account_id
            FROM trades
            WHERE status = $1
              AND broker_order_id IS NOT NULL
            "#,
        )
        .bind(TradeStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts with pending orders")?;

        Ok(ids)
    }

    /// Accounts that currently hold open positions.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn accounts_with_open_trades(&self) -> Result<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT account_id
            FROM trades
            WHERE status = $1
            "#,
        )
        .bind(TradeStatus::Filled.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts with open trades")?;

        Ok(ids)
    }
}
