use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use sqlx::PgPool;
use trade_sentinel_core::{
    BrokerGateway, CloseReason, LevelStatus, NotificationEnvelope, NotificationPayload,
    StopLossStatus, TradeSide, TradeStatus,
};
use trade_sentinel_data::{ActiveStopLossRow, PendingTakeProfitRow};
use uuid::Uuid;

/// Terminal state a trade moves to when an exit completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeClose {
    pub status: TradeStatus,
    pub close_reason: &'static str,
}

/// Planned state changes for one executed take-profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeProfitOutcome {
    pub level_status: LevelStatus,
    /// Set when this was the last pending level on the trade.
    pub trade_close: Option<TradeClose>,
    pub cancel_stop_loss: bool,
}

/// State changes for an executed take-profit, given how many sibling
/// levels are still pending afterwards. The last level closes the trade
/// as fully exited and retires its stop-loss.
#[must_use]
pub fn plan_take_profit_outcome(remaining_pending: i64) -> TakeProfitOutcome {
    let last_level = remaining_pending == 0;
    TakeProfitOutcome {
        level_status: LevelStatus::Executed,
        trade_close: last_level.then_some(TradeClose {
            status: TradeStatus::Closed,
            close_reason: CloseReason::ALL_TARGETS_HIT,
        }),
        cancel_stop_loss: last_level,
    }
}

/// Planned state changes for one executed stop-loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopLossCascade {
    pub level_status: StopLossStatus,
    /// Applied to every sibling take-profit still pending.
    pub sibling_take_profit_status: LevelStatus,
    pub trade_close: TradeClose,
    pub closing_side: TradeSide,
    pub closing_quantity: Decimal,
}

/// A stop sells all remaining shares on the exit side and cancels every
/// pending sibling, distinct from a plain cancellation.
#[must_use]
pub fn plan_stop_loss_cascade(side: TradeSide, quantity: Decimal) -> StopLossCascade {
    StopLossCascade {
        level_status: StopLossStatus::Executed,
        sibling_take_profit_status: LevelStatus::CancelledBySellAll,
        trade_close: TradeClose {
            status: TradeStatus::Closed,
            close_reason: CloseReason::STOP_LOSS,
        },
        closing_side: side.opposite(),
        closing_quantity: quantity,
    }
}

/// Turns a triggered level into a brokerage order plus one atomic state
/// change in the store.
///
/// Order placement happens outside the transaction; all row updates for a
/// trigger commit together. Updates are gated on the level's live status,
/// so a level can never execute twice even if two cycles race.
pub struct LevelExecutor {
    pool: PgPool,
    broker: Arc<dyn BrokerGateway>,
}

impl LevelExecutor {
    #[must_use]
    pub fn new(pool: PgPool, broker: Arc<dyn BrokerGateway>) -> Self {
        Self { pool, broker }
    }

    /// Executes one triggered take-profit: sells the level's shares and
    /// marks the level executed. When it was the last pending level, the
    /// trade closes as fully exited and its stop-loss is cancelled.
    ///
    /// A broker failure leaves the level pending for the next cycle and
    /// returns `Ok(false)`.
    ///
    /// # Errors
    /// Returns an error if the store update fails after the order went out.
    pub async fn execute_take_profit(
        &self,
        level: &PendingTakeProfitRow,
        price: Decimal,
    ) -> Result<bool> {
        let side = TradeSide::parse(&level.side)
            .ok_or_else(|| anyhow!("Trade {} has unknown side {}", level.trade_id, level.side))?;

        let order_id = match self
            .broker
            .place_market_order(&level.symbol, side.opposite(), level.shares_quantity)
            .await
        {
            Ok(order_id) => order_id,
            Err(e) => {
                tracing::warn!(
                    trade_id = level.trade_id,
                    level_number = level.level_number,
                    error = %e,
                    "Take-profit order failed, level stays pending"
                );
                return Ok(false);
            }
        };

        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        let updated = sqlx::query(
            r#"
            UPDATE take_profit_levels
            SET status = $2,
                executed_at = NOW(),
                executed_price = $3,
                broker_order_id = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(level.level_id)
        .bind(LevelStatus::Executed.as_str())
        .bind(price)
        .bind(&order_id)
        .bind(LevelStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to mark take-profit executed")?;

        if updated.rows_affected() == 0 {
            tracing::error!(
                level_id = level.level_id,
                %order_id,
                "Take-profit no longer pending after order placement"
            );
            return Ok(false);
        }

        let remaining: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM take_profit_levels WHERE trade_id = $1 AND status = $2",
        )
        .bind(level.trade_id)
        .bind(LevelStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count remaining levels")?;

        let outcome = plan_take_profit_outcome(remaining);

        if let Some(close) = outcome.trade_close {
            sqlx::query(
                r#"
                UPDATE trades
                SET status = $2,
                    close_reason = $3,
                    closed_at = NOW(),
                    exit_price = $4
                WHERE id = $1 AND status = $5
                "#,
            )
            .bind(level.trade_id)
            .bind(close.status.as_str())
            .bind(close.close_reason)
            .bind(price)
            .bind(TradeStatus::Filled.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to close fully exited trade")?;
        }

        if outcome.cancel_stop_loss {
            sqlx::query(
                r#"
                UPDATE stop_loss_levels
                SET status = $2
                WHERE trade_id = $1 AND status = $3
                "#,
            )
            .bind(level.trade_id)
            .bind(StopLossStatus::Cancelled.as_str())
            .bind(StopLossStatus::Active.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to cancel stop-loss")?;
        }

        insert_notification(
            &mut tx,
            level.account_id,
            level.trade_id,
            NotificationPayload::TakeProfitExecuted {
                symbol: level.symbol.clone(),
                level_number: level.level_number,
                executed_price: price,
                quantity: level.shares_quantity,
                broker_order_id: order_id.clone(),
            },
        )
        .await?;

        tx.commit().await.context("Failed to commit take-profit execution")?;

        tracing::info!(
            trade_id = level.trade_id,
            level_number = level.level_number,
            %price,
            quantity = %level.shares_quantity,
            %order_id,
            all_targets_hit = outcome.trade_close.is_some(),
            "Take-profit executed"
        );

        Ok(true)
    }

    /// Executes one triggered stop-loss: sells everything still held,
    /// closes the trade, cancels remaining take-profits, and records a
    /// linked closing trade carrying the exit order.
    ///
    /// A broker failure leaves the stop active for the next cycle and
    /// returns `Ok(false)`.
    ///
    /// # Errors
    /// Returns an error if the store update fails after the order went out.
    pub async fn execute_stop_loss(
        &self,
        level: &ActiveStopLossRow,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<bool> {
        let side = TradeSide::parse(&level.side)
            .ok_or_else(|| anyhow!("Trade {} has unknown side {}", level.trade_id, level.side))?;
        let cascade = plan_stop_loss_cascade(side, quantity);

        let order_id = match self
            .broker
            .place_market_order(&level.symbol, cascade.closing_side, cascade.closing_quantity)
            .await
        {
            Ok(order_id) => order_id,
            Err(e) => {
                tracing::warn!(
                    trade_id = level.trade_id,
                    error = %e,
                    "Stop-loss order failed, stop stays active"
                );
                return Ok(false);
            }
        };

        let link_group_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        let updated = sqlx::query(
            r#"
            UPDATE stop_loss_levels
            SET status = $2,
                executed_at = NOW(),
                executed_price = $3,
                executed_shares = $4,
                broker_order_id = $5
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(level.level_id)
        .bind(cascade.level_status.as_str())
        .bind(price)
        .bind(cascade.closing_quantity)
        .bind(&order_id)
        .bind(StopLossStatus::Active.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to mark stop-loss executed")?;

        if updated.rows_affected() == 0 {
            tracing::error!(
                level_id = level.level_id,
                %order_id,
                "Stop-loss no longer active after order placement"
            );
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE take_profit_levels
            SET status = $2
            WHERE trade_id = $1 AND status = $3
            "#,
        )
        .bind(level.trade_id)
        .bind(cascade.sibling_take_profit_status.as_str())
        .bind(LevelStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to cancel sibling take-profits")?;

        sqlx::query(
            r#"
            UPDATE trades
            SET status = $2,
                close_reason = $3,
                closed_at = NOW(),
                exit_price = $4,
                link_group_id = $5
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(level.trade_id)
        .bind(cascade.trade_close.status.as_str())
        .bind(cascade.trade_close.close_reason)
        .bind(price)
        .bind(link_group_id)
        .bind(TradeStatus::Filled.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to close stopped-out trade")?;

        let closing_trade_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO trades
                (account_id, symbol, side, quantity, status, broker_order_id, link_group_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(level.account_id)
        .bind(&level.symbol)
        .bind(cascade.closing_side.as_str())
        .bind(cascade.closing_quantity)
        .bind(TradeStatus::Pending.as_str())
        .bind(&order_id)
        .bind(link_group_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to record closing trade")?;

        insert_notification(
            &mut tx,
            level.account_id,
            level.trade_id,
            NotificationPayload::StopLossExecuted {
                symbol: level.symbol.clone(),
                executed_price: price,
                total_quantity: cascade.closing_quantity,
                broker_order_id: order_id.clone(),
                closing_trade_id,
            },
        )
        .await?;

        tx.commit().await.context("Failed to commit stop-loss execution")?;

        tracing::info!(
            trade_id = level.trade_id,
            closing_trade_id,
            %price,
            %quantity,
            %order_id,
            "Stop-loss executed"
        );

        Ok(true)
    }
}

async fn insert_notification(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    account_id: i32,
    trade_id: i64,
    payload: NotificationPayload,
) -> Result<()> {
    let type_tag = payload.type_tag();
    let envelope = NotificationEnvelope::new(payload);
    let data = serde_json::to_value(&envelope).context("Failed to serialize notification")?;

    sqlx::query(
        r#"
        INSERT INTO trade_notifications (account_id, trade_id, notification_type, data, read)
        VALUES ($1, $2, $3, $4, FALSE)
        "#,
    )
    .bind(account_id)
    .bind(trade_id)
    .bind(type_tag)
    .bind(data)
    .execute(&mut **tx)
    .await
    .context("Failed to insert notification")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn intermediate_take_profit_leaves_trade_open() {
        let outcome = plan_take_profit_outcome(1);
        assert_eq!(outcome.level_status, LevelStatus::Executed);
        assert!(outcome.trade_close.is_none());
        assert!(!outcome.cancel_stop_loss);
    }

    #[test]
    fn last_take_profit_closes_trade_and_retires_stop() {
        let outcome = plan_take_profit_outcome(0);
        let close = outcome.trade_close.expect("last level closes the trade");
        assert_eq!(close.status, TradeStatus::Closed);
        assert_eq!(close.close_reason, CloseReason::ALL_TARGETS_HIT);
        assert!(outcome.cancel_stop_loss);
    }

    #[test]
    fn stop_cascade_exits_on_opposite_side() {
        let cascade = plan_stop_loss_cascade(TradeSide::Buy, dec!(50));
        assert_eq!(cascade.closing_side, TradeSide::Sell);
        assert_eq!(cascade.closing_quantity, dec!(50));
        assert_eq!(cascade.level_status, StopLossStatus::Executed);
    }

    #[test]
    fn stop_cascade_marks_siblings_sell_all_not_plain_cancelled() {
        let cascade = plan_stop_loss_cascade(TradeSide::Buy, dec!(100));
        assert_eq!(cascade.sibling_take_profit_status, LevelStatus::CancelledBySellAll);
        assert_eq!(cascade.trade_close.status, TradeStatus::Closed);
        assert_eq!(cascade.trade_close.close_reason, CloseReason::STOP_LOSS);
    }

    #[test]
    fn short_stop_cascade_buys_back() {
        let cascade = plan_stop_loss_cascade(TradeSide::Sell, dec!(25));
        assert_eq!(cascade.closing_side, TradeSide::Buy);
    }
}
