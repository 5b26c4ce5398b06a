use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use trade_sentinel_core::{
    allocate_levels, BrokerError, BrokerGateway, LevelAllocation, NotificationPayload, SignalView,
    TargetSpec,
};
use trade_sentinel_data::{
    LevelRepository, NotificationRepository, SignalRepository, TradeRecord, TradeRepository,
};

/// Level rows to create for a freshly filled trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializationPlan {
    pub take_profits: Vec<LevelAllocation>,
    pub stop_loss: Option<Decimal>,
}

/// Decides what levels a fill materializes, if any.
///
/// Returns `None` when level rows already exist for the trade, so a
/// re-polled fill never duplicates them. User-adjusted targets recorded
/// before the fill win over the signal's original ladder; share quantities
/// come from the actual filled quantity, never the requested one.
#[must_use]
pub fn plan_materialization(
    existing_take_profits: i64,
    existing_stop_losses: i64,
    custom_targets: Option<Vec<TargetSpec>>,
    signal: Option<&SignalView>,
    filled_quantity: Decimal,
) -> Option<MaterializationPlan> {
    if existing_take_profits > 0 || existing_stop_losses > 0 {
        return None;
    }

    let targets = match custom_targets {
        Some(targets) => targets,
        None => signal.map(|s| s.targets.clone()).unwrap_or_default(),
    };

    Some(MaterializationPlan {
        take_profits: allocate_levels(&targets, filled_quantity),
        stop_loss: signal.and_then(|s| s.stop_loss),
    })
}

/// Moves trades through their lifecycle: polls pending brokerage orders,
/// promotes fills, and materializes exit levels exactly once per fill.
pub struct TradeLifecycle {
    trades: TradeRepository,
    levels: LevelRepository,
    notifications: NotificationRepository,
    signals: SignalRepository,
    broker: Arc<dyn BrokerGateway>,
}

impl TradeLifecycle {
    #[must_use]
    pub fn new(
        trades: TradeRepository,
        levels: LevelRepository,
        notifications: NotificationRepository,
        signals: SignalRepository,
        broker: Arc<dyn BrokerGateway>,
    ) -> Self {
        Self { trades, levels, notifications, signals, broker }
    }

    /// Polls every pending order once and applies whatever the broker
    /// reports. One trade failing never blocks the rest. Returns the number
    /// of broker API calls made.
    ///
    /// # Errors
    /// Returns an error only when the account listing itself fails.
    pub async fn sync_pending_trades(&self) -> Result<u32> {
        let mut api_calls = 0u32;

        for account_id in self.trades.accounts_with_pending_orders().await? {
            let pending = self
                .trades
                .pending_with_broker_orders(account_id)
                .await
                .context("Failed to load pending trades")?;

            for trade in pending {
                api_calls += 1;
                if let Err(e) = self.sync_one_trade(&trade).await {
                    tracing::error!(trade_id = trade.id, error = %e, "Trade sync failed");
                }
            }
        }

        Ok(api_calls)
    }

    async fn sync_one_trade(&self, trade: &TradeRecord) -> Result<()> {
        let Some(order_id) = trade.broker_order_id.as_deref() else {
            return Ok(());
        };

        let report = match self.broker.get_order_status(order_id).await {
            Ok(report) => report,
            Err(BrokerError::OrderNotFound(_)) => {
                tracing::warn!(trade_id = trade.id, order_id, "Broker does not know this order");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(trade_id = trade.id, order_id, error = %e, "Order status lookup failed");
                return Ok(());
            }
        };

        if report.status == trade_sentinel_core::BrokerOrderStatus::Filled {
            let filled_at = report.filled_at.unwrap_or_else(Utc::now);
            let promoted = self
                .trades
                .mark_filled(trade.id, report.filled_avg_price, report.filled_quantity, filled_at)
                .await?;
            if !promoted {
                return Ok(());
            }

            tracing::info!(
                trade_id = trade.id,
                symbol = %trade.symbol,
                fill_price = %report.filled_avg_price,
                quantity = %report.filled_quantity,
                "Trade filled"
            );

            self.materialize_levels(trade, report.filled_quantity).await?;

            self.notifications
                .append(
                    trade.account_id,
                    Some(trade.id),
                    NotificationPayload::TradeFilled {
                        symbol: trade.symbol.clone(),
                        fill_price: report.filled_avg_price,
                        quantity: report.filled_quantity,
                    },
                )
                .await?;
        } else if report.status.is_dead() {
            let cancelled = self
                .trades
                .mark_cancelled(trade.id, report.status.as_str())
                .await?;
            if cancelled {
                tracing::info!(
                    trade_id = trade.id,
                    symbol = %trade.symbol,
                    status = report.status.as_str(),
                    "Trade cancelled by broker"
                );
                self.notifications
                    .append(
                        trade.account_id,
                        Some(trade.id),
                        NotificationPayload::TradeCancelled {
                            symbol: trade.symbol.clone(),
                            reason: report.status.as_str().to_string(),
                        },
                    )
                    .await?;
            }
        }

        Ok(())
    }

    /// Creates the exit-level rows for a freshly filled trade, per
    /// [`plan_materialization`].
    async fn materialize_levels(&self, trade: &TradeRecord, filled_quantity: Decimal) -> Result<()> {
        let (tp_count, sl_count) = self.levels.counts_for_trade(trade.id).await?;
        let signal = self.signals.view_for_trade(trade.id).await?;
        let custom = self.notifications.latest_custom_levels(trade.id).await?;

        let Some(plan) =
            plan_materialization(tp_count, sl_count, custom, signal.as_ref(), filled_quantity)
        else {
            tracing::debug!(trade_id = trade.id, "Levels already materialized");
            return Ok(());
        };

        if plan.take_profits.is_empty() {
            tracing::debug!(trade_id = trade.id, "No targets to materialize");
        } else {
            tracing::info!(
                trade_id = trade.id,
                levels = plan.take_profits.len(),
                "Materializing take-profit levels"
            );
            self.levels.insert_take_profits(trade.id, &plan.take_profits).await?;
        }

        if let Some(stop_price) = plan.stop_loss {
            self.levels.insert_stop_loss(trade.id, stop_price).await?;
        }

        Ok(())
    }

    /// Refreshes cached market prices and floating P&L for open positions.
    /// One batch quote per account. Returns the number of broker API calls.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn refresh_position_prices(&self) -> Result<u32> {
        let mut api_calls = 0u32;

        for account_id in self.trades.accounts_with_open_trades().await? {
            let open = self.trades.open_trades(account_id).await?;
            let symbols: Vec<String> = open
                .iter()
                .map(|t| t.symbol.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if symbols.is_empty() {
                continue;
            }

            api_calls += 1;
            let prices = match self.broker.get_current_prices(&symbols).await {
                Ok(prices) => prices,
                Err(e) => {
                    tracing::warn!(account_id, error = %e, "Price refresh lookup failed");
                    continue;
                }
            };

            for trade in &open {
                if let Some(price) = prices.get(&trade.symbol) {
                    let floating = trade.floating_pnl_at(*price);
                    self.trades.set_market_price(trade.id, *price, floating).await?;
                }
            }
        }

        Ok(api_calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trade_sentinel_core::TradeSide;

    fn signal(targets: &[Decimal], stop: Option<Decimal>) -> SignalView {
        SignalView {
            symbol: "AAPL".to_string(),
            side: TradeSide::Buy,
            stop_loss: stop,
            targets: targets
                .iter()
                .map(|&price| TargetSpec { price, percentage: None })
                .collect(),
        }
    }

    #[test]
    fn first_fill_materializes_levels_and_stop() {
        let sig = signal(&[dec!(11), dec!(12)], Some(dec!(9)));
        let plan = plan_materialization(0, 0, None, Some(&sig), dec!(100))
            .expect("a fresh fill materializes");

        assert_eq!(plan.take_profits.len(), 2);
        assert_eq!(plan.take_profits[0].shares, dec!(50));
        assert_eq!(plan.take_profits[1].shares, dec!(50));
        assert_eq!(plan.stop_loss, Some(dec!(9)));
    }

    #[test]
    fn repolled_fill_materializes_nothing() {
        let sig = signal(&[dec!(11), dec!(12)], Some(dec!(9)));

        assert!(plan_materialization(2, 1, None, Some(&sig), dec!(100)).is_none());
        // A lone stop-loss row is enough to suppress a second pass.
        assert!(plan_materialization(0, 1, None, Some(&sig), dec!(100)).is_none());
        assert!(plan_materialization(2, 0, None, Some(&sig), dec!(100)).is_none());
    }

    #[test]
    fn custom_targets_override_the_signal_ladder() {
        let sig = signal(&[dec!(11), dec!(12)], Some(dec!(9)));
        let custom = vec![TargetSpec { price: dec!(15), percentage: None }];

        let plan = plan_materialization(0, 0, Some(custom), Some(&sig), dec!(100))
            .expect("a fresh fill materializes");

        assert_eq!(plan.take_profits.len(), 1);
        assert_eq!(plan.take_profits[0].price, dec!(15));
        assert_eq!(plan.take_profits[0].shares, dec!(100));
        // The stop still comes from the signal.
        assert_eq!(plan.stop_loss, Some(dec!(9)));
    }

    #[test]
    fn no_signal_and_no_custom_targets_yield_an_empty_plan() {
        let plan = plan_materialization(0, 0, None, None, dec!(100))
            .expect("still a plan, just with nothing to insert");
        assert!(plan.take_profits.is_empty());
        assert_eq!(plan.stop_loss, None);
    }
}
