use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use trade_sentinel_core::{
    levels::{stop_loss_triggered, take_profit_triggered},
    BrokerGateway, TradeSide,
};
use trade_sentinel_data::{ActiveStopLossRow, LevelRepository, PendingTakeProfitRow};

use crate::executor::LevelExecutor;

/// One level the current price sample has triggered.
#[derive(Debug)]
pub enum TriggerAction {
    TakeProfit {
        level: PendingTakeProfitRow,
        price: Decimal,
    },
    StopLoss {
        level: ActiveStopLossRow,
        price: Decimal,
        /// Shares still held after executed and same-cycle take-profits.
        quantity: Decimal,
    },
}

/// Decides which levels fire against a single price sample.
///
/// Take-profits are evaluated first, in ascending level order within each
/// trade, so a stop-loss in the same cycle only sells what those exits
/// leave behind. A stop whose trade is already fully exited is skipped.
#[must_use]
pub fn plan_triggers(
    prices: &HashMap<String, Decimal>,
    take_profits: &[PendingTakeProfitRow],
    stop_losses: &[ActiveStopLossRow],
) -> Vec<TriggerAction> {
    let mut actions = Vec::new();
    let mut planned_tp_shares: HashMap<i64, Decimal> = HashMap::new();

    for level in take_profits {
        let Some(price) = prices.get(&level.symbol).copied() else {
            continue;
        };
        let Some(side) = TradeSide::parse(&level.side) else {
            tracing::warn!(trade_id = level.trade_id, side = %level.side, "Skipping level with unknown side");
            continue;
        };
        if take_profit_triggered(side, price, level.price) {
            *planned_tp_shares.entry(level.trade_id).or_default() += level.shares_quantity;
            actions.push(TriggerAction::TakeProfit { level: level.clone(), price });
        }
    }

    for level in stop_losses {
        let Some(price) = prices.get(&level.symbol).copied() else {
            continue;
        };
        let Some(side) = TradeSide::parse(&level.side) else {
            tracing::warn!(trade_id = level.trade_id, side = %level.side, "Skipping level with unknown side");
            continue;
        };

        let same_cycle = planned_tp_shares
            .get(&level.trade_id)
            .copied()
            .unwrap_or_default();
        let remaining = level.trade_quantity - level.executed_tp_shares - same_cycle;
        if remaining <= Decimal::ZERO {
            continue;
        }

        if stop_loss_triggered(side, price, level.price) {
            actions.push(TriggerAction::StopLoss { level: level.clone(), price, quantity: remaining });
        }
    }

    actions
}

/// Samples prices per account and hands triggered levels to the executor.
pub struct LevelMonitor {
    levels: LevelRepository,
    broker: Arc<dyn BrokerGateway>,
    executor: LevelExecutor,
}

impl LevelMonitor {
    #[must_use]
    pub fn new(
        levels: LevelRepository,
        broker: Arc<dyn BrokerGateway>,
        executor: LevelExecutor,
    ) -> Self {
        Self { levels, broker, executor }
    }

    /// Runs one monitoring cycle over every account with live levels.
    ///
    /// Each account gets exactly one batch price lookup; every level is
    /// judged against that one sample. A failing level execution is logged
    /// and never blocks the rest of the cycle. Returns the number of broker
    /// API calls made.
    ///
    /// # Errors
    /// Returns an error only when the store itself fails.
    pub async fn tick(&self) -> Result<u32> {
        let mut api_calls = 0u32;

        for account_id in self.levels.accounts_with_active_levels().await? {
            let symbols = self.levels.symbols_with_active_levels(account_id).await?;
            if symbols.is_empty() {
                continue;
            }

            api_calls += 1;
            let prices = match self.broker.get_current_prices(&symbols).await {
                Ok(prices) => prices,
                Err(e) => {
                    tracing::warn!(account_id, error = %e, "Price lookup failed, skipping account this cycle");
                    continue;
                }
            };

            let take_profits = self.levels.pending_take_profits(account_id).await?;
            let stop_losses = self.levels.active_stop_losses(account_id).await?;
            let actions = plan_triggers(&prices, &take_profits, &stop_losses);

            for action in actions {
                api_calls += 1;
                let result = match &action {
                    TriggerAction::TakeProfit { level, price } => {
                        self.executor.execute_take_profit(level, *price).await
                    }
                    TriggerAction::StopLoss { level, price, quantity } => {
                        self.executor.execute_stop_loss(level, *price, *quantity).await
                    }
                };
                if let Err(e) = result {
                    tracing::error!(account_id, error = %e, "Level execution failed");
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

    fn tp(
        trade_id: i64,
        level_number: i32,
        price: Decimal,
        shares: Decimal,
        side: &str,
    ) -> PendingTakeProfitRow {
        PendingTakeProfitRow {
            level_id: trade_id * 10 + i64::from(level_number),
            trade_id,
            account_id: 1,
            level_number,
            price,
            shares_quantity: shares,
            symbol: "AAPL".to_string(),
            side: side.to_string(),
            trade_quantity: dec!(100),
        }
    }

    fn sl(trade_id: i64, price: Decimal, executed_tp: Decimal, side: &str) -> ActiveStopLossRow {
        ActiveStopLossRow {
            level_id: trade_id * 100,
            trade_id,
            account_id: 1,
            price,
            symbol: "AAPL".to_string(),
            side: side.to_string(),
            trade_quantity: dec!(100),
            executed_tp_shares: executed_tp,
        }
    }

    fn prices(price: Decimal) -> HashMap<String, Decimal> {
        HashMap::from([("AAPL".to_string(), price)])
    }

    #[test]
    fn plan_fires_take_profit_at_or_above_target() {
        let tps = vec![tp(1, 1, dec!(11), dec!(50), "BUY")];
        assert_eq!(plan_triggers(&prices(dec!(11)), &tps, &[]).len(), 1);
        assert_eq!(plan_triggers(&prices(dec!(10.99)), &tps, &[]).len(), 0);
    }

    #[test]
    fn levels_fire_in_ascending_order_within_a_trade() {
        let tps = vec![
            tp(1, 1, dec!(11), dec!(50), "BUY"),
            tp(1, 2, dec!(12), dec!(50), "BUY"),
        ];
        let actions = plan_triggers(&prices(dec!(12)), &tps, &[]);
        assert_eq!(actions.len(), 2);
        match (&actions[0], &actions[1]) {
            (
                TriggerAction::TakeProfit { level: first, .. },
                TriggerAction::TakeProfit { level: second, .. },
            ) => {
                assert_eq!(first.level_number, 1);
                assert_eq!(second.level_number, 2);
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn stop_sells_only_the_unprotected_remainder() {
        let stops = vec![sl(1, dec!(9), dec!(50), "BUY")];
        let actions = plan_triggers(&prices(dec!(9)), &[], &stops);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            TriggerAction::StopLoss { quantity, .. } => assert_eq!(*quantity, dec!(50)),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn fully_exited_trade_never_triggers_its_stop() {
        let stops = vec![sl(1, dec!(9), dec!(100), "BUY")];
        assert!(plan_triggers(&prices(dec!(8)), &[], &stops).is_empty());
    }

    #[test]
    fn same_cycle_take_profit_shrinks_the_stop_quantity() {
        // Target sits below the stop, so one sample can fire both. The stop
        // must only sell what the same-cycle exit leaves behind.
        let tps = vec![tp(1, 1, dec!(9.5), dec!(40), "BUY")];
        let stops = vec![sl(1, dec!(9.6), dec!(0), "BUY")];

        let actions = plan_triggers(&prices(dec!(9.5)), &tps, &stops);
        assert_eq!(actions.len(), 2);
        match &actions[1] {
            TriggerAction::StopLoss { quantity, .. } => assert_eq!(*quantity, dec!(60)),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn short_side_comparisons_are_inverted() {
        let tps = vec![tp(1, 1, dec!(9), dec!(100), "SELL")];
        assert_eq!(plan_triggers(&prices(dec!(9)), &tps, &[]).len(), 1);
        assert_eq!(plan_triggers(&prices(dec!(9.01)), &tps, &[]).len(), 0);

        let stops = vec![sl(1, dec!(11), dec!(0), "SELL")];
        assert_eq!(plan_triggers(&prices(dec!(11)), &[], &stops).len(), 1);
        assert_eq!(plan_triggers(&prices(dec!(10.99)), &[], &stops).len(), 0);
    }

    #[test]
    fn missing_quote_skips_the_symbol() {
        let tps = vec![tp(1, 1, dec!(11), dec!(50), "BUY")];
        let stops = vec![sl(1, dec!(9), dec!(0), "BUY")];
        let empty = HashMap::new();
        assert!(plan_triggers(&empty, &tps, &stops).is_empty());
    }
}
