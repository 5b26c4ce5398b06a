//! Trigger predicates for take-profit and stop-loss levels.
//!
//! All four side/level combinations compare a single fresh price sample
//! against the stored target. The comparisons are inclusive: touching the
//! level counts as a trigger.

use rust_decimal::Decimal;

use crate::types::TradeSide;

/// Whether a take-profit level should fire at the given price.
///
/// Long positions take profit when price rises to the target; shorts when it
/// falls to the target.
#[must_use]
pub fn take_profit_triggered(side: TradeSide, price: Decimal, target: Decimal) -> bool {
    match side {
        TradeSide::Buy => price >= target,
        TradeSide::Sell => price <= target,
    }
}

/// Whether a stop-loss should fire at the given price.
///
/// Long positions stop out when price falls to the stop; shorts when it rises
/// to the stop.
#[must_use]
pub fn stop_loss_triggered(side: TradeSide, price: Decimal, stop: Decimal) -> bool {
    match side {
        TradeSide::Buy => price <= stop,
        TradeSide::Sell => price >= stop,
    }
}

/// Quantity a stop-loss still protects: the trade's filled quantity minus
/// shares already disposed of via executed take-profit levels. A stop always
/// closes this entire amount, never the nominal row quantity.
#[must_use]
pub fn protected_quantity(filled_quantity: Decimal, executed_tp_shares: Decimal) -> Decimal {
    filled_quantity - executed_tp_shares
}
