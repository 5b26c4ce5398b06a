//! FIFO realized-P&L matching over broker fill history.
//!
//! Replays a symbol's filled buys and sells in time order and matches each
//! sell against the oldest unmatched buy quantity first. This is independent
//! of the level tables and serves as a cross-check / recovery path: given the
//! same fill history it always produces the same report.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::broker::BrokerFill;
use crate::types::TradeSide;

/// Outcome of one FIFO reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct FifoReport {
    pub total_pnl: Decimal,
    /// Winning matches / (winning + losing matches) * 100; 0 with no matches.
    pub win_rate: f64,
    pub winning_matches: u32,
    pub losing_matches: u32,
    /// Realized P&L per symbol.
    pub per_symbol_pnl: HashMap<String, Decimal>,
    /// Realized P&L per sell order id, the sum of that sell's partial
    /// matches. Written back onto the sell's trade row by the reconciler.
    pub sell_order_pnl: HashMap<String, Decimal>,
}

struct OpenLot {
    remaining: Decimal,
    price: Decimal,
}

/// Matches the given fills FIFO and aggregates realized P&L.
///
/// Input ordering is irrelevant; fills are sorted internally by fill time
/// (order id as a tiebreaker for determinism). Win/loss counts increment per
/// match, not per order; a zero-P&L match counts as neither.
#[must_use]
pub fn match_fills(fills: &[BrokerFill]) -> FifoReport {
    let mut by_symbol: HashMap<&str, (Vec<&BrokerFill>, Vec<&BrokerFill>)> = HashMap::new();
    for fill in fills {
        let entry = by_symbol.entry(fill.symbol.as_str()).or_default();
        match fill.side {
            TradeSide::Buy => entry.0.push(fill),
            TradeSide::Sell => entry.1.push(fill),
        }
    }

    let mut report = FifoReport::default();

    for (symbol, (mut buys, mut sells)) in by_symbol {
        buys.sort_by(|a, b| a.filled_at.cmp(&b.filled_at).then_with(|| a.order_id.cmp(&b.order_id)));
        sells.sort_by(|a, b| a.filled_at.cmp(&b.filled_at).then_with(|| a.order_id.cmp(&b.order_id)));

        let mut lots: Vec<OpenLot> = buys
            .iter()
            .map(|buy| OpenLot { remaining: buy.quantity, price: buy.price })
            .collect();
        let mut next_lot = 0;
        let mut symbol_pnl = Decimal::ZERO;

        for sell in sells {
            let mut unmatched = sell.quantity;
            let mut sell_pnl = Decimal::ZERO;

            while unmatched > Decimal::ZERO && next_lot < lots.len() {
                let lot = &mut lots[next_lot];
                let matched = unmatched.min(lot.remaining);
                let pnl = (sell.price - lot.price) * matched;

                sell_pnl += pnl;
                if pnl > Decimal::ZERO {
                    report.winning_matches += 1;
                } else if pnl < Decimal::ZERO {
                    report.losing_matches += 1;
                }

                lot.remaining -= matched;
                unmatched -= matched;
                if lot.remaining == Decimal::ZERO {
                    next_lot += 1;
                }
            }

            symbol_pnl += sell_pnl;
            *report
                .sell_order_pnl
                .entry(sell.order_id.clone())
                .or_insert(Decimal::ZERO) += sell_pnl;
        }

        if symbol_pnl != Decimal::ZERO || !lots.is_empty() {
            report.per_symbol_pnl.insert(symbol.to_string(), symbol_pnl);
        }
        report.total_pnl += symbol_pnl;
    }

    let decided = report.winning_matches + report.losing_matches;
    report.win_rate = if decided > 0 {
        f64::from(report.winning_matches) / f64::from(decided) * 100.0
    } else {
        0.0
    };

    report
}
