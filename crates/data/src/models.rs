//! Row models for the trade store.
//!
//! Status columns are stored as their stable string forms; the core enums
//! (`TradeStatus`, `LevelStatus`, `StopLossStatus`) own the vocabulary.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use trade_sentinel_core::TradeSide;
use uuid::Uuid;

/// One brokerage order and its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TradeRecord {
    pub id: i64,
    pub account_id: i32,
    pub signal_id: Option<i64>,
    pub symbol: String,
    /// "BUY" or "SELL"
    pub side: String,
    /// Requested quantity until fill; overwritten with the filled quantity.
    pub quantity: Decimal,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    /// Realized P&L, written by the reconciler for closing (sell-side) rows.
    pub pnl: Option<Decimal>,
    pub floating_pnl: Option<Decimal>,
    /// pending | filled | closed | cancelled
    pub status: String,
    pub broker_order_id: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<String>,
    /// Ties an opening trade to the closing trade a stop-loss produced.
    pub link_group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TradeRecord {
    #[must_use]
    pub fn trade_side(&self) -> Option<TradeSide> {
        TradeSide::parse(&self.side)
    }

    /// Floating P&L at `price`: (price − entry) × qty for longs, inverted
    /// for shorts. `None` without an entry price.
    #[must_use]
    pub fn floating_pnl_at(&self, price: Decimal) -> Option<Decimal> {
        let entry = self.entry_price?;
        match self.trade_side()? {
            TradeSide::Buy => Some((price - entry) * self.quantity),
            TradeSide::Sell => Some((entry - price) * self.quantity),
        }
    }
}

/// Append-only user-facing side-effect record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub account_id: i32,
    pub trade_id: Option<i64>,
    pub notification_type: String,
    pub data: JsonValue,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Pending take-profit joined to its filled parent trade, as read by the
/// level monitor each cycle.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingTakeProfitRow {
    pub level_id: i64,
    pub trade_id: i64,
    pub account_id: i32,
    pub level_number: i32,
    pub price: Decimal,
    pub shares_quantity: Decimal,
    pub symbol: String,
    pub side: String,
    pub trade_quantity: Decimal,
}

/// Active stop-loss joined to its filled parent trade, with the sum of
/// shares already executed on sibling take-profit rows.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActiveStopLossRow {
    pub level_id: i64,
    pub trade_id: i64,
    pub account_id: i32,
    pub price: Decimal,
    pub symbol: String,
    pub side: String,
    pub trade_quantity: Decimal,
    pub executed_tp_shares: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(side: &str, entry: Decimal, qty: Decimal) -> TradeRecord {
        TradeRecord {
            id: 1,
            account_id: 1,
            signal_id: None,
            symbol: "AAPL".to_string(),
            side: side.to_string(),
            quantity: qty,
            entry_price: Some(entry),
            exit_price: None,
            current_price: None,
            pnl: None,
            floating_pnl: None,
            status: "filled".to_string(),
            broker_order_id: Some("ord-1".to_string()),
            opened_at: None,
            closed_at: None,
            close_reason: None,
            link_group_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn floating_pnl_long() {
        let t = trade("BUY", dec!(10), dec!(100));
        assert_eq!(t.floating_pnl_at(dec!(11)), Some(dec!(100)));
        assert_eq!(t.floating_pnl_at(dec!(9.5)), Some(dec!(-50)));
    }

    #[test]
    fn floating_pnl_short_inverts() {
        let t = trade("SELL", dec!(10), dec!(100));
        assert_eq!(t.floating_pnl_at(dec!(9)), Some(dec!(100)));
    }

    #[test]
    fn floating_pnl_requires_entry_price() {
        let mut t = trade("BUY", dec!(10), dec!(100));
        t.entry_price = None;
        assert_eq!(t.floating_pnl_at(dec!(11)), None);
    }

    #[test]
    fn unknown_side_is_not_a_trade_side() {
        let t = trade("HOLD", dec!(10), dec!(1));
        assert!(t.trade_side().is_none());
    }
}
