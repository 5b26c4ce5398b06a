use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::TradeSide;

/// Errors surfaced by a broker gateway, split by how the engine reacts.
///
/// `Transient` failures are retried on the next scheduled cycle and never
/// escalate to a state change. `Rejected` means the broker refused the order;
/// the affected trade or level is left unchanged for retry or manual
/// intervention. `OrderNotFound` is treated as a data-consistency guard and
/// handled as a no-op by callers.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("transient broker error: {0}")]
    Transient(String),
    #[error("order rejected by broker: {0}")]
    Rejected(String),
    #[error("order not found: {0}")]
    OrderNotFound(String),
}

/// Broker-side status of a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerOrderStatus {
    Accepted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl BrokerOrderStatus {
    /// True for states the engine maps to a cancelled trade.
    #[must_use]
    pub const fn is_dead(self) -> bool {
        matches!(self, Self::Cancelled | Self::Rejected | Self::Expired)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

/// Point-in-time view of one order, as reported by the broker.
#[derive(Debug, Clone)]
pub struct OrderStatusReport {
    pub order_id: String,
    pub status: BrokerOrderStatus,
    pub filled_quantity: Decimal,
    pub filled_avg_price: Decimal,
    pub filled_at: Option<DateTime<Utc>>,
}

/// One position held at the broker.
#[derive(Debug, Clone)]
pub struct BrokerPosition {
    pub symbol: String,
    pub quantity: Decimal,
    pub current_price: Decimal,
}

/// One filled order from the broker's execution history.
#[derive(Debug, Clone)]
pub struct BrokerFill {
    pub order_id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub filled_at: DateTime<Utc>,
}

/// Capability contract the engine requires from a brokerage.
///
/// The engine never talks to a broker API directly; everything goes through
/// this trait so live, paper, and test gateways are interchangeable.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Submits a market order and returns the broker-assigned order id.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
    ) -> Result<String, BrokerError>;

    /// Fetches the current status of a previously submitted order.
    async fn get_order_status(&self, order_id: &str) -> Result<OrderStatusReport, BrokerError>;

    /// Batch price lookup. Best-effort per symbol: symbols the broker cannot
    /// quote are simply absent from the map, never an error.
    async fn get_current_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Decimal>, BrokerError>;

    /// Lists currently held positions.
    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// Full filled-order history, used by the P&L reconciler.
    async fn get_filled_orders(&self) -> Result<Vec<BrokerFill>, BrokerError>;
}
