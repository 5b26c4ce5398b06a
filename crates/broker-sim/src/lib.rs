//! In-memory paper brokerage.
//!
//! `SimBroker` fills every market order instantly at the posted quote, keeps
//! a running position book, and records fills for the reconciler. It backs
//! paper mode in the CLI and the engine's tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use trade_sentinel_core::{
    BrokerError, BrokerFill, BrokerGateway, BrokerOrderStatus, BrokerPosition, OrderStatusReport,
    TradeSide,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SimOrder {
    symbol: String,
    quantity: Decimal,
    price: Decimal,
    filled_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SimState {
    prices: HashMap<String, Decimal>,
    orders: HashMap<String, SimOrder>,
    fills: Vec<BrokerFill>,
    /// Net quantity per symbol; negative means short.
    positions: HashMap<String, Decimal>,
    fail_next_order: Option<String>,
}

/// Instant-fill paper brokerage.
#[derive(Debug, Default)]
pub struct SimBroker {
    state: Mutex<SimState>,
}

impl SimBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts a quote for a symbol. Orders fill at the latest posted quote.
    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        let mut state = self.state.lock().await;
        state.prices.insert(symbol.to_string(), price);
    }

    /// Makes the next `place_market_order` call fail with a transient error.
    pub async fn fail_next_order(&self, message: &str) {
        let mut state = self.state.lock().await;
        state.fail_next_order = Some(message.to_string());
    }

    /// Net position for a symbol, zero when flat.
    pub async fn position(&self, symbol: &str) -> Decimal {
        let state = self.state.lock().await;
        state.positions.get(symbol).copied().unwrap_or_default()
    }
}

#[async_trait]
impl BrokerGateway for SimBroker {
    async fn place_market_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
    ) -> Result<String, BrokerError> {
        if quantity <= Decimal::ZERO {
            return Err(BrokerError::Rejected(format!(
                "non-positive quantity {quantity} for {symbol}"
            )));
        }

        let mut state = self.state.lock().await;

        if let Some(message) = state.fail_next_order.take() {
            return Err(BrokerError::Transient(message));
        }

        let Some(price) = state.prices.get(symbol).copied() else {
            return Err(BrokerError::Rejected(format!("no quote for {symbol}")));
        };

        let order_id = Uuid::new_v4().to_string();
        let filled_at = Utc::now();

        let signed = match side {
            TradeSide::Buy => quantity,
            TradeSide::Sell => -quantity,
        };
        *state.positions.entry(symbol.to_string()).or_default() += signed;

        state.orders.insert(
            order_id.clone(),
            SimOrder { symbol: symbol.to_string(), quantity, price, filled_at },
        );
        state.fills.push(BrokerFill {
            order_id: order_id.clone(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            filled_at,
        });

        tracing::debug!(%order_id, symbol, side = side.as_str(), %quantity, %price, "Simulated fill");

        Ok(order_id)
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderStatusReport, BrokerError> {
        let state = self.state.lock().await;
        let order = state
            .orders
            .get(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;

        Ok(OrderStatusReport {
            order_id: order_id.to_string(),
            status: BrokerOrderStatus::Filled,
            filled_quantity: order.quantity,
            filled_avg_price: order.price,
            filled_at: Some(order.filled_at),
        })
    }

    async fn get_current_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Decimal>, BrokerError> {
        let state = self.state.lock().await;
        let quotes = symbols
            .iter()
            .filter_map(|symbol| {
                state
                    .prices
                    .get(symbol)
                    .map(|price| (symbol.clone(), *price))
            })
            .collect();

        Ok(quotes)
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let state = self.state.lock().await;
        let positions = state
            .positions
            .iter()
            .filter(|(_, quantity)| !quantity.is_zero())
            .map(|(symbol, quantity)| BrokerPosition {
                symbol: symbol.clone(),
                quantity: *quantity,
                current_price: state.prices.get(symbol).copied().unwrap_or_default(),
            })
            .collect();

        Ok(positions)
    }

    async fn get_filled_orders(&self) -> Result<Vec<BrokerFill>, BrokerError> {
        let state = self.state.lock().await;
        Ok(state.fills.clone())
    }
}
