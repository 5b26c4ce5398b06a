use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Version stamped into every stored notification payload so readers can
/// evolve the schema without guessing at shapes.
pub const NOTIFICATION_SCHEMA_VERSION: u16 = 1;

/// User-facing side-effect record. One variant per notification type; the
/// tag doubles as the `notification_type` column in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    TradeFilled {
        symbol: String,
        fill_price: Decimal,
        quantity: Decimal,
    },
    TradeCancelled {
        symbol: String,
        reason: String,
    },
    TakeProfitExecuted {
        symbol: String,
        level_number: i32,
        executed_price: Decimal,
        quantity: Decimal,
        broker_order_id: String,
    },
    StopLossExecuted {
        symbol: String,
        executed_price: Decimal,
        total_quantity: Decimal,
        broker_order_id: String,
        closing_trade_id: i64,
    },
    /// User-supplied level overrides recorded before the trade fills; the
    /// level materializer reads the latest one back at fill time.
    CustomLevelsPending {
        targets: Vec<crate::signal::TargetSpec>,
    },
}

impl NotificationPayload {
    /// Stable tag used as the `notification_type` column.
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::TradeFilled { .. } => "trade_filled",
            Self::TradeCancelled { .. } => "trade_cancelled",
            Self::TakeProfitExecuted { .. } => "take_profit_executed",
            Self::StopLossExecuted { .. } => "stop_loss_executed",
            Self::CustomLevelsPending { .. } => "custom_levels_pending",
        }
    }
}

/// Payload plus schema version, the exact JSON shape written to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub schema_version: u16,
    #[serde(flatten)]
    pub payload: NotificationPayload,
}

impl NotificationEnvelope {
    #[must_use]
    pub const fn new(payload: NotificationPayload) -> Self {
        Self { schema_version: NOTIFICATION_SCHEMA_VERSION, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payload_serializes_with_type_tag_and_version() {
        let envelope = NotificationEnvelope::new(NotificationPayload::TakeProfitExecuted {
            symbol: "AAPL".to_string(),
            level_number: 2,
            executed_price: dec!(187.50),
            quantity: dec!(25),
            broker_order_id: "ord-99".to_string(),
        });

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "take_profit_executed");
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["level_number"], 2);
    }

    #[test]
    fn type_tag_matches_serde_tag() {
        let payload = NotificationPayload::StopLossExecuted {
            symbol: "TSLA".to_string(),
            executed_price: dec!(9),
            total_quantity: dec!(50),
            broker_order_id: "ord-1".to_string(),
            closing_trade_id: 7,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], payload.type_tag());
    }

    #[test]
    fn custom_levels_round_trip() {
        let envelope = NotificationEnvelope::new(NotificationPayload::CustomLevelsPending {
            targets: vec![crate::signal::TargetSpec { price: dec!(12), percentage: Some(dec!(40)) }],
        });
        let json = serde_json::to_string(&envelope).unwrap();
        let back: NotificationEnvelope = serde_json::from_str(&json).unwrap();

        match back.payload {
            NotificationPayload::CustomLevelsPending { targets } => {
                assert_eq!(targets.len(), 1);
                assert_eq!(targets[0].percentage, Some(dec!(40)));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
