use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::TradeSide;

/// One take-profit target suggested by a signal or supplied by the user.
///
/// `percentage` is the share of the position to exit at this target; when
/// omitted, targets are split equally at materialization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub price: Decimal,
    #[serde(default)]
    pub percentage: Option<Decimal>,
}

/// Read-only view of the signal that originated a trade, consumed exactly
/// once when the trade fills and its levels are materialized. Produced
/// upstream by ingestion/parsing, which is outside this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalView {
    pub symbol: String,
    pub side: TradeSide,
    pub stop_loss: Option<Decimal>,
    pub targets: Vec<TargetSpec>,
}
