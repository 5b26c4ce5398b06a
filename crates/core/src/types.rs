use serde::{Deserialize, Serialize};

/// Direction of the opening order for a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// The side used to exit a position opened on this side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    /// Parses the stored string form, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// Lifecycle state of a trade. Transitions are one-directional:
/// `Pending -> Filled -> Closed`, or `Pending -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Pending,
    Filled,
    Closed,
    Cancelled,
}

impl TradeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Filled => "filled",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

/// State of a take-profit level. `Pending` is the only live state; every
/// other state is terminal and never reactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelStatus {
    Pending,
    Executed,
    Cancelled,
    CancelledBySellAll,
}

impl LevelStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executed => "executed",
            Self::Cancelled => "cancelled",
            Self::CancelledBySellAll => "cancelled_by_sell_all",
        }
    }
}

/// State of a stop-loss level. `Active` is the only live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopLossStatus {
    Active,
    Executed,
    Cancelled,
    CancelledBySellAll,
}

impl StopLossStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Executed => "executed",
            Self::Cancelled => "cancelled",
            Self::CancelledBySellAll => "cancelled_by_sell_all",
        }
    }
}

/// Well-known close reasons recorded on trade rows.
pub struct CloseReason;

impl CloseReason {
    pub const STOP_LOSS: &'static str = "stop_loss";
    pub const ALL_TARGETS_HIT: &'static str = "all_targets_hit";
}
