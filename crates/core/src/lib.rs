pub mod allocation;
pub mod broker;
pub mod config;
pub mod config_loader;
pub mod fifo;
pub mod levels;
pub mod notification;
pub mod signal;
pub mod types;

pub use allocation::{allocate_levels, LevelAllocation};
pub use broker::{
    BrokerError, BrokerFill, BrokerGateway, BrokerOrderStatus, BrokerPosition, OrderStatusReport,
};
pub use config::{AppConfig, BrokerConfig, DatabaseConfig, ProcessesConfig};
pub use config_loader::ConfigLoader;
pub use fifo::{match_fills, FifoReport};
pub use notification::{NotificationEnvelope, NotificationPayload, NOTIFICATION_SCHEMA_VERSION};
pub use signal::{SignalView, TargetSpec};
pub use types::{CloseReason, LevelStatus, StopLossStatus, TradeSide, TradeStatus};
