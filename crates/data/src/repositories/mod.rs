pub mod level_repo;
pub mod notification_repo;
pub mod signal_repo;
pub mod trade_repo;

pub use level_repo::LevelRepository;
pub use notification_repo::NotificationRepository;
pub use signal_repo::SignalRepository;
pub use trade_repo::TradeRepository;
