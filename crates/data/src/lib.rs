//! Postgres store for the trade-management engine.
//!
//! This crate provides:
//! - `Database` connection wrapper
//! - Row models for trades, exit levels, and notifications
//! - Repositories for typed table access
//!
//! The store is the sole source of truth; monitoring components re-read live
//! rows every cycle instead of caching them.

pub mod database;
pub mod models;
pub mod repositories;

pub use database::Database;

pub use models::{ActiveStopLossRow, NotificationRecord, PendingTakeProfitRow, TradeRecord};

pub use repositories::{
    LevelRepository, NotificationRepository, SignalRepository, TradeRepository,
};
