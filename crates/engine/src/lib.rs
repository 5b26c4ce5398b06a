//! Post-fill trade management.
//!
//! Four cooperating components, each run on its own cadence by the
//! scheduler:
//! - [`lifecycle::TradeLifecycle`] polls pending brokerage orders and
//!   materializes exit levels when fills land
//! - [`monitor::LevelMonitor`] samples prices and decides which levels fire
//! - [`executor::LevelExecutor`] turns a fired level into a brokerage order
//!   plus a transactional state change
//! - [`reconciler::PnlReconciler`] recomputes realized P&L from the broker's
//!   fill history
//!
//! The store is the single source of truth: every cycle re-reads live rows,
//! so a restart needs no recovery step.

pub mod executor;
pub mod lifecycle;
pub mod monitor;
pub mod reconciler;

pub use executor::{
    plan_stop_loss_cascade, plan_take_profit_outcome, LevelExecutor, StopLossCascade,
    TakeProfitOutcome, TradeClose,
};
pub use lifecycle::{plan_materialization, MaterializationPlan, TradeLifecycle};
pub use monitor::{plan_triggers, LevelMonitor, TriggerAction};
pub use reconciler::PnlReconciler;
