//! Rate-limited cooperative scheduler.
//!
//! Each registered process loops on its own cadence inside one tokio task.
//! Before every cycle the process's sliding one-minute API budget is
//! checked; a cycle that would blow the budget is skipped entirely rather
//! than run partially. Cycles are bounded by a timeout, failures are
//! isolated per process, and shutdown drains in-flight cycles.

pub mod process;
pub mod scheduler;
pub mod tracker;

pub use process::{ProcessConfig, ProcessMetrics, ProcessStatus};
pub use scheduler::{ProcessScheduler, TaskFuture};
pub use tracker::ApiCallTracker;
