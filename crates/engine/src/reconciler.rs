use std::sync::Arc;

use anyhow::Result;
use trade_sentinel_core::{match_fills, BrokerGateway, FifoReport};
use trade_sentinel_data::TradeRepository;

/// Recomputes realized P&L from the broker's full fill history.
///
/// The broker's record is treated as ground truth: each run rebuilds the
/// FIFO matching from scratch and overwrites stored per-sell P&L, so a
/// missed cycle or a restart never leaves stale numbers behind.
pub struct PnlReconciler {
    trades: TradeRepository,
    broker: Arc<dyn BrokerGateway>,
}

impl PnlReconciler {
    #[must_use]
    pub fn new(trades: TradeRepository, broker: Arc<dyn BrokerGateway>) -> Self {
        Self { trades, broker }
    }

    /// Runs one reconciliation pass and returns the broker API calls made.
    ///
    /// # Errors
    /// Returns an error if the store rejects an update.
    pub async fn reconcile(&self) -> Result<u32> {
        if let Some(report) = self.recompute().await? {
            tracing::info!(
                total_pnl = %report.total_pnl,
                win_rate = report.win_rate,
                winning = report.winning_matches,
                losing = report.losing_matches,
                "Reconciliation complete"
            );
        }
        Ok(1)
    }

    /// Rebuilds and applies the FIFO report, or `None` when the broker's
    /// fill history is temporarily unavailable.
    ///
    /// # Errors
    /// Returns an error if the store rejects an update.
    pub async fn recompute(&self) -> Result<Option<FifoReport>> {
        let fills = match self.broker.get_filled_orders().await {
            Ok(fills) => fills,
            Err(e) => {
                tracing::warn!(error = %e, "Fill history unavailable, skipping reconciliation");
                return Ok(None);
            }
        };

        let report = match_fills(&fills);
        self.apply(&report).await?;
        Ok(Some(report))
    }

    async fn apply(&self, report: &FifoReport) -> Result<()> {
        for (order_id, pnl) in &report.sell_order_pnl {
            let touched = self.trades.set_realized_pnl_by_order(order_id, *pnl).await?;
            if touched == 0 {
                tracing::debug!(%order_id, "Fill has no matching trade row");
            }
        }
        Ok(())
    }
}
