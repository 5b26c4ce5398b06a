use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use sqlx::PgPool;
use trade_sentinel_core::{SignalView, TargetSpec, TradeSide};

/// Read-only access to the signals a trade originated from.
///
/// Signal ingestion and parsing live upstream; this engine only reads the
/// stored result back when a fill needs its exit levels.
#[derive(Debug, Clone)]
pub struct SignalRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SignalRow {
    symbol: String,
    action: String,
    stop_loss: Option<Decimal>,
    take_profit: Option<Decimal>,
    enhanced_data: Option<serde_json::Value>,
}

impl SignalRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Signal view for the trade, or `None` when the trade has no signal.
    ///
    /// Multi-target ladders live in the signal's enhanced data; a bare
    /// `take_profit` price becomes a single-target ladder.
    ///
    /// # Errors
    /// Returns an error if the query fails or the stored signal is invalid.
    pub async fn view_for_trade(&self, trade_id: i64) -> Result<Option<SignalView>> {
        let row = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT s.symbol, s.action, s.stop_loss, s.take_profit, s.enhanced_data
            FROM signals s
            JOIN trades t ON t.signal_id = s.id
            WHERE t.id = $1
            "#,
        )
        .bind(trade_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch signal for trade")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let side = TradeSide::parse(&row.action)
            .ok_or_else(|| anyhow!("Unknown signal action: {}", row.action))?;

        let targets = match row
            .enhanced_data
            .as_ref()
            .and_then(|data| data.get("targets"))
        {
            Some(raw) => serde_json::from_value::<Vec<TargetSpec>>(raw.clone())
                .context("Invalid targets in signal enhanced data")?,
            None => row
                .take_profit
                .map(|price| TargetSpec { price, percentage: None })
                .into_iter()
                .collect(),
        };

        Ok(Some(SignalView {
            symbol: row.symbol,
            side,
            stop_loss: row.stop_loss,
            targets,
        }))
    }
}
