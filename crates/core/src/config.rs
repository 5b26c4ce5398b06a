use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    pub processes: ProcessesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// `paper` runs against the simulated gateway; a live gateway is wired in
    /// by the deployment.
    pub mode: String,
}

/// Intervals and per-minute API budgets for the scheduled processes,
/// mirroring the engine's default cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessesConfig {
    pub trade_sync_interval_secs: u64,
    pub trade_sync_api_budget: u32,
    pub level_monitor_interval_secs: u64,
    pub level_monitor_api_budget: u32,
    pub price_update_interval_secs: u64,
    pub price_update_api_budget: u32,
    pub reconcile_interval_secs: u64,
    pub reconcile_api_budget: u32,
    pub task_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/trade_sentinel".to_string(),
                max_connections: 10,
            },
            broker: BrokerConfig { mode: "paper".to_string() },
            processes: ProcessesConfig::default(),
        }
    }
}

impl Default for ProcessesConfig {
    fn default() -> Self {
        Self {
            trade_sync_interval_secs: 30,
            trade_sync_api_budget: 60,
            level_monitor_interval_secs: 5,
            level_monitor_api_budget: 60,
            price_update_interval_secs: 10,
            price_update_api_budget: 30,
            reconcile_interval_secs: 60,
            reconcile_api_budget: 20,
            task_timeout_secs: 30,
        }
    }
}
