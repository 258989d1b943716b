use serde::{Deserialize, Serialize};
use tessera_common::LoggingConfig;
use tessera_core::TraderId;
use tessera_data::DataEngineConfig;
use tessera_exchange_sim::SimulatedVenueConfig;
use tessera_execution::ExecEngineConfig;
use tessera_matching::FillModelConfig;
use tessera_risk::RiskEngineConfig;

/// Backtest engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestEngineConfig {
    pub trader_id: TraderId,
    /// Seed given to every venue fill model that has none of its own
    pub seed: u64,
    /// Fill model applied to every venue, replacing the venue's own
    pub fill_model: Option<FillModelConfig>,
    /// Venues created when the engine is built
    pub venues: Vec<SimulatedVenueConfig>,
    pub risk: RiskEngineConfig,
    pub exec: ExecEngineConfig,
    pub data: DataEngineConfig,
    /// Install a logger at this level; `None` leaves logging to the caller
    pub log_level: Option<String>,
}

impl Default for BacktestEngineConfig {
    fn default() -> Self {
        Self {
            trader_id: TraderId::new("BACKTESTER-001"),
            seed: 42,
            fill_model: None,
            venues: Vec::new(),
            risk: RiskEngineConfig::default(),
            exec: ExecEngineConfig::default(),
            data: DataEngineConfig::default(),
            log_level: None,
        }
    }
}

/// Live node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveNodeConfig {
    pub trader_id: TraderId,
    /// Capacity of the adapters → node channel
    pub inbound_capacity: usize,
    /// Capacity of each node → adapter command channel
    pub command_capacity: usize,
    /// Longest the event loop sleeps without a pending timer, in milliseconds
    pub idle_ms: u64,
    pub risk: RiskEngineConfig,
    pub exec: ExecEngineConfig,
    pub data: DataEngineConfig,
    pub logging: Option<LoggingConfig>,
}

impl Default for LiveNodeConfig {
    fn default() -> Self {
        Self {
            trader_id: TraderId::new("TRADER-001"),
            inbound_capacity: 10_000,
            command_capacity: 1_000,
            idle_ms: 100,
            risk: RiskEngineConfig::default(),
            exec: ExecEngineConfig::default(),
            data: DataEngineConfig::default(),
            logging: None,
        }
    }
}

impl LiveNodeConfig {
    pub fn idle(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.idle_ms)
    }
}
