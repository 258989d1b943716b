use serde::{Deserialize, Serialize};

/// Venue behaviour switches for a matching engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingEngineConfig {
    /// Move the L1 book with external bars (open, high, low, close)
    pub bar_execution: bool,
    /// Move the L1 book with trade ticks
    pub trade_execution: bool,
    /// Reject stop orders whose trigger is already in the market
    pub reject_stop_orders: bool,
    /// Reject reduce-only orders that would increase the position
    pub use_reduce_only: bool,
}

impl Default for MatchingEngineConfig {
    fn default() -> Self {
        Self {
            bar_execution: true,
            trade_execution: true,
            reject_stop_orders: true,
            use_reduce_only: true,
        }
    }
}
