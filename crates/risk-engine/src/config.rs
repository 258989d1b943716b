use std::collections::BTreeMap;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_core::InstrumentId;

/// Maximum number of commands admitted per interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: usize,
    pub interval_ms: u64,
}

impl RateLimit {
    pub fn new(limit: usize, interval_ms: u64) -> Self {
        Self { limit, interval_ms }
    }

    pub fn interval(&self) -> Duration {
        Duration::milliseconds(self.interval_ms as i64)
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(100, 1_000)
    }
}

/// Risk engine configuration
///
/// Every limit is optional; an unset limit is not checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskEngineConfig {
    /// Forward every command without checks
    pub bypass: bool,
    pub max_order_submit_rate: RateLimit,
    pub max_order_modify_rate: RateLimit,
    /// Largest quantity of a single order
    pub max_order_qty: Option<Decimal>,
    /// Largest absolute net position per instrument after the order fills
    pub max_position_size: Option<Decimal>,
    /// Largest notional of a single order, per instrument
    pub max_notional_per_order: BTreeMap<InstrumentId, Decimal>,
    /// Allowed distance of limit and trigger prices from the reference
    /// price, as a fraction (0.1 = 10%)
    pub price_band_pct: Option<Decimal>,
}

impl Default for RiskEngineConfig {
    fn default() -> Self {
        Self {
            bypass: false,
            max_order_submit_rate: RateLimit::default(),
            max_order_modify_rate: RateLimit::default(),
            max_order_qty: None,
            max_position_size: None,
            max_notional_per_order: BTreeMap::new(),
            price_band_pct: None,
        }
    }
}
