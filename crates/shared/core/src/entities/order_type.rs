use serde::{Deserialize, Serialize};

/// Order types supported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Execute at current market price
    Market,
    /// Execute at specified price or better
    Limit,
    /// Market order triggered when price reaches trigger price
    StopMarket,
    /// Limit order triggered when price reaches trigger price
    StopLimit,
}

impl OrderType {
    pub fn has_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn has_trigger(&self) -> bool {
        matches!(self, OrderType::StopMarket | OrderType::StopLimit)
    }
}
