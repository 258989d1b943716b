use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::identifiers::InstrumentId;
use crate::values::{Price, Quantity, Timestamp};

/// Book granularity a venue provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookType {
    /// Top of book only
    L1,
    /// Aggregated price levels
    L2,
    /// Individual orders
    L3,
}

/// Order book level (price + quantity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Quantity,
}

impl BookLevel {
    pub fn new(price: Price, quantity: Quantity) -> Self {
        Self { price, quantity }
    }

    /// Check if this level should be removed (quantity == 0)
    pub fn is_removed(&self) -> bool {
        self.quantity.is_zero()
    }
}

/// Snapshot of the top N levels on each side
///
/// Bids are sorted best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookDepth {
    pub instrument_id: InstrumentId,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub sequence: u64,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

impl OrderBookDepth {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn depth(&self) -> usize {
        self.bids.len().max(self.asks.len())
    }

    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    /// Copy limited to the top `depth` levels per side
    pub fn truncated(&self, depth: usize) -> Self {
        Self {
            bids: self.bids.iter().take(depth).cloned().collect(),
            asks: self.asks.iter().take(depth).cloned().collect(),
            ..self.clone()
        }
    }
}
