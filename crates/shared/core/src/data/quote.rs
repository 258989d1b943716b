use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::identifiers::InstrumentId;
use crate::values::{Price, Quantity, Timestamp};

/// Top-of-book quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTick {
    pub instrument_id: InstrumentId,
    pub bid_price: Price,
    pub ask_price: Price,
    pub bid_size: Quantity,
    pub ask_size: Quantity,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

impl QuoteTick {
    pub fn new(
        instrument_id: InstrumentId,
        bid_price: Price,
        ask_price: Price,
        bid_size: Quantity,
        ask_size: Quantity,
        ts: Timestamp,
    ) -> Self {
        Self {
            instrument_id,
            bid_price,
            ask_price,
            bid_size,
            ask_size,
            ts_event: ts,
            ts_init: ts,
        }
    }

    pub fn mid_price(&self) -> Price {
        (self.bid_price + self.ask_price) / Decimal::TWO
    }

    pub fn spread(&self) -> Price {
        self.ask_price - self.bid_price
    }
}
