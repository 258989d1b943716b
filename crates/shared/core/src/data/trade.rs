use serde::{Deserialize, Serialize};

use crate::entities::AggressorSide;
use crate::identifiers::{InstrumentId, TradeId};
use crate::values::{Price, Quantity, Timestamp};

/// Public trade print from a venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub instrument_id: InstrumentId,
    pub price: Price,
    pub size: Quantity,
    pub aggressor_side: AggressorSide,
    pub trade_id: TradeId,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

impl TradeTick {
    pub fn new(
        instrument_id: InstrumentId,
        price: Price,
        size: Quantity,
        aggressor_side: AggressorSide,
        trade_id: TradeId,
        ts: Timestamp,
    ) -> Self {
        Self {
            instrument_id,
            price,
            size,
            aggressor_side,
            trade_id,
            ts_event: ts,
            ts_init: ts,
        }
    }
}
