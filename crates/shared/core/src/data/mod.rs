//! Market data types
//!
//! `Data` is the closed set of market data the kernel routes. Every variant
//! carries `ts_event`/`ts_init`, so streams can be merged and ordered without
//! inspecting the concrete type.

mod bar;
mod depth;
mod quote;
mod trade;

use serde::{Deserialize, Serialize};

pub use bar::{AggregationSource, Bar, BarAggregation, BarSpecification, BarType, PriceType};
pub use depth::{BookLevel, BookType, OrderBookDepth};
pub use quote::QuoteTick;
pub use trade::TradeTick;

use crate::identifiers::{InstrumentId, Venue};
use crate::instruments::Instrument;
use crate::values::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Data {
    Instrument(Box<Instrument>),
    Depth(OrderBookDepth),
    Quote(QuoteTick),
    Trade(TradeTick),
    Bar(Bar),
}

impl Data {
    pub fn instrument_id(&self) -> &InstrumentId {
        match self {
            Data::Instrument(i) => &i.id,
            Data::Depth(d) => &d.instrument_id,
            Data::Quote(q) => &q.instrument_id,
            Data::Trade(t) => &t.instrument_id,
            Data::Bar(b) => &b.bar_type.instrument_id,
        }
    }

    pub fn ts_event(&self) -> Timestamp {
        match self {
            Data::Instrument(i) => i.ts_event,
            Data::Depth(d) => d.ts_event,
            Data::Quote(q) => q.ts_event,
            Data::Trade(t) => t.ts_event,
            Data::Bar(b) => b.ts_event,
        }
    }

    pub fn ts_init(&self) -> Timestamp {
        match self {
            Data::Instrument(i) => i.ts_init,
            Data::Depth(d) => d.ts_init,
            Data::Quote(q) => q.ts_init,
            Data::Trade(t) => t.ts_init,
            Data::Bar(b) => b.ts_init,
        }
    }

    /// Processing order for data sharing a timestamp and instrument
    pub fn kind_rank(&self) -> u8 {
        match self {
            Data::Instrument(_) => 0,
            Data::Depth(_) => 1,
            Data::Quote(_) => 2,
            Data::Trade(_) => 3,
            Data::Bar(_) => 4,
        }
    }
}

/// Subscription key: what a data client is asked to stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Instrument(InstrumentId),
    Instruments(Venue),
    QuoteTicks(InstrumentId),
    TradeTicks(InstrumentId),
    Bars(BarType),
    OrderBookDepth { instrument_id: InstrumentId, depth: usize },
}

impl DataType {
    /// Venue owning the data, used for client routing
    pub fn venue(&self) -> &Venue {
        match self {
            DataType::Instrument(id)
            | DataType::QuoteTicks(id)
            | DataType::TradeTicks(id)
            | DataType::OrderBookDepth {
                instrument_id: id, ..
            } => &id.venue,
            DataType::Instruments(venue) => venue,
            DataType::Bars(bar_type) => &bar_type.instrument_id.venue,
        }
    }
}
