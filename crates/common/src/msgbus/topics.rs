//! Topic and endpoint names
//!
//! Logical names keep routing readable in logs and make wildcard
//! subscriptions (`data.quotes.SIM.*`, `events.order.*`) predictable.

use tessera_core::data::{BarType, Data, DataType};
use tessera_core::{AccountId, InstrumentId, StrategyId, Venue};

/// Publish/subscribe topics
pub struct Topics;

impl Topics {
    // Market data (DataEngine → strategies, venues)

    /// Quote ticks for an instrument: `data.quotes.SIM.BTCUSDT`
    pub fn quotes(instrument_id: &InstrumentId) -> String {
        format!("data.quotes.{}.{}", instrument_id.venue, instrument_id.symbol)
    }

    /// Trade ticks for an instrument: `data.trades.SIM.BTCUSDT`
    pub fn trades(instrument_id: &InstrumentId) -> String {
        format!("data.trades.{}.{}", instrument_id.venue, instrument_id.symbol)
    }

    /// Bars of one bar type: `data.bars.BTCUSDT.SIM-1-MINUTE-LAST-INTERNAL`
    pub fn bars(bar_type: &BarType) -> String {
        format!("data.bars.{bar_type}")
    }

    /// Order book depth snapshots: `data.book.depth.SIM.BTCUSDT`
    pub fn depth(instrument_id: &InstrumentId) -> String {
        format!(
            "data.book.depth.{}.{}",
            instrument_id.venue, instrument_id.symbol
        )
    }

    /// Instrument definitions: `data.instrument.SIM.BTCUSDT`
    pub fn instrument(instrument_id: &InstrumentId) -> String {
        format!(
            "data.instrument.{}.{}",
            instrument_id.venue, instrument_id.symbol
        )
    }

    /// Every instrument of a venue: `data.instrument.SIM.*`
    pub fn instruments(venue: &Venue) -> String {
        format!("data.instrument.{venue}.*")
    }

    /// Topic a data point is published under
    pub fn for_data(data: &Data) -> String {
        match data {
            Data::Instrument(instrument) => Self::instrument(&instrument.id),
            Data::Depth(depth) => Self::depth(&depth.instrument_id),
            Data::Quote(quote) => Self::quotes(&quote.instrument_id),
            Data::Trade(trade) => Self::trades(&trade.instrument_id),
            Data::Bar(bar) => Self::bars(&bar.bar_type),
        }
    }

    /// Topic (or pattern) a subscription to `data_type` listens on
    pub fn for_data_type(data_type: &DataType) -> String {
        match data_type {
            DataType::Instrument(id) => Self::instrument(id),
            DataType::Instruments(venue) => Self::instruments(venue),
            DataType::QuoteTicks(id) => Self::quotes(id),
            DataType::TradeTicks(id) => Self::trades(id),
            DataType::Bars(bar_type) => Self::bars(bar_type),
            DataType::OrderBookDepth { instrument_id, .. } => Self::depth(instrument_id),
        }
    }

    // Events (ExecEngine → strategies, portfolio)

    /// Order events of one strategy: `events.order.S-001`
    pub fn order_events(strategy_id: &StrategyId) -> String {
        format!("events.order.{strategy_id}")
    }

    /// Position events of one strategy: `events.position.S-001`
    pub fn position_events(strategy_id: &StrategyId) -> String {
        format!("events.position.{strategy_id}")
    }

    /// Account state updates: `events.account.SIM-001`
    pub fn account_events(account_id: &AccountId) -> String {
        format!("events.account.{account_id}")
    }

    /// Subscribe to every emitted event: `events.*`
    pub const EVENTS_ALL: &'static str = "events.*";
}

/// Point-to-point endpoint addresses
pub struct Endpoints;

impl Endpoints {
    /// Data commands into the data engine
    pub const DATA_ENGINE_EXECUTE: &'static str = "DataEngine.execute";

    /// Data from clients into the data engine
    pub const DATA_ENGINE_PROCESS: &'static str = "DataEngine.process";

    /// Historical data responses from clients
    pub const DATA_ENGINE_RESPONSE: &'static str = "DataEngine.response";

    /// Order commands that already passed risk
    pub const EXEC_ENGINE_EXECUTE: &'static str = "ExecEngine.execute";

    /// Order events and reports from clients
    pub const EXEC_ENGINE_PROCESS: &'static str = "ExecEngine.process";

    /// Order commands from strategies
    pub const RISK_ENGINE_EXECUTE: &'static str = "RiskEngine.execute";
}
