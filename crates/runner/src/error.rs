use tessera_cache::CacheError;
use tessera_common::ComponentError;
use tessera_core::{InstrumentId, Venue};
use tessera_data::DataEngineError;
use tessera_exchange_sim::ExchangeError;
use tessera_execution::ExecutionError;
use tessera_risk::RiskError;
use tessera_strategy::StrategyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Venue {0} already added")]
    DuplicateVenue(Venue),

    #[error("Venue {0} not added")]
    VenueNotFound(Venue),

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(InstrumentId),

    #[error("Backtest already run; call reset() first")]
    AlreadyRun,

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Data engine error: {0}")]
    Data(#[from] DataEngineError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum LiveNodeError {
    #[error("Client for venue {0} already added")]
    DuplicateClient(Venue),

    #[error("Node is already running")]
    AlreadyRunning,

    #[error("Inbound channel closed")]
    ChannelClosed,

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Data engine error: {0}")]
    Data(#[from] DataEngineError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("Component error: {0}")]
    Component(#[from] ComponentError),
}
