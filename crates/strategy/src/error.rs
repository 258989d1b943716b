use tessera_common::{BusError, ComponentError};
use tessera_core::{OrderError, StrategyId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Strategy {0} already registered")]
    DuplicateStrategy(StrategyId),

    #[error("Strategy {0} not found")]
    StrategyNotFound(StrategyId),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Component error: {0}")]
    Component(#[from] ComponentError),
}

pub type Result<T> = std::result::Result<T, StrategyError>;
