use tessera_cache::CacheError;
use tessera_common::BusError;
use tessera_core::{AccountError, ClientId, ClientOrderId, InstrumentId, OrderError, PositionError};
use tessera_ports::ClientError;
use thiserror::Error;

/// Execution engine errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No execution client for {0}")]
    NoClient(String),

    #[error("Execution client {0} already registered")]
    DuplicateClient(ClientId),

    #[error("Order not found: {0}")]
    OrderNotFound(ClientOrderId),

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(InstrumentId),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
