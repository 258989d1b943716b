use tessera_cache::CacheError;
use tessera_common::BusError;
use tessera_core::ClientId;
use tessera_ports::{ClientError, ClockError};
use thiserror::Error;

/// Data engine errors
#[derive(Error, Debug)]
pub enum DataEngineError {
    #[error("No data client for {0}")]
    NoClient(String),

    #[error("Data client {0} already registered")]
    DuplicateClient(ClientId),

    #[error("Invalid bar type for internal aggregation: {0}")]
    InvalidBarType(String),

    #[error("Invalid request range: start={start}, end={end}, now={now}")]
    InvalidRequestRange {
        start: String,
        end: String,
        now: String,
    },

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

pub type Result<T> = std::result::Result<T, DataEngineError>;
