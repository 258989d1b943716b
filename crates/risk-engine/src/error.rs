use tessera_cache::CacheError;
use tessera_common::BusError;
use thiserror::Error;

/// Risk engine errors
///
/// Failed checks are not errors; they surface as `OrderDenied` or
/// `OrderModifyRejected` events.
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

pub type Result<T> = std::result::Result<T, RiskError>;
