use tessera_core::InstrumentId;
use thiserror::Error;

/// Errors raised while building or feeding a matching engine
///
/// Venue-side rejections are not errors: they come back as
/// `OrderRejected`, `OrderCancelRejected` or `OrderModifyRejected` events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchingError {
    #[error("Invalid probability for {name}: {value} (must be within 0.0..=1.0)")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("Instrument mismatch: engine trades {expected}, received {received}")]
    InstrumentMismatch {
        expected: InstrumentId,
        received: InstrumentId,
    },
}

pub type Result<T> = std::result::Result<T, MatchingError>;
