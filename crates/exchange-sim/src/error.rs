use tessera_core::{InstrumentId, Venue};
use tessera_matching::MatchingError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Instrument {instrument_id} does not trade on venue {venue}")]
    WrongVenue { instrument_id: InstrumentId, venue: Venue },

    #[error("Instrument {0} already added")]
    DuplicateInstrument(InstrumentId),

    #[error("Instrument {0} not found")]
    InstrumentNotFound(InstrumentId),

    #[error("Matching error: {0}")]
    Matching(#[from] MatchingError),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
