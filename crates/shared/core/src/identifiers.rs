//! Identifier newtypes
//!
//! Every identifier is a thin wrapper over `String` so they cannot be mixed up
//! at call sites (a `TradeId` is never accepted where a `ClientOrderId` is due).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_identifier!(
    /// Identifies the trader instance (one per node)
    TraderId
);
string_identifier!(
    /// Identifies a strategy within a trader
    StrategyId
);
string_identifier!(
    /// Identifies a data or execution client
    ClientId
);
string_identifier!(
    /// Identifies an account at a venue
    AccountId
);
string_identifier!(
    /// Client-assigned order id, unique for the lifetime of the cache
    ClientOrderId
);
string_identifier!(
    /// Venue-assigned order id
    VenueOrderId
);
string_identifier!(
    /// Venue-assigned trade (execution) id
    TradeId
);
string_identifier!(
    /// Key grouping fills into one net exposure
    PositionId
);
string_identifier!(
    /// Trading venue (exchange) name
    Venue
);

impl TraderId {
    /// Tag after the last '-' (e.g. "TESTER-001" -> "001")
    pub fn tag(&self) -> &str {
        self.0.rsplit('-').next().unwrap_or(&self.0)
    }
}

impl StrategyId {
    /// Tag after the last '-' (e.g. "EMACross-001" -> "001")
    pub fn tag(&self) -> &str {
        self.0.rsplit('-').next().unwrap_or(&self.0)
    }
}

impl AccountId {
    /// Account ids are formatted `{VENUE}-{number}`
    pub fn venue(&self) -> Venue {
        Venue::new(self.0.split('-').next().unwrap_or(&self.0))
    }
}

/// Unique identifier for an instrument: `{symbol}.{venue}`
///
/// This provides a stable reference to an instrument that can be stored
/// in orders and used as map keys, without copying the full instrument spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentId {
    pub symbol: String,
    pub venue: Venue,
}

impl InstrumentId {
    pub fn new(symbol: impl Into<String>, venue: impl Into<Venue>) -> Self {
        Self {
            symbol: symbol.into(),
            venue: venue.into(),
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.venue)
    }
}

impl FromStr for InstrumentId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((symbol, venue)) if !symbol.is_empty() && !venue.is_empty() => {
                Ok(Self::new(symbol, venue))
            }
            _ => Err(IdentifierError::InvalidInstrumentId(s.to_string())),
        }
    }
}

impl TryFrom<String> for InstrumentId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstrumentId> for String {
    fn from(value: InstrumentId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_id_roundtrips_through_display() {
        let id: InstrumentId = "BTCUSDT.SIM".parse().unwrap();
        assert_eq!(id.symbol, "BTCUSDT");
        assert_eq!(id.venue, Venue::new("SIM"));
        assert_eq!(id.to_string(), "BTCUSDT.SIM");
    }

    #[test]
    fn test_instrument_id_symbol_may_contain_dots() {
        let id: InstrumentId = "ES.FUT.GLBX".parse().unwrap();
        assert_eq!(id.symbol, "ES.FUT");
        assert_eq!(id.venue.as_str(), "GLBX");
    }

    #[test]
    fn test_instrument_id_serializes_as_string() {
        let id = InstrumentId::new("BTCUSDT", "SIM");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"BTCUSDT.SIM\"");
        assert_eq!(serde_json::from_str::<InstrumentId>(&json).unwrap(), id);
    }

    #[test]
    fn test_instrument_id_rejects_missing_venue() {
        assert!("BTCUSDT".parse::<InstrumentId>().is_err());
        assert!("BTCUSDT.".parse::<InstrumentId>().is_err());
    }

    #[test]
    fn test_tags() {
        assert_eq!(TraderId::new("TESTER-001").tag(), "001");
        assert_eq!(StrategyId::new("Scalper-002").tag(), "002");
        assert_eq!(AccountId::new("SIM-001").venue(), Venue::new("SIM"));
    }
}
