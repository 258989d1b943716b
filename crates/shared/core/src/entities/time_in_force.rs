use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time-in-force instructions for order validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Immediate or Cancel: execute immediately (partially or fully) and cancel unfilled portion
    IOC,

    /// Fill or Kill: execute immediately and completely, or cancel entire order
    FOK,

    /// Good Till Canceled: order remains active until explicitly canceled
    GTC,

    /// Good Till Date: order remains active until the specified datetime
    GTD(DateTime<Utc>),

    /// Day order: automatically expired at the end of the UTC trading day it was accepted in
    DAY,
}

impl TimeInForce {
    /// Check if the order has expired based on current time
    pub fn is_expired(&self, current_time: DateTime<Utc>, day_end: Option<DateTime<Utc>>) -> bool {
        match self {
            TimeInForce::GTD(expiry) => current_time >= *expiry,
            TimeInForce::DAY => day_end.is_some_and(|end| current_time >= end),
            _ => false,
        }
    }

    /// Returns true if partial fills are allowed
    pub fn allows_partial_fill(&self) -> bool {
        !matches!(self, TimeInForce::FOK)
    }

    /// Returns true if any unfilled remainder must not rest on the book
    pub fn is_immediate(&self) -> bool {
        matches!(self, TimeInForce::IOC | TimeInForce::FOK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_gtd_expiry() {
        let expiry = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let tif = TimeInForce::GTD(expiry);
        assert!(!tif.is_expired(expiry - chrono::Duration::seconds(1), None));
        assert!(tif.is_expired(expiry, None));
    }

    #[test]
    fn test_day_requires_day_end() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap();
        assert!(!TimeInForce::DAY.is_expired(now, None));
        assert!(TimeInForce::DAY.is_expired(now, Some(now)));
        assert!(!TimeInForce::GTC.is_expired(now, Some(now)));
    }
}
