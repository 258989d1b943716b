use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;
use crate::identifiers::InstrumentId;
use crate::values::{Price, Quantity, Timestamp};

/// How bars are delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BarAggregation {
    /// Every `step` updates
    Tick,
    /// Every `step` units of traded size
    Volume,
    /// Every `step` units of notional (price * size)
    Value,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl BarAggregation {
    pub fn is_time_driven(&self) -> bool {
        matches!(
            self,
            BarAggregation::Millisecond
                | BarAggregation::Second
                | BarAggregation::Minute
                | BarAggregation::Hour
                | BarAggregation::Day
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            BarAggregation::Tick => "TICK",
            BarAggregation::Volume => "VOLUME",
            BarAggregation::Value => "VALUE",
            BarAggregation::Millisecond => "MILLISECOND",
            BarAggregation::Second => "SECOND",
            BarAggregation::Minute => "MINUTE",
            BarAggregation::Hour => "HOUR",
            BarAggregation::Day => "DAY",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "TICK" => BarAggregation::Tick,
            "VOLUME" => BarAggregation::Volume,
            "VALUE" => BarAggregation::Value,
            "MILLISECOND" => BarAggregation::Millisecond,
            "SECOND" => BarAggregation::Second,
            "MINUTE" => BarAggregation::Minute,
            "HOUR" => BarAggregation::Hour,
            "DAY" => BarAggregation::Day,
            _ => return None,
        })
    }
}

/// Which price a quote-driven bar samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriceType {
    Bid,
    Ask,
    Mid,
    /// Last traded price (trade-driven bars)
    Last,
}

impl PriceType {
    fn as_str(&self) -> &'static str {
        match self {
            PriceType::Bid => "BID",
            PriceType::Ask => "ASK",
            PriceType::Mid => "MID",
            PriceType::Last => "LAST",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "BID" => PriceType::Bid,
            "ASK" => PriceType::Ask,
            "MID" => PriceType::Mid,
            "LAST" => PriceType::Last,
            _ => return None,
        })
    }
}

/// Whether bars come from the venue or are built by the data engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AggregationSource {
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BarSpecification {
    pub step: u64,
    pub aggregation: BarAggregation,
    pub price_type: PriceType,
}

impl BarSpecification {
    pub fn new(step: u64, aggregation: BarAggregation, price_type: PriceType) -> Self {
        Self {
            step,
            aggregation,
            price_type,
        }
    }

    /// Bar interval for time-driven aggregations
    pub fn timedelta(&self) -> Option<Duration> {
        let step = self.step as i64;
        match self.aggregation {
            BarAggregation::Millisecond => Some(Duration::milliseconds(step)),
            BarAggregation::Second => Some(Duration::seconds(step)),
            BarAggregation::Minute => Some(Duration::minutes(step)),
            BarAggregation::Hour => Some(Duration::hours(step)),
            BarAggregation::Day => Some(Duration::days(step)),
            _ => None,
        }
    }
}

impl fmt::Display for BarSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.step,
            self.aggregation.as_str(),
            self.price_type.as_str()
        )
    }
}

/// Identifies a bar series: `{instrument_id}-{step}-{aggregation}-{price_type}-{source}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BarType {
    pub instrument_id: InstrumentId,
    pub spec: BarSpecification,
    pub source: AggregationSource,
}

impl BarType {
    pub fn new(instrument_id: InstrumentId, spec: BarSpecification, source: AggregationSource) -> Self {
        Self {
            instrument_id,
            spec,
            source,
        }
    }

    pub fn is_internally_aggregated(&self) -> bool {
        self.source == AggregationSource::Internal
    }
}

impl fmt::Display for BarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            AggregationSource::External => "EXTERNAL",
            AggregationSource::Internal => "INTERNAL",
        };
        write!(f, "{}-{}-{}", self.instrument_id, self.spec, source)
    }
}

impl FromStr for BarType {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || IdentifierError::InvalidBarType(s.to_string());
        let mut parts = s.rsplitn(5, '-');
        let source = match parts.next().ok_or_else(err)? {
            "EXTERNAL" => AggregationSource::External,
            "INTERNAL" => AggregationSource::Internal,
            _ => return Err(err()),
        };
        let price_type = PriceType::parse(parts.next().ok_or_else(err)?).ok_or_else(err)?;
        let aggregation =
            BarAggregation::parse(parts.next().ok_or_else(err)?).ok_or_else(err)?;
        let step: u64 = parts
            .next()
            .ok_or_else(err)?
            .parse()
            .map_err(|_| err())?;
        if step == 0 {
            return Err(err());
        }
        let instrument_id: InstrumentId = parts.next().ok_or_else(err)?.parse()?;

        Ok(Self::new(
            instrument_id,
            BarSpecification::new(step, aggregation, price_type),
            source,
        ))
    }
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub bar_type: BarType,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Quantity,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}
