//! Internal bar aggregation
//!
//! Builds bars for `INTERNAL` bar types from the quote and trade stream.
//! Every aggregator is a pure state machine: updates go in, completed bars
//! come out, so the same ordered input always yields the same bars.
//!
//! | Aggregation | Bar closes when                                   |
//! |-------------|---------------------------------------------------|
//! | Tick        | `step` updates were applied                       |
//! | Volume      | accumulated size reaches `step` (updates split)   |
//! | Value       | accumulated `price * size` reaches `step` (split) |
//! | Time        | an update or timer crosses the interval boundary  |

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tessera_core::data::{Bar, BarAggregation, BarType, PriceType, QuoteTick, TradeTick};
use tessera_core::{Price, Quantity, Timestamp};

use crate::error::DataEngineError;

/// Accumulates OHLCV values for the bar in progress
#[derive(Debug, Clone)]
pub struct BarBuilder {
    bar_type: BarType,
    open: Option<Price>,
    high: Option<Price>,
    low: Option<Price>,
    close: Option<Price>,
    volume: Quantity,
    count: usize,
    last_close: Option<Price>,
    ts_last: Option<Timestamp>,
}

impl BarBuilder {
    pub fn new(bar_type: BarType) -> Self {
        Self {
            bar_type,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: Decimal::ZERO,
            count: 0,
            last_close: None,
            ts_last: None,
        }
    }

    /// Number of updates since the last bar
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn volume(&self) -> Quantity {
        self.volume
    }

    /// Apply one price/size update; updates older than the last one are ignored
    pub fn update(&mut self, price: Price, size: Quantity, ts_event: Timestamp) {
        if self.ts_last.is_some_and(|last| ts_event < last) {
            return;
        }
        match self.open {
            None => {
                self.open = Some(price);
                self.high = Some(price);
                self.low = Some(price);
            }
            Some(_) => {
                self.high = self.high.map(|h| h.max(price));
                self.low = self.low.map(|l| l.min(price));
            }
        }
        self.close = Some(price);
        self.volume += size;
        self.count += 1;
        self.ts_last = Some(ts_event);
    }

    /// Build a bar stamped with the last update time
    pub fn build_now(&mut self) -> Option<Bar> {
        let ts = self.ts_last?;
        self.build(ts, ts)
    }

    /// Build the bar in progress and reset
    ///
    /// A bar without updates repeats the previous close with zero volume;
    /// `None` when no price was ever seen.
    pub fn build(&mut self, ts_event: Timestamp, ts_init: Timestamp) -> Option<Bar> {
        if self.open.is_none() {
            let last = self.last_close?;
            self.open = Some(last);
            self.high = Some(last);
            self.low = Some(last);
            self.close = Some(last);
        }
        let bar = Bar {
            bar_type: self.bar_type.clone(),
            open: self.open?,
            high: self.high?,
            low: self.low?,
            close: self.close?,
            volume: self.volume,
            ts_event,
            ts_init,
        };
        self.last_close = self.close;
        self.reset();
        Some(bar)
    }

    fn reset(&mut self) {
        self.open = None;
        self.high = None;
        self.low = None;
        self.close = None;
        self.volume = Decimal::ZERO;
        self.count = 0;
    }
}

/// Turns market updates into completed bars
pub trait BarAggregator {
    fn bar_type(&self) -> &BarType;

    /// Apply a price/size update, returning the bars it completed
    fn update(&mut self, price: Price, size: Quantity, ts_event: Timestamp) -> Vec<Bar>;

    fn handle_quote(&mut self, quote: &QuoteTick) -> Vec<Bar> {
        let (price, size) = match self.bar_type().spec.price_type {
            PriceType::Bid => (quote.bid_price, quote.bid_size),
            PriceType::Ask => (quote.ask_price, quote.ask_size),
            PriceType::Mid | PriceType::Last => (
                quote.mid_price(),
                (quote.bid_size + quote.ask_size) / Decimal::TWO,
            ),
        };
        self.update(price, size, quote.ts_event)
    }

    fn handle_trade(&mut self, trade: &TradeTick) -> Vec<Bar> {
        self.update(trade.price, trade.size, trade.ts_event)
    }

    /// Close any bar whose interval ended at or before `now`
    fn on_time(&mut self, _now: Timestamp) -> Vec<Bar> {
        Vec::new()
    }
}

/// Closes a bar every `step` updates
pub struct TickBarAggregator {
    builder: BarBuilder,
    bar_type: BarType,
}

impl TickBarAggregator {
    pub fn new(bar_type: BarType) -> Self {
        Self {
            builder: BarBuilder::new(bar_type.clone()),
            bar_type,
        }
    }
}

impl BarAggregator for TickBarAggregator {
    fn bar_type(&self) -> &BarType {
        &self.bar_type
    }

    fn update(&mut self, price: Price, size: Quantity, ts_event: Timestamp) -> Vec<Bar> {
        self.builder.update(price, size, ts_event);
        if self.builder.count() as u64 >= self.bar_type.spec.step {
            return self.builder.build_now().into_iter().collect();
        }
        Vec::new()
    }
}

/// Closes a bar every `step` units of size
///
/// An update larger than the remaining room is split across bars.
pub struct VolumeBarAggregator {
    builder: BarBuilder,
    bar_type: BarType,
}

impl VolumeBarAggregator {
    pub fn new(bar_type: BarType) -> Self {
        Self {
            builder: BarBuilder::new(bar_type.clone()),
            bar_type,
        }
    }
}

impl BarAggregator for VolumeBarAggregator {
    fn bar_type(&self) -> &BarType {
        &self.bar_type
    }

    fn update(&mut self, price: Price, size: Quantity, ts_event: Timestamp) -> Vec<Bar> {
        let step = Decimal::from(self.bar_type.spec.step);
        if step.is_zero() {
            self.builder.update(price, size, ts_event);
            return Vec::new();
        }
        let mut remaining = size;
        let mut bars = Vec::new();
        while remaining > Decimal::ZERO {
            let room = step - self.builder.volume();
            if remaining < room {
                self.builder.update(price, remaining, ts_event);
                break;
            }
            self.builder.update(price, room, ts_event);
            bars.extend(self.builder.build_now());
            remaining -= room;
        }
        bars
    }
}

/// Closes a bar every `step` units of notional
pub struct ValueBarAggregator {
    builder: BarBuilder,
    bar_type: BarType,
    cum_value: Decimal,
}

impl ValueBarAggregator {
    pub fn new(bar_type: BarType) -> Self {
        Self {
            builder: BarBuilder::new(bar_type.clone()),
            bar_type,
            cum_value: Decimal::ZERO,
        }
    }

    /// Notional accumulated in the bar in progress
    pub fn cumulative_value(&self) -> Decimal {
        self.cum_value
    }
}

impl BarAggregator for ValueBarAggregator {
    fn bar_type(&self) -> &BarType {
        &self.bar_type
    }

    fn update(&mut self, price: Price, size: Quantity, ts_event: Timestamp) -> Vec<Bar> {
        let step = Decimal::from(self.bar_type.spec.step);
        if step.is_zero() {
            self.builder.update(price, size, ts_event);
            return Vec::new();
        }
        let mut remaining = size;
        let mut bars = Vec::new();
        while remaining > Decimal::ZERO {
            let value = price * remaining;
            if price <= Decimal::ZERO || self.cum_value + value < step {
                self.cum_value += value;
                self.builder.update(price, remaining, ts_event);
                break;
            }
            let size_diff = (step - self.cum_value) / price;
            self.builder.update(price, size_diff, ts_event);
            bars.extend(self.builder.build_now());
            self.cum_value = Decimal::ZERO;
            remaining -= size_diff;
        }
        bars
    }
}

/// Closes a bar at each interval boundary, aligned to the UTC epoch
///
/// Intervals are half-open: an update exactly on a boundary opens the next
/// bar. Bars are stamped with their close time unless `timestamp_on_close`
/// is off, in which case they carry their open time.
pub struct TimeBarAggregator {
    builder: BarBuilder,
    bar_type: BarType,
    interval: Duration,
    window_start: Timestamp,
    build_with_no_updates: bool,
    timestamp_on_close: bool,
}

impl TimeBarAggregator {
    pub fn new(
        bar_type: BarType,
        now: Timestamp,
        build_with_no_updates: bool,
        timestamp_on_close: bool,
    ) -> Result<Self, DataEngineError> {
        let interval = bar_type
            .spec
            .timedelta()
            .filter(|d| d.num_milliseconds() > 0)
            .ok_or_else(|| DataEngineError::InvalidBarType(bar_type.to_string()))?;
        let window_start = floor_to_interval(now, interval)
            .ok_or_else(|| DataEngineError::InvalidBarType(bar_type.to_string()))?;
        Ok(Self {
            builder: BarBuilder::new(bar_type.clone()),
            bar_type,
            interval,
            window_start,
            build_with_no_updates,
            timestamp_on_close,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start of the interval the next update falls into
    pub fn window_start(&self) -> Timestamp {
        self.window_start
    }

    fn close_through(&mut self, ts: Timestamp) -> Vec<Bar> {
        let mut bars = Vec::new();
        while self.window_start + self.interval <= ts {
            let close = self.window_start + self.interval;
            if self.builder.count() > 0 || self.build_with_no_updates {
                let ts_event = if self.timestamp_on_close {
                    close
                } else {
                    self.window_start
                };
                bars.extend(self.builder.build(ts_event, close));
            }
            self.window_start = close;
            if !self.build_with_no_updates && self.builder.count() == 0 {
                // Skip empty intervals in one step
                if let Some(start) = floor_to_interval(ts, self.interval) {
                    self.window_start = self.window_start.max(start);
                }
            }
        }
        bars
    }
}

impl BarAggregator for TimeBarAggregator {
    fn bar_type(&self) -> &BarType {
        &self.bar_type
    }

    fn update(&mut self, price: Price, size: Quantity, ts_event: Timestamp) -> Vec<Bar> {
        let bars = self.close_through(ts_event);
        self.builder.update(price, size, ts_event);
        bars
    }

    fn on_time(&mut self, now: Timestamp) -> Vec<Bar> {
        self.close_through(now)
    }
}

/// Largest multiple of `interval` since the epoch not after `ts`
pub fn floor_to_interval(ts: Timestamp, interval: Duration) -> Option<Timestamp> {
    let step = interval.num_milliseconds();
    if step <= 0 {
        return None;
    }
    let millis = ts.timestamp_millis().div_euclid(step) * step;
    DateTime::<Utc>::from_timestamp_millis(millis)
}

/// Aggregator for an internally aggregated bar type
pub fn create_aggregator(
    bar_type: &BarType,
    now: Timestamp,
    build_with_no_updates: bool,
    timestamp_on_close: bool,
) -> Result<Box<dyn BarAggregator>, DataEngineError> {
    if !bar_type.is_internally_aggregated() || bar_type.spec.step == 0 {
        return Err(DataEngineError::InvalidBarType(bar_type.to_string()));
    }
    let aggregator: Box<dyn BarAggregator> = match bar_type.spec.aggregation {
        BarAggregation::Tick => Box::new(TickBarAggregator::new(bar_type.clone())),
        BarAggregation::Volume => Box::new(VolumeBarAggregator::new(bar_type.clone())),
        BarAggregation::Value => Box::new(ValueBarAggregator::new(bar_type.clone())),
        _ => Box::new(TimeBarAggregator::new(
            bar_type.clone(),
            now,
            build_with_no_updates,
            timestamp_on_close,
        )?),
    };
    Ok(aggregator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tessera_core::data::{AggregationSource, BarSpecification};
    use tessera_core::{AggressorSide, TradeId, stubs};

    fn bar_type(step: u64, aggregation: BarAggregation, price_type: PriceType) -> BarType {
        BarType::new(
            stubs::btcusdt_id(),
            BarSpecification::new(step, aggregation, price_type),
            AggregationSource::Internal,
        )
    }

    fn trade(price: Price, size: Quantity, secs: i64) -> TradeTick {
        TradeTick::new(
            stubs::btcusdt_id(),
            price,
            size,
            AggressorSide::Buyer,
            TradeId::new(format!("T-{secs}")),
            stubs::ts(secs),
        )
    }

    #[test]
    fn test_builder_ignores_stale_update() {
        let mut builder = BarBuilder::new(bar_type(1, BarAggregation::Tick, PriceType::Last));
        builder.update(dec!(10), dec!(1), stubs::ts(5));
        builder.update(dec!(99), dec!(1), stubs::ts(4));
        assert_eq!(builder.count(), 1);
        let bar = builder.build_now().unwrap();
        assert_eq!(bar.high, dec!(10));
    }

    #[test]
    fn test_builder_without_any_price_builds_nothing() {
        let mut builder = BarBuilder::new(bar_type(1, BarAggregation::Tick, PriceType::Last));
        assert!(builder.build(stubs::ts(1), stubs::ts(1)).is_none());
    }

    #[test]
    fn test_tick_bars_close_every_step() {
        let mut agg = TickBarAggregator::new(bar_type(3, BarAggregation::Tick, PriceType::Last));
        assert!(agg.handle_trade(&trade(dec!(10), dec!(1), 1)).is_empty());
        assert!(agg.handle_trade(&trade(dec!(12), dec!(1), 2)).is_empty());
        let bars = agg.handle_trade(&trade(dec!(9), dec!(2), 3));

        assert_eq!(bars.len(), 1);
        let bar = &bars[0];
        assert_eq!(
            (bar.open, bar.high, bar.low, bar.close),
            (dec!(10), dec!(12), dec!(9), dec!(9))
        );
        assert_eq!(bar.volume, dec!(4));
        assert_eq!(bar.ts_event, stubs::ts(3));
    }

    #[test]
    fn test_volume_bars_split_large_update() {
        let mut agg =
            VolumeBarAggregator::new(bar_type(10, BarAggregation::Volume, PriceType::Last));
        assert!(agg.handle_trade(&trade(dec!(100), dec!(4), 1)).is_empty());
        let bars = agg.handle_trade(&trade(dec!(101), dec!(25), 2));

        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(|b| b.volume == dec!(10)));
        assert_eq!(bars[0].open, dec!(100));
        assert_eq!(bars[1].open, dec!(101));
        // 4 + 25 - 20 carried into the next bar
        assert!(agg.handle_trade(&trade(dec!(102), dec!(0.5), 3)).is_empty());
        assert_eq!(agg.handle_trade(&trade(dec!(102), dec!(0.5), 4)).len(), 1);
    }

    #[test]
    fn test_value_bars_close_on_notional() {
        let mut agg = ValueBarAggregator::new(bar_type(1000, BarAggregation::Value, PriceType::Last));
        assert!(agg.handle_trade(&trade(dec!(100), dec!(4), 1)).is_empty());
        assert_eq!(agg.cumulative_value(), dec!(400));

        let bars = agg.handle_trade(&trade(dec!(100), dec!(8), 2));
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, dec!(10));
        assert_eq!(agg.cumulative_value(), dec!(200));
    }

    #[test]
    fn test_quote_bars_sample_configured_side() {
        let mut agg = TickBarAggregator::new(bar_type(1, BarAggregation::Tick, PriceType::Ask));
        let bars = agg.handle_quote(&stubs::quote(dec!(100), dec!(101), 1));
        assert_eq!(bars[0].close, dec!(101));

        let mut mid = TickBarAggregator::new(bar_type(1, BarAggregation::Tick, PriceType::Mid));
        let bars = mid.handle_quote(&stubs::quote(dec!(100), dec!(101), 1));
        assert_eq!(bars[0].close, dec!(100.5));
    }

    #[test]
    fn test_time_bars_close_on_update_crossing_boundary() {
        let bt = bar_type(1, BarAggregation::Minute, PriceType::Last);
        let mut agg = TimeBarAggregator::new(bt, stubs::ts(0), false, true).unwrap();

        assert!(agg.handle_trade(&trade(dec!(10), dec!(1), 10)).is_empty());
        assert!(agg.handle_trade(&trade(dec!(11), dec!(1), 59)).is_empty());
        let bars = agg.handle_trade(&trade(dec!(12), dec!(1), 60));

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, dec!(11));
        assert_eq!(bars[0].ts_event, stubs::ts(60));
        assert_eq!(agg.window_start(), stubs::ts(60));
    }

    #[test]
    fn test_time_bars_close_on_timer_and_skip_empty_intervals() {
        let bt = bar_type(1, BarAggregation::Minute, PriceType::Last);
        let mut agg = TimeBarAggregator::new(bt, stubs::ts(0), false, true).unwrap();
        agg.handle_trade(&trade(dec!(10), dec!(1), 5));

        let bars = agg.on_time(stubs::ts(60));
        assert_eq!(bars.len(), 1);
        assert!(agg.on_time(stubs::ts(600)).is_empty());
        assert_eq!(agg.window_start(), stubs::ts(600));
    }

    #[test]
    fn test_time_bars_with_no_updates_repeat_close() {
        let bt = bar_type(1, BarAggregation::Minute, PriceType::Last);
        let mut agg = TimeBarAggregator::new(bt, stubs::ts(0), true, true).unwrap();
        agg.handle_trade(&trade(dec!(10), dec!(2), 5));

        let bars = agg.on_time(stubs::ts(180));
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[2].open, dec!(10));
        assert_eq!(bars[2].volume, dec!(0));
    }

    #[test]
    fn test_external_bar_type_has_no_aggregator() {
        let bt = BarType::new(
            stubs::btcusdt_id(),
            BarSpecification::new(1, BarAggregation::Minute, PriceType::Last),
            AggregationSource::External,
        );
        assert!(create_aggregator(&bt, stubs::ts(0), false, true).is_err());
    }

    #[test]
    fn test_zero_step_is_rejected_for_every_aggregation() {
        for aggregation in [
            BarAggregation::Tick,
            BarAggregation::Volume,
            BarAggregation::Value,
            BarAggregation::Second,
        ] {
            let bt = bar_type(0, aggregation, PriceType::Last);
            assert!(
                matches!(
                    create_aggregator(&bt, stubs::ts(0), false, true),
                    Err(DataEngineError::InvalidBarType(_))
                ),
                "{aggregation:?} accepted a zero step"
            );
        }
    }

    #[test]
    fn test_zero_step_size_aggregators_return_without_bars() {
        let mut volume = VolumeBarAggregator::new(bar_type(0, BarAggregation::Volume, PriceType::Last));
        assert!(volume.update(dec!(100), dec!(1), stubs::ts(1)).is_empty());

        let mut value = ValueBarAggregator::new(bar_type(0, BarAggregation::Value, PriceType::Last));
        assert!(value.update(dec!(100), dec!(1), stubs::ts(1)).is_empty());
    }
}
