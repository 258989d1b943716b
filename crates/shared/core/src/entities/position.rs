use rust_decimal::Decimal;
use rust_decimal::prelude::Signed;
use serde::{Deserialize, Serialize};

use super::Side;
use crate::error::PositionError;
use crate::events::OrderFilled;
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, TradeId, TraderId,
};
use crate::instruments::Instrument;
use crate::values::{Currency, Price, Quantity, Timestamp};

/// Position side - long (bought), short (sold) or flat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Flat,
    /// Long position - bought the asset, profit when price rises
    Long,
    /// Short position - sold borrowed asset, profit when price falls
    Short,
}

impl PositionSide {
    /// Side of a signed quantity
    pub fn from_signed_qty(signed_qty: Decimal) -> Self {
        if signed_qty > Decimal::ZERO {
            PositionSide::Long
        } else if signed_qty < Decimal::ZERO {
            PositionSide::Short
        } else {
            PositionSide::Flat
        }
    }

    /// Order side that would reduce this position
    pub fn closing_side(&self) -> Option<Side> {
        match self {
            PositionSide::Long => Some(Side::Sell),
            PositionSide::Short => Some(Side::Buy),
            PositionSide::Flat => None,
        }
    }
}

/// Net exposure in one instrument under one position id
///
/// Realized P&L moves only when a fill is applied; unrealized P&L is always
/// derived from a caller-supplied price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub account_id: AccountId,
    pub opening_order_id: ClientOrderId,
    pub closing_order_id: Option<ClientOrderId>,
    /// Side of the opening fill
    pub entry: Side,
    pub side: PositionSide,
    pub signed_qty: Decimal,
    /// Absolute net quantity
    pub quantity: Quantity,
    pub peak_qty: Quantity,
    pub multiplier: Decimal,
    pub settlement_currency: Currency,
    pub avg_px_open: Price,
    pub avg_px_close: Option<Price>,
    pub realized_pnl: Decimal,
    pub commissions: Decimal,
    pub buy_qty: Quantity,
    pub sell_qty: Quantity,
    /// Quantity closed since the current side was opened
    #[serde(default)]
    pub closed_qty: Quantity,
    pub trade_ids: Vec<TradeId>,
    pub ts_opened: Timestamp,
    pub ts_last: Timestamp,
    pub ts_closed: Option<Timestamp>,
}

impl Position {
    /// Open a position from its first fill
    pub fn new(instrument: &Instrument, fill: &OrderFilled, id: PositionId) -> Self {
        let mut position = Self {
            id,
            trader_id: fill.trader_id.clone(),
            strategy_id: fill.strategy_id.clone(),
            instrument_id: fill.instrument_id.clone(),
            account_id: fill.account_id.clone(),
            opening_order_id: fill.client_order_id.clone(),
            closing_order_id: None,
            entry: fill.side,
            side: PositionSide::Flat,
            signed_qty: Decimal::ZERO,
            quantity: Decimal::ZERO,
            peak_qty: Decimal::ZERO,
            multiplier: instrument.multiplier,
            settlement_currency: instrument.settlement_currency.clone(),
            avg_px_open: fill.last_px,
            avg_px_close: None,
            realized_pnl: Decimal::ZERO,
            commissions: Decimal::ZERO,
            buy_qty: Decimal::ZERO,
            sell_qty: Decimal::ZERO,
            closed_qty: Decimal::ZERO,
            trade_ids: Vec::new(),
            ts_opened: fill.ts_event,
            ts_last: fill.ts_event,
            ts_closed: None,
        };
        position.apply_unchecked(fill);
        position
    }

    /// Apply a fill, updating quantity, average prices and realized P&L
    pub fn apply(&mut self, fill: &OrderFilled) -> Result<(), PositionError> {
        if fill.instrument_id != self.instrument_id {
            return Err(PositionError::InstrumentMismatch {
                position: self.instrument_id.to_string(),
                fill: fill.instrument_id.to_string(),
            });
        }
        if self.trade_ids.contains(&fill.trade_id) {
            return Err(PositionError::DuplicateFill {
                position_id: self.id.clone(),
                trade_id: fill.trade_id.clone(),
            });
        }
        self.apply_unchecked(fill);
        Ok(())
    }

    fn apply_unchecked(&mut self, fill: &OrderFilled) {
        let fill_signed = fill.signed_qty();
        let px = fill.last_px;

        if fill.commission.currency == self.settlement_currency {
            self.commissions += fill.commission.amount;
            self.realized_pnl -= fill.commission.amount;
        }

        match fill.side {
            Side::Buy => self.buy_qty += fill.last_qty,
            Side::Sell => self.sell_qty += fill.last_qty,
        }

        let same_direction = self.signed_qty.is_zero()
            || (self.signed_qty > Decimal::ZERO) == (fill_signed > Decimal::ZERO);

        if same_direction {
            // Increasing (or opening)
            let current = self.signed_qty.abs();
            let total = current + fill.last_qty;
            if self.signed_qty.is_zero() {
                self.avg_px_open = px;
                self.avg_px_close = None;
                self.closed_qty = Decimal::ZERO;
                self.entry = fill.side;
                self.ts_opened = fill.ts_event;
                self.ts_closed = None;
                self.closing_order_id = None;
                self.opening_order_id = fill.client_order_id.clone();
            } else if total > Decimal::ZERO {
                self.avg_px_open = (self.avg_px_open * current + px * fill.last_qty) / total;
            }
            self.signed_qty += fill_signed;
        } else {
            // Reducing, possibly flipping through zero
            let current = self.signed_qty.abs();
            let closed = fill.last_qty.min(current);
            let direction = self.signed_qty.signum();
            self.realized_pnl += closed * (px - self.avg_px_open) * direction * self.multiplier;

            let prior_closed = self.closed_qty;
            self.avg_px_close = Some(match self.avg_px_close {
                Some(avg) if prior_closed + closed > Decimal::ZERO => {
                    (avg * prior_closed + px * closed) / (prior_closed + closed)
                }
                _ => px,
            });
            self.closed_qty += closed;

            self.signed_qty += fill_signed;
            if fill.last_qty > current {
                // Remainder opens the opposite side at the fill price
                self.avg_px_open = px;
                self.entry = fill.side;
                self.opening_order_id = fill.client_order_id.clone();
                self.avg_px_close = None;
                self.closed_qty = Decimal::ZERO;
                self.ts_opened = fill.ts_event;
            }
        }

        self.quantity = self.signed_qty.abs();
        self.peak_qty = self.peak_qty.max(self.quantity);
        self.side = PositionSide::from_signed_qty(self.signed_qty);
        self.trade_ids.push(fill.trade_id.clone());
        self.ts_last = fill.ts_event;

        if self.side == PositionSide::Flat {
            self.closing_order_id = Some(fill.client_order_id.clone());
            self.ts_closed = Some(fill.ts_event);
        }
    }

    /// Unrealized P&L at `last` (derived, never stored)
    pub fn unrealized_pnl(&self, last: Price) -> Decimal {
        if self.signed_qty.is_zero() {
            return Decimal::ZERO;
        }
        self.signed_qty * (last - self.avg_px_open) * self.multiplier
    }

    /// Realized plus unrealized P&L
    pub fn total_pnl(&self, last: Price) -> Decimal {
        self.realized_pnl + self.unrealized_pnl(last)
    }

    /// Notional value at `last`
    pub fn notional_value(&self, last: Price) -> Decimal {
        self.quantity * last * self.multiplier
    }

    pub fn is_open(&self) -> bool {
        self.side != PositionSide::Flat
    }

    pub fn is_closed(&self) -> bool {
        self.side == PositionSide::Flat
    }

    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs;
    use rust_decimal_macros::dec;

    fn fill(side: Side, qty: Decimal, px: Decimal, trade: &str) -> OrderFilled {
        stubs::order_filled(side, qty, px, trade)
    }

    #[test]
    fn test_open_long() {
        let instrument = stubs::btcusdt();
        let position = Position::new(
            &instrument,
            &fill(Side::Buy, dec!(2), dec!(100), "T-1"),
            PositionId::new("P-1"),
        );

        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.signed_qty, dec!(2));
        assert_eq!(position.avg_px_open, dec!(100));
        assert!(position.is_open());
    }

    #[test]
    fn test_increase_averages_entry() {
        let instrument = stubs::btcusdt();
        let mut position = Position::new(
            &instrument,
            &fill(Side::Buy, dec!(1), dec!(100), "T-1"),
            PositionId::new("P-1"),
        );
        position
            .apply(&fill(Side::Buy, dec!(1), dec!(110), "T-2"))
            .unwrap();

        assert_eq!(position.quantity, dec!(2));
        assert_eq!(position.avg_px_open, dec!(105));
        assert_eq!(position.realized_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_close_realizes_pnl() {
        let instrument = stubs::btcusdt();
        let mut position = Position::new(
            &instrument,
            &fill(Side::Buy, dec!(2), dec!(100), "T-1"),
            PositionId::new("P-1"),
        );
        position
            .apply(&fill(Side::Sell, dec!(1), dec!(110), "T-2"))
            .unwrap();
        assert_eq!(position.realized_pnl, dec!(10));
        assert_eq!(position.unrealized_pnl(dec!(120)), dec!(20));

        position
            .apply(&fill(Side::Sell, dec!(1), dec!(90), "T-3"))
            .unwrap();
        assert!(position.is_closed());
        assert_eq!(position.realized_pnl, dec!(0));
        assert_eq!(position.avg_px_close, Some(dec!(100)));
        assert!(position.ts_closed.is_some());
        assert_eq!(position.unrealized_pnl(dec!(500)), Decimal::ZERO);
    }

    #[test]
    fn test_flip_short_to_long() {
        let instrument = stubs::btcusdt();
        let mut position = Position::new(
            &instrument,
            &fill(Side::Sell, dec!(1), dec!(100), "T-1"),
            PositionId::new("P-1"),
        );
        position
            .apply(&fill(Side::Buy, dec!(3), dec!(90), "T-2"))
            .unwrap();

        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.signed_qty, dec!(2));
        assert_eq!(position.avg_px_open, dec!(90));
        assert_eq!(position.realized_pnl, dec!(10));
        assert_eq!(position.entry, Side::Buy);
    }

    #[test]
    fn test_flat_then_reopen_keeps_pnl_and_restarts_close_average() {
        let instrument = stubs::btcusdt();
        let mut position = Position::new(
            &instrument,
            &fill(Side::Buy, dec!(2), dec!(100), "T-1"),
            PositionId::new("P-1"),
        );
        position
            .apply(&fill(Side::Sell, dec!(2), dec!(110), "T-2"))
            .unwrap();
        assert!(position.is_closed());
        assert_eq!(position.realized_pnl, dec!(20));

        position
            .apply(&fill(Side::Buy, dec!(1), dec!(200), "T-3"))
            .unwrap();
        assert!(position.is_long());
        assert_eq!(position.avg_px_open, dec!(200));
        assert_eq!(position.avg_px_close, None);

        position
            .apply(&fill(Side::Sell, dec!(0.5), dec!(210), "T-4"))
            .unwrap();
        position
            .apply(&fill(Side::Sell, dec!(0.5), dec!(190), "T-5"))
            .unwrap();

        assert!(position.is_closed());
        // 20 from the first cycle, +5 and -5 from the second
        assert_eq!(position.realized_pnl, dec!(20));
        assert_eq!(position.avg_px_close, Some(dec!(200)));
        assert_eq!(position.buy_qty, dec!(3));
        assert_eq!(position.sell_qty, dec!(3));
    }

    #[test]
    fn test_close_average_after_flip_covers_new_side_only() {
        let instrument = stubs::btcusdt();
        let mut position = Position::new(
            &instrument,
            &fill(Side::Buy, dec!(1), dec!(100), "T-1"),
            PositionId::new("P-1"),
        );
        position
            .apply(&fill(Side::Sell, dec!(2), dec!(110), "T-2"))
            .unwrap();
        position
            .apply(&fill(Side::Buy, dec!(0.5), dec!(105), "T-3"))
            .unwrap();
        position
            .apply(&fill(Side::Buy, dec!(0.5), dec!(95), "T-4"))
            .unwrap();

        assert!(position.is_closed());
        assert_eq!(position.avg_px_close, Some(dec!(100)));
        // 10 on the long, then 2.5 and 7.5 on the short
        assert_eq!(position.realized_pnl, dec!(20));
    }

    #[test]
    fn test_duplicate_fill_rejected() {
        let instrument = stubs::btcusdt();
        let first = fill(Side::Buy, dec!(1), dec!(100), "T-1");
        let mut position = Position::new(&instrument, &first, PositionId::new("P-1"));

        let err = position.apply(&first).unwrap_err();
        assert!(matches!(err, PositionError::DuplicateFill { .. }));
        assert_eq!(position.quantity, dec!(1));
    }

    #[test]
    fn test_commission_reduces_realized_pnl() {
        let instrument = stubs::btcusdt();
        let mut opening = fill(Side::Buy, dec!(1), dec!(100), "T-1");
        opening.commission.amount = dec!(0.5);
        let position = Position::new(&instrument, &opening, PositionId::new("P-1"));

        assert_eq!(position.commissions, dec!(0.5));
        assert_eq!(position.realized_pnl, dec!(-0.5));
    }
}
