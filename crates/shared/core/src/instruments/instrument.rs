use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::InstrumentSpec;
use crate::entities::FeeSchedule;
use crate::identifiers::InstrumentId;
use crate::values::{Currency, Price, Quantity, Timestamp};

/// Contract family of an instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentKind {
    /// Spot trading pair (e.g., BTC/USDT)
    Spot,
    /// Perpetual swap without expiry (e.g., BTCUSDT-PERP)
    Perpetual,
    /// Futures contract with expiry
    Future { expiry: Timestamp },
}

/// Tradable contract definition
///
/// Created once (usually by a data client), immutable afterwards and owned by
/// the cache. Precision and increments drive order validation in both the
/// risk engine and the simulated venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub kind: InstrumentKind,
    /// Base currency (spot only)
    pub base_currency: Option<Currency>,
    pub quote_currency: Currency,
    /// Currency P&L and commissions settle in
    pub settlement_currency: Currency,
    pub price_precision: u32,
    pub size_precision: u32,
    /// Minimum price increment
    pub price_increment: Price,
    /// Minimum quantity increment
    pub size_increment: Quantity,
    /// Contract multiplier (1 for spot)
    pub multiplier: Decimal,
    pub min_quantity: Option<Quantity>,
    pub max_quantity: Option<Quantity>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    /// Initial margin requirement as a fraction of notional
    pub margin_init: Decimal,
    /// Maintenance margin requirement as a fraction of notional
    pub margin_maint: Decimal,
    pub fees: FeeSchedule,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

impl Instrument {
    /// Spot pair with increments derived from the precisions
    pub fn spot(
        id: InstrumentId,
        base: Currency,
        quote: Currency,
        price_precision: u32,
        size_precision: u32,
        ts: Timestamp,
    ) -> Self {
        Self {
            id,
            kind: InstrumentKind::Spot,
            base_currency: Some(base),
            quote_currency: quote.clone(),
            settlement_currency: quote,
            price_precision,
            size_precision,
            price_increment: Decimal::new(1, price_precision),
            size_increment: Decimal::new(1, size_precision),
            multiplier: Decimal::ONE,
            min_quantity: Some(Decimal::new(1, size_precision)),
            max_quantity: None,
            min_price: None,
            max_price: None,
            margin_init: Decimal::ONE,
            margin_maint: Decimal::ONE,
            fees: FeeSchedule::default(),
            ts_event: ts,
            ts_init: ts,
        }
    }

    /// Linear perpetual settled in the quote currency
    pub fn perpetual(
        id: InstrumentId,
        quote: Currency,
        price_precision: u32,
        size_precision: u32,
        margin_init: Decimal,
        margin_maint: Decimal,
        ts: Timestamp,
    ) -> Self {
        Self {
            kind: InstrumentKind::Perpetual,
            base_currency: None,
            margin_init,
            margin_maint,
            ..Self::spot(
                id,
                quote.clone(),
                quote,
                price_precision,
                size_precision,
                ts,
            )
        }
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_quantity_bounds(mut self, min: Option<Quantity>, max: Option<Quantity>) -> Self {
        self.min_quantity = min;
        self.max_quantity = max;
        self
    }

    /// Round a price to the instrument's precision
    pub fn make_price(&self, value: Decimal) -> Price {
        value.round_dp(self.price_precision)
    }

    /// Round a quantity to the instrument's precision
    pub fn make_qty(&self, value: Decimal) -> Quantity {
        value.round_dp(self.size_precision)
    }

    /// Notional value of `quantity` at `price`
    pub fn notional_value(&self, quantity: Quantity, price: Price) -> Decimal {
        quantity * price * self.multiplier
    }

    /// Check if this is a derivative (non-spot)
    pub fn is_derivative(&self) -> bool {
        !matches!(self.kind, InstrumentKind::Spot)
    }
}

impl InstrumentSpec for Instrument {
    fn symbol(&self) -> &str {
        &self.id.symbol
    }

    fn tick_size(&self) -> Price {
        self.price_increment
    }

    fn lot_size(&self) -> Quantity {
        self.size_increment
    }

    fn price_precision(&self) -> u32 {
        self.price_precision
    }

    fn size_precision(&self) -> u32 {
        self.size_precision
    }

    fn margin_requirement(&self) -> Decimal {
        self.margin_init
    }

    fn maintenance_margin(&self) -> Decimal {
        self.margin_maint
    }
}
