use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_core::{Instrument, LiquiditySide, Money, Price, Quantity};

/// Commission charged on each simulated fill
///
/// Commissions are always in the instrument's settlement currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum FeeModel {
    /// Flat amount per fill regardless of size or liquidity side
    Fixed(Decimal),
    /// Instrument's maker/taker rates applied to the fill notional
    #[default]
    MakerTaker,
}

impl FeeModel {
    pub fn commission(
        &self,
        instrument: &Instrument,
        last_qty: Quantity,
        last_px: Price,
        liquidity_side: LiquiditySide,
    ) -> Money {
        let amount = match self {
            FeeModel::Fixed(amount) => *amount,
            FeeModel::MakerTaker => {
                let notional = instrument.notional_value(last_qty, last_px);
                instrument.fees.calculate_fee(notional, liquidity_side)
            }
        };
        Money::new(amount, instrument.settlement_currency.clone())
    }
}
