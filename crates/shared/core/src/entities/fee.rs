use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::LiquiditySide;

/// Maker/taker fee rates for an instrument
///
/// Rates are fractions of notional (0.0002 = 2 bps). A negative maker rate is
/// a rebate and bypasses the min/max clamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fee for fills that added liquidity
    pub maker_fee: Decimal,
    /// Fee for fills that removed liquidity
    pub taker_fee: Decimal,
    /// Minimum fee per fill (quote currency)
    pub min_fee: Decimal,
    /// Maximum fee per fill (quote currency, None = no max)
    pub max_fee: Option<Decimal>,
}

impl FeeSchedule {
    pub fn new(maker_fee: Decimal, taker_fee: Decimal) -> Self {
        Self {
            maker_fee,
            taker_fee,
            min_fee: Decimal::ZERO,
            max_fee: None,
        }
    }

    pub fn with_min_fee(mut self, min_fee: Decimal) -> Self {
        self.min_fee = min_fee;
        self
    }

    pub fn with_max_fee(mut self, max_fee: Decimal) -> Self {
        self.max_fee = Some(max_fee);
        self
    }

    /// Rate applying to a liquidity side
    pub fn rate(&self, liquidity_side: LiquiditySide) -> Decimal {
        match liquidity_side {
            LiquiditySide::Maker => self.maker_fee,
            LiquiditySide::Taker => self.taker_fee,
            LiquiditySide::NoLiquiditySide => Decimal::ZERO,
        }
    }

    /// Fee for a fill of `notional` on `liquidity_side`
    pub fn calculate_fee(&self, notional: Decimal, liquidity_side: LiquiditySide) -> Decimal {
        let fee = notional * self.rate(liquidity_side);

        if fee < Decimal::ZERO {
            return fee;
        }
        let fee = fee.max(self.min_fee);
        match self.max_fee {
            Some(max) => fee.min(max),
            None => fee,
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            maker_fee: Decimal::new(1, 4), // 0.01% maker
            taker_fee: Decimal::new(5, 4), // 0.05% taker
            min_fee: Decimal::ZERO,
            max_fee: None,
        }
    }
}
