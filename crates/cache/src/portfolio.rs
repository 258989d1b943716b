//! Portfolio views over the cache
//!
//! Aggregates open and closed positions into net positions, exposures and
//! P&L per instrument or per venue. Nothing is stored here: every figure is
//! derived from the cache on demand, so the portfolio never drifts from the
//! positions it summarises.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rust_decimal::Decimal;
use tessera_core::{Currency, InstrumentId, Money, Venue};

use crate::cache::Cache;

/// Read-only portfolio analytics
#[derive(Clone)]
pub struct Portfolio {
    cache: Rc<RefCell<Cache>>,
}

impl Portfolio {
    pub fn new(cache: Rc<RefCell<Cache>>) -> Self {
        Self { cache }
    }

    /// Net signed quantity across all open positions in `instrument_id`
    pub fn net_position(&self, instrument_id: &InstrumentId) -> Decimal {
        self.cache
            .borrow()
            .positions_open(None, Some(instrument_id), None)
            .iter()
            .map(|p| p.signed_qty)
            .sum()
    }

    pub fn is_net_long(&self, instrument_id: &InstrumentId) -> bool {
        self.net_position(instrument_id) > Decimal::ZERO
    }

    pub fn is_net_short(&self, instrument_id: &InstrumentId) -> bool {
        self.net_position(instrument_id) < Decimal::ZERO
    }

    pub fn is_flat(&self, instrument_id: &InstrumentId) -> bool {
        self.net_position(instrument_id).is_zero()
    }

    /// True when no position is open anywhere
    pub fn is_completely_flat(&self) -> bool {
        self.cache.borrow().positions_open_count(None) == 0
    }

    /// Signed notional of the net position, marked at the closing side
    ///
    /// `None` when a position is open but no price is known.
    pub fn net_exposure(&self, instrument_id: &InstrumentId) -> Option<Money> {
        let cache = self.cache.borrow();
        let instrument = cache.instrument(instrument_id)?;
        let net = self.net_position(instrument_id);
        if net.is_zero() {
            return Some(Money::zero(instrument.settlement_currency.clone()));
        }
        let price = cache.mark_price(instrument_id, net)?;
        Some(Money::new(
            net * price * instrument.multiplier,
            instrument.settlement_currency.clone(),
        ))
    }

    /// Net exposures at `venue` summed per settlement currency
    pub fn net_exposures(&self, venue: &Venue) -> BTreeMap<Currency, Decimal> {
        let mut exposures = BTreeMap::new();
        for instrument_id in self.open_instruments(venue) {
            match self.net_exposure(&instrument_id) {
                Some(money) => *exposures.entry(money.currency).or_default() += money.amount,
                None => log::warn!(
                    "Skipped exposure without price: instrument={}",
                    instrument_id
                ),
            }
        }
        exposures
    }

    /// Unrealized P&L of the open positions in `instrument_id`
    pub fn unrealized_pnl(&self, instrument_id: &InstrumentId) -> Option<Money> {
        let cache = self.cache.borrow();
        let instrument = cache.instrument(instrument_id)?;
        let mut total = Decimal::ZERO;
        for position in cache.positions_open(None, Some(instrument_id), None) {
            let price = cache.mark_price(instrument_id, position.signed_qty)?;
            total += position.unrealized_pnl(price);
        }
        Some(Money::new(total, instrument.settlement_currency.clone()))
    }

    pub fn unrealized_pnls(&self, venue: &Venue) -> BTreeMap<Currency, Decimal> {
        let mut pnls = BTreeMap::new();
        for instrument_id in self.open_instruments(venue) {
            if let Some(money) = self.unrealized_pnl(&instrument_id) {
                *pnls.entry(money.currency).or_default() += money.amount;
            }
        }
        pnls
    }

    /// Realized P&L of every position ever held in `instrument_id`
    ///
    /// Includes earlier cycles of netting positions that closed and reopened
    /// under the same id.
    pub fn realized_pnl(&self, instrument_id: &InstrumentId) -> Option<Money> {
        let cache = self.cache.borrow();
        let instrument = cache.instrument(instrument_id)?;
        let total: Decimal = cache
            .positions(None, Some(instrument_id), None)
            .iter()
            .map(|p| {
                p.realized_pnl
                    + cache
                        .position_snapshots(&p.id)
                        .iter()
                        .map(|s| s.realized_pnl)
                        .sum::<Decimal>()
            })
            .sum();
        Some(Money::new(total, instrument.settlement_currency.clone()))
    }

    pub fn realized_pnls(&self, venue: &Venue) -> BTreeMap<Currency, Decimal> {
        let instrument_ids: Vec<InstrumentId> = {
            let cache = self.cache.borrow();
            let mut ids: Vec<InstrumentId> = cache
                .positions(Some(venue), None, None)
                .iter()
                .map(|p| p.instrument_id.clone())
                .collect();
            ids.sort();
            ids.dedup();
            ids
        };
        let mut pnls = BTreeMap::new();
        for instrument_id in instrument_ids {
            if let Some(money) = self.realized_pnl(&instrument_id) {
                *pnls.entry(money.currency).or_default() += money.amount;
            }
        }
        pnls
    }

    /// Initial margin per instrument held by the venue's account
    pub fn margins_init(&self, venue: &Venue) -> BTreeMap<InstrumentId, Decimal> {
        self.margins(venue, |m| m.initial)
    }

    /// Maintenance margin per instrument held by the venue's account
    pub fn margins_maint(&self, venue: &Venue) -> BTreeMap<InstrumentId, Decimal> {
        self.margins(venue, |m| m.maintenance)
    }

    fn margins(
        &self,
        venue: &Venue,
        pick: impl Fn(&tessera_core::MarginBalance) -> Decimal,
    ) -> BTreeMap<InstrumentId, Decimal> {
        let cache = self.cache.borrow();
        cache
            .account_for_venue(venue)
            .map(|account| {
                account
                    .margins
                    .values()
                    .filter(|m| !pick(m).is_zero())
                    .map(|m| (m.instrument_id.clone(), pick(m)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn open_instruments(&self, venue: &Venue) -> Vec<InstrumentId> {
        let cache = self.cache.borrow();
        let mut ids: Vec<InstrumentId> = cache
            .positions_open(Some(venue), None, None)
            .iter()
            .map(|p| p.instrument_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tessera_core::{PositionId, Side, stubs};

    fn portfolio_with_long() -> (Rc<RefCell<Cache>>, Portfolio) {
        let cache = Rc::new(RefCell::new(Cache::default()));
        {
            let mut c = cache.borrow_mut();
            let instrument = stubs::btcusdt();
            c.add_instrument(instrument.clone()).unwrap();
            let fill = stubs::order_filled(Side::Buy, dec!(2), dec!(100), "T-1");
            let position =
                tessera_core::Position::new(&instrument, &fill, PositionId::new("P-1"));
            c.add_position(position).unwrap();
        }
        let portfolio = Portfolio::new(cache.clone());
        (cache, portfolio)
    }

    #[test]
    fn test_net_position_and_flags() {
        let (_cache, portfolio) = portfolio_with_long();
        let id = stubs::btcusdt_id();
        assert_eq!(portfolio.net_position(&id), dec!(2));
        assert!(portfolio.is_net_long(&id));
        assert!(!portfolio.is_net_short(&id));
        assert!(!portfolio.is_completely_flat());
    }

    #[test]
    fn test_unrealized_pnl_marks_long_at_bid() {
        let (cache, portfolio) = portfolio_with_long();
        let id = stubs::btcusdt_id();
        assert!(portfolio.unrealized_pnl(&id).is_none());

        cache.borrow_mut().add_quote(stubs::quote(dec!(105), dec!(106), 2));
        let pnl = portfolio.unrealized_pnl(&id).unwrap();
        assert_eq!(pnl.amount, dec!(10));
        assert_eq!(pnl.currency, Currency::usdt());

        let exposure = portfolio.net_exposure(&id).unwrap();
        assert_eq!(exposure.amount, dec!(210));
        assert_eq!(
            portfolio.net_exposures(&Venue::new("SIM")).get(&Currency::usdt()),
            Some(&dec!(210))
        );
    }

    #[test]
    fn test_empty_portfolio_is_flat() {
        let portfolio = Portfolio::new(Rc::new(RefCell::new(Cache::default())));
        assert!(portfolio.is_completely_flat());
        assert!(portfolio.is_flat(&stubs::btcusdt_id()));
        assert!(portfolio.margins_init(&Venue::new("SIM")).is_empty());
    }
}
