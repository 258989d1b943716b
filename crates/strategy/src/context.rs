use std::cell::{Ref, RefCell};

use rust_decimal::Decimal;
use tessera_cache::{Cache, Portfolio};
use tessera_core::data::QuoteTick;
use tessera_core::{InstrumentId, Order, Position, StrategyId, Timestamp, TraderId};
use tessera_ports::Clock;

use crate::order_factory::OrderFactory;

/// Context provided to a strategy on each callback
///
/// Read access only: the cache is borrowed per call, so the context must not
/// be held across the returned actions.
pub struct StrategyContext<'a> {
    pub(crate) trader_id: &'a TraderId,
    pub(crate) strategy_id: &'a StrategyId,
    pub(crate) clock: &'a dyn Clock,
    pub(crate) cache: &'a RefCell<Cache>,
    pub(crate) portfolio: &'a Portfolio,
    pub(crate) order_factory: &'a OrderFactory,
}

impl StrategyContext<'_> {
    pub fn trader_id(&self) -> &TraderId {
        self.trader_id
    }

    pub fn strategy_id(&self) -> &StrategyId {
        self.strategy_id
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn cache(&self) -> Ref<'_, Cache> {
        self.cache.borrow()
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.portfolio
    }

    /// Factory for this strategy's orders
    pub fn orders(&self) -> &OrderFactory {
        self.order_factory
    }

    /// Latest quote for an instrument
    pub fn quote(&self, instrument_id: &InstrumentId) -> Option<QuoteTick> {
        self.cache.borrow().quote(instrument_id).cloned()
    }

    /// Open orders of this strategy for an instrument
    pub fn orders_open(&self, instrument_id: &InstrumentId) -> Vec<Order> {
        self.cache
            .borrow()
            .orders_open(None, Some(instrument_id), Some(self.strategy_id), None)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Open positions of this strategy for an instrument
    pub fn positions_open(&self, instrument_id: &InstrumentId) -> Vec<Position> {
        self.cache
            .borrow()
            .positions_open(None, Some(instrument_id), Some(self.strategy_id))
            .into_iter()
            .cloned()
            .collect()
    }

    /// Net signed quantity of this strategy (not the whole portfolio)
    pub fn net_position(&self, instrument_id: &InstrumentId) -> Decimal {
        self.positions_open(instrument_id)
            .iter()
            .map(|p| p.signed_qty)
            .sum()
    }

    pub fn is_flat(&self, instrument_id: &InstrumentId) -> bool {
        self.net_position(instrument_id).is_zero()
    }
}
