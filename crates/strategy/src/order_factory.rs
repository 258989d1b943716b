use std::cell::Cell;
use std::rc::Rc;

use tessera_core::events::OrderInitialized;
use tessera_core::{
    ClientOrderId, InstrumentId, Order, OrderError, OrderType, Price, Quantity, Side, StrategyId,
    TimeInForce, TraderId,
};
use tessera_ports::Clock;

/// Parameters of an order before it gets an id
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
    pub time_in_force: TimeInForce,
    pub post_only: bool,
    pub reduce_only: bool,
}

impl OrderSpec {
    fn new(instrument_id: InstrumentId, side: Side, order_type: OrderType, quantity: Quantity) -> Self {
        Self {
            instrument_id,
            side,
            order_type,
            quantity,
            price: None,
            trigger_price: None,
            time_in_force: TimeInForce::GTC,
            post_only: false,
            reduce_only: false,
        }
    }

    pub fn market(instrument_id: InstrumentId, side: Side, quantity: Quantity) -> Self {
        Self::new(instrument_id, side, OrderType::Market, quantity).time_in_force(TimeInForce::IOC)
    }

    pub fn limit(instrument_id: InstrumentId, side: Side, quantity: Quantity, price: Price) -> Self {
        let mut spec = Self::new(instrument_id, side, OrderType::Limit, quantity);
        spec.price = Some(price);
        spec
    }

    pub fn stop_market(instrument_id: InstrumentId, side: Side, quantity: Quantity, trigger_price: Price) -> Self {
        let mut spec = Self::new(instrument_id, side, OrderType::StopMarket, quantity);
        spec.trigger_price = Some(trigger_price);
        spec
    }

    pub fn stop_limit(
        instrument_id: InstrumentId,
        side: Side,
        quantity: Quantity,
        price: Price,
        trigger_price: Price,
    ) -> Self {
        let mut spec = Self::new(instrument_id, side, OrderType::StopLimit, quantity);
        spec.price = Some(price);
        spec.trigger_price = Some(trigger_price);
        spec
    }

    pub fn time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    pub fn post_only(mut self) -> Self {
        self.post_only = true;
        self
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

/// Creates orders for one strategy with deterministic client order ids
///
/// Ids look like `O-20240101-000000-001-001-1`: the clock's current time,
/// the trader tag, the strategy tag and a per-strategy counter. With a test
/// clock two identical runs produce identical ids.
pub struct OrderFactory {
    trader_id: TraderId,
    strategy_id: StrategyId,
    clock: Rc<dyn Clock>,
    count: Cell<u64>,
}

impl OrderFactory {
    pub fn new(trader_id: TraderId, strategy_id: StrategyId, clock: Rc<dyn Clock>) -> Self {
        Self {
            trader_id,
            strategy_id,
            clock,
            count: Cell::new(0),
        }
    }

    pub fn strategy_id(&self) -> &StrategyId {
        &self.strategy_id
    }

    /// Number of ids generated so far
    pub fn count(&self) -> u64 {
        self.count.get()
    }

    /// Continue numbering from `count`, e.g. after rebuilding from a cache
    pub fn set_count(&self, count: u64) {
        self.count.set(count);
    }

    pub fn reset(&self) {
        self.count.set(0);
    }

    pub fn next_client_order_id(&self) -> ClientOrderId {
        let count = self.count.get() + 1;
        self.count.set(count);
        ClientOrderId::new(format!(
            "O-{}-{}-{}-{count}",
            self.clock.now().format("%Y%m%d-%H%M%S"),
            self.trader_id.tag(),
            self.strategy_id.tag()
        ))
    }

    pub fn create(&self, spec: OrderSpec) -> Result<Order, OrderError> {
        let now = self.clock.now();
        Order::new(OrderInitialized {
            trader_id: self.trader_id.clone(),
            strategy_id: self.strategy_id.clone(),
            instrument_id: spec.instrument_id,
            client_order_id: self.next_client_order_id(),
            side: spec.side,
            order_type: spec.order_type,
            quantity: spec.quantity,
            price: spec.price,
            trigger_price: spec.trigger_price,
            time_in_force: spec.time_in_force,
            post_only: spec.post_only,
            reduce_only: spec.reduce_only,
            ts_event: now,
            ts_init: now,
        })
    }

    pub fn market(&self, instrument_id: InstrumentId, side: Side, quantity: Quantity) -> Result<Order, OrderError> {
        self.create(OrderSpec::market(instrument_id, side, quantity))
    }

    pub fn limit(
        &self,
        instrument_id: InstrumentId,
        side: Side,
        quantity: Quantity,
        price: Price,
    ) -> Result<Order, OrderError> {
        self.create(OrderSpec::limit(instrument_id, side, quantity, price))
    }

    pub fn stop_market(
        &self,
        instrument_id: InstrumentId,
        side: Side,
        quantity: Quantity,
        trigger_price: Price,
    ) -> Result<Order, OrderError> {
        self.create(OrderSpec::stop_market(instrument_id, side, quantity, trigger_price))
    }

    pub fn stop_limit(
        &self,
        instrument_id: InstrumentId,
        side: Side,
        quantity: Quantity,
        price: Price,
        trigger_price: Price,
    ) -> Result<Order, OrderError> {
        self.create(OrderSpec::stop_limit(instrument_id, side, quantity, price, trigger_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tessera_clock::TestClock;
    use tessera_core::{OrderStatus, stubs};

    fn factory() -> (OrderFactory, Rc<TestClock>) {
        let clock = Rc::new(TestClock::new(stubs::ts(3_661)));
        let factory = OrderFactory::new(stubs::trader_id(), StrategyId::new("EMACross-002"), clock.clone());
        (factory, clock)
    }

    #[test]
    fn test_client_order_ids_are_deterministic() {
        let (factory, clock) = factory();
        assert_eq!(factory.next_client_order_id().as_str(), "O-20240101-010101-001-002-1");
        clock.set_time(stubs::ts(3_662));
        assert_eq!(factory.next_client_order_id().as_str(), "O-20240101-010102-001-002-2");
        assert_eq!(factory.count(), 2);

        factory.reset();
        assert_eq!(factory.next_client_order_id().as_str(), "O-20240101-010102-001-002-1");
    }

    #[test]
    fn test_market_order_defaults_to_ioc() {
        let (factory, _) = factory();
        let order = factory.market(stubs::btcusdt_id(), Side::Buy, dec!(1)).unwrap();
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.time_in_force, TimeInForce::IOC);
        assert_eq!(order.status, OrderStatus::Initialized);
        assert_eq!(order.strategy_id, StrategyId::new("EMACross-002"));
        assert_eq!(order.ts_init, stubs::ts(3_661));
    }

    #[test]
    fn test_spec_flags_reach_order() {
        let (factory, _) = factory();
        let spec = OrderSpec::limit(stubs::btcusdt_id(), Side::Sell, dec!(2), dec!(105))
            .time_in_force(TimeInForce::DAY)
            .post_only()
            .reduce_only();
        let order = factory.create(spec).unwrap();
        assert_eq!(order.price, Some(dec!(105)));
        assert_eq!(order.time_in_force, TimeInForce::DAY);
        assert!(order.post_only);
        assert!(order.reduce_only);
    }

    #[test]
    fn test_stop_limit_carries_both_prices() {
        let (factory, _) = factory();
        let order = factory
            .stop_limit(stubs::btcusdt_id(), Side::Buy, dec!(1), dec!(102), dec!(101))
            .unwrap();
        assert_eq!(order.price, Some(dec!(102)));
        assert_eq!(order.trigger_price, Some(dec!(101)));
    }

    #[test]
    fn test_invalid_quantity_is_an_error() {
        let (factory, _) = factory();
        let err = factory.market(stubs::btcusdt_id(), Side::Buy, dec!(0)).unwrap_err();
        assert!(matches!(err, OrderError::InvalidQuantity(_)));
        // The id was consumed; numbering never reuses a value
        assert_eq!(factory.count(), 1);
    }
}
