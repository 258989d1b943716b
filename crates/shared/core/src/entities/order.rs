use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{LiquiditySide, OrderStatus, OrderType, Side, TimeInForce};
use crate::error::OrderError;
use crate::events::{OrderEventAny, OrderFilled, OrderInitialized};
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, TradeId, TraderId,
    VenueOrderId,
};
use crate::values::{Price, Quantity, Timestamp};

/// Full order details
///
/// An order is only ever mutated by [`Order::apply`]; every accepted event is
/// appended to `events` so the order can be rebuilt from its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    /// The instrument being traded
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub position_id: Option<PositionId>,
    pub account_id: Option<AccountId>,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    /// Required for Limit and StopLimit orders
    pub price: Option<Price>,
    /// Required for StopMarket and StopLimit orders
    pub trigger_price: Option<Price>,
    pub time_in_force: TimeInForce,
    pub post_only: bool,
    pub reduce_only: bool,
    pub status: OrderStatus,
    pub previous_status: Option<OrderStatus>,
    pub filled_qty: Quantity,
    pub leaves_qty: Quantity,
    pub avg_px: Option<Price>,
    pub is_triggered: bool,
    pub liquidity_side: Option<LiquiditySide>,
    pub trade_ids: Vec<TradeId>,
    pub events: Vec<OrderEventAny>,
    pub ts_init: Timestamp,
    pub ts_last: Timestamp,
    pub ts_closed: Option<Timestamp>,
}

impl Order {
    /// Build an order from its initialization event
    ///
    /// Rejects non-positive quantities and missing prices as programming
    /// errors; these never reach a venue.
    pub fn new(init: OrderInitialized) -> Result<Self, OrderError> {
        if init.quantity <= Decimal::ZERO {
            return Err(OrderError::InvalidQuantity(init.quantity.to_string()));
        }
        if init.order_type.has_price() && init.price.is_none() {
            return Err(OrderError::InvalidOrder(format!(
                "{:?} order {} requires a price",
                init.order_type, init.client_order_id
            )));
        }
        if init.order_type.has_trigger() && init.trigger_price.is_none() {
            return Err(OrderError::InvalidOrder(format!(
                "{:?} order {} requires a trigger price",
                init.order_type, init.client_order_id
            )));
        }
        if init.post_only && init.order_type != OrderType::Limit {
            return Err(OrderError::InvalidOrder(format!(
                "post-only is only valid for limit orders, was {:?}",
                init.order_type
            )));
        }

        Ok(Self {
            trader_id: init.trader_id.clone(),
            strategy_id: init.strategy_id.clone(),
            instrument_id: init.instrument_id.clone(),
            client_order_id: init.client_order_id.clone(),
            venue_order_id: None,
            position_id: None,
            account_id: None,
            side: init.side,
            order_type: init.order_type,
            quantity: init.quantity,
            price: init.price,
            trigger_price: init.trigger_price,
            time_in_force: init.time_in_force,
            post_only: init.post_only,
            reduce_only: init.reduce_only,
            status: OrderStatus::Initialized,
            previous_status: None,
            filled_qty: Decimal::ZERO,
            leaves_qty: init.quantity,
            avg_px: None,
            is_triggered: false,
            liquidity_side: None,
            trade_ids: Vec::new(),
            ts_init: init.ts_init,
            ts_last: init.ts_event,
            ts_closed: None,
            events: vec![OrderEventAny::Initialized(init)],
        })
    }

    /// Apply an event, advancing the state machine
    ///
    /// On error the order is left untouched.
    pub fn apply(&mut self, event: OrderEventAny) -> Result<(), OrderError> {
        if event.client_order_id() != &self.client_order_id {
            return Err(OrderError::MismatchedOrder {
                order: self.client_order_id.clone(),
                event: event.client_order_id().clone(),
            });
        }
        if let OrderEventAny::Initialized(_) = event {
            return Err(OrderError::AlreadyInitialized(self.client_order_id.clone()));
        }
        if let OrderEventAny::Filled(fill) = &event {
            if self.trade_ids.contains(&fill.trade_id) {
                return Err(OrderError::DuplicateFill {
                    client_order_id: self.client_order_id.clone(),
                    trade_id: fill.trade_id.clone(),
                });
            }
            if self.filled_qty + fill.last_qty > self.quantity {
                return Err(OrderError::Overfill {
                    client_order_id: self.client_order_id.clone(),
                    quantity: self.quantity,
                    filled_qty: self.filled_qty,
                    last_qty: fill.last_qty,
                });
            }
        }

        let next = self.status.transition(&event)?;
        let restores = matches!(
            event,
            OrderEventAny::Updated(_)
                | OrderEventAny::ModifyRejected(_)
                | OrderEventAny::CancelRejected(_)
        ) && self.status.is_pending();

        if restores {
            // Pending request resolved; go back to where the order was
            let restored = self.previous_status.unwrap_or(OrderStatus::Accepted);
            self.previous_status = Some(self.status);
            self.status = restored;
        } else if next != self.status {
            self.previous_status = Some(self.status);
            self.status = next;
        }

        match &event {
            OrderEventAny::Submitted(e) => self.account_id = Some(e.account_id.clone()),
            OrderEventAny::Accepted(e) => {
                self.venue_order_id = Some(e.venue_order_id.clone());
                self.account_id = Some(e.account_id.clone());
            }
            OrderEventAny::Working(e) => self.venue_order_id = Some(e.venue_order_id.clone()),
            OrderEventAny::Rejected(e) => {
                self.account_id = Some(e.account_id.clone());
                self.ts_closed = Some(e.ts_event);
            }
            OrderEventAny::Denied(e) => self.ts_closed = Some(e.ts_event),
            OrderEventAny::Canceled(e) => self.ts_closed = Some(e.ts_event),
            OrderEventAny::Expired(e) => self.ts_closed = Some(e.ts_event),
            OrderEventAny::Triggered(_) => self.is_triggered = true,
            OrderEventAny::Updated(e) => {
                if let Some(venue_order_id) = &e.venue_order_id {
                    self.venue_order_id = Some(venue_order_id.clone());
                }
                self.quantity = e.quantity;
                self.leaves_qty = e.quantity - self.filled_qty;
                if e.price.is_some() {
                    self.price = e.price;
                }
                if e.trigger_price.is_some() {
                    self.trigger_price = e.trigger_price;
                }
            }
            OrderEventAny::Filled(fill) => self.filled(fill),
            _ => {}
        }

        self.ts_last = event.ts_event();
        self.events.push(event);
        Ok(())
    }

    fn filled(&mut self, fill: &OrderFilled) {
        let total = self.filled_qty + fill.last_qty;
        self.avg_px = Some(match self.avg_px {
            Some(avg) if total > Decimal::ZERO => {
                (avg * self.filled_qty + fill.last_px * fill.last_qty) / total
            }
            _ => fill.last_px,
        });
        self.filled_qty = total;
        self.leaves_qty = (self.quantity - total).max(Decimal::ZERO);

        if self.leaves_qty > Decimal::ZERO {
            self.status = OrderStatus::PartiallyFilled;
        } else {
            self.status = OrderStatus::Filled;
            self.ts_closed = Some(fill.ts_event);
        }

        self.venue_order_id = Some(fill.venue_order_id.clone());
        self.account_id = Some(fill.account_id.clone());
        if fill.position_id.is_some() {
            self.position_id = fill.position_id.clone();
        }
        self.trade_ids.push(fill.trade_id.clone());
        self.liquidity_side = Some(fill.liquidity_side);
    }

    /// Determine if an order is marketable against the best opposite price
    pub fn is_marketable(&self, best_price: Option<Price>) -> bool {
        match (self.side, self.order_type, self.price, best_price) {
            // Market orders are always marketable if there's liquidity
            (_, OrderType::Market, _, Some(_)) => true,

            // Buy limit order is marketable if limit price >= best ask
            (Side::Buy, OrderType::Limit | OrderType::StopLimit, Some(limit), Some(ask))
                if limit >= ask =>
            {
                true
            }

            // Sell limit order is marketable if limit price <= best bid
            (Side::Sell, OrderType::Limit | OrderType::StopLimit, Some(limit), Some(bid))
                if limit <= bid =>
            {
                true
            }

            _ => false,
        }
    }

    /// Signed leaves quantity (+ for buys, - for sells)
    pub fn signed_leaves_qty(&self) -> Decimal {
        self.side.sign() * self.leaves_qty
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_inflight(&self) -> bool {
        self.status.is_inflight()
    }

    /// Returns true if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.filled_qty >= self.quantity
    }

    pub fn last_event(&self) -> Option<&OrderEventAny> {
        self.events.last()
    }

    pub fn init_event(&self) -> Option<&OrderInitialized> {
        match self.events.first() {
            Some(OrderEventAny::Initialized(init)) => Some(init),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{
        OrderAccepted, OrderCancelRejected, OrderCanceled, OrderDenied, OrderExpired,
        OrderModifyRejected, OrderPendingCancel, OrderPendingUpdate, OrderRejected,
        OrderSubmitted, OrderTriggered, OrderUpdated, OrderWorking,
    };
    use crate::stubs;
    use rust_decimal_macros::dec;

    fn venue_id() -> VenueOrderId {
        VenueOrderId::new("SIM-1-1")
    }

    fn fill_for(order: &Order, qty: Decimal, px: Decimal, trade: &str) -> OrderEventAny {
        let mut fill = stubs::order_filled(order.side, qty, px, trade);
        fill.client_order_id = order.client_order_id.clone();
        OrderEventAny::Filled(fill)
    }

    /// One event of every kind for `order`
    fn every_event(order: &Order) -> Vec<OrderEventAny> {
        let ts = stubs::ts(5);
        let account = stubs::account_id();
        vec![
            OrderEventAny::Initialized(OrderInitialized::from_order(order)),
            OrderEventAny::Denied(OrderDenied::new(order, "test", ts)),
            OrderEventAny::Submitted(OrderSubmitted::new(order, account.clone(), ts)),
            OrderEventAny::Accepted(OrderAccepted::new(order, venue_id(), account.clone(), ts)),
            OrderEventAny::Working(OrderWorking::new(order, venue_id(), account.clone(), ts)),
            OrderEventAny::Rejected(OrderRejected::new(order, account.clone(), "test", ts)),
            OrderEventAny::Canceled(OrderCanceled::new(order, ts)),
            OrderEventAny::Expired(OrderExpired::new(order, ts)),
            OrderEventAny::Triggered(OrderTriggered::new(order, ts)),
            OrderEventAny::PendingUpdate(OrderPendingUpdate::new(order, account.clone(), ts)),
            OrderEventAny::PendingCancel(OrderPendingCancel::new(order, account, ts)),
            OrderEventAny::ModifyRejected(OrderModifyRejected::new(order, "test", ts)),
            OrderEventAny::CancelRejected(OrderCancelRejected::new(order, "test", ts)),
            OrderEventAny::Updated(OrderUpdated::new(order, order.quantity, order.price, None, ts)),
            fill_for(order, order.quantity, dec!(100), "T-ALL"),
        ]
    }

    #[test]
    fn test_market_order_lifecycle() {
        let mut order = stubs::market_order("O-1", Side::Buy, dec!(1));
        let account = stubs::account_id();

        order
            .apply(OrderEventAny::Submitted(OrderSubmitted::new(&order, account.clone(), stubs::ts(1))))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Submitted);
        assert!(order.is_inflight());

        order
            .apply(OrderEventAny::Accepted(OrderAccepted::new(&order, venue_id(), account, stubs::ts(1))))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.venue_order_id, Some(venue_id()));

        let fill = fill_for(&order, dec!(1), dec!(100), "T-1");
        order.apply(fill).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_qty, dec!(1));
        assert_eq!(order.leaves_qty, dec!(0));
        assert!(order.is_closed());
        assert_eq!(order.events.len(), 4);
    }

    #[test]
    fn test_limit_order_partial_fills_average_price() {
        let mut order = stubs::limit_order("O-1", Side::Buy, dec!(2), dec!(100));
        let account = stubs::account_id();
        order
            .apply(OrderEventAny::Submitted(OrderSubmitted::new(&order, account.clone(), stubs::ts(1))))
            .unwrap();
        order
            .apply(OrderEventAny::Accepted(OrderAccepted::new(&order, venue_id(), account.clone(), stubs::ts(1))))
            .unwrap();
        order
            .apply(OrderEventAny::Working(OrderWorking::new(&order, venue_id(), account, stubs::ts(1))))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Working);

        let first = fill_for(&order, dec!(1), dec!(100), "T-1");
        order.apply(first).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.leaves_qty, dec!(1));

        let second = fill_for(&order, dec!(1), dec!(98), "T-2");
        order.apply(second).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.avg_px, Some(dec!(99)));
    }

    #[test]
    fn test_illegal_transition_leaves_order_untouched() {
        let mut order = stubs::market_order("O-1", Side::Buy, dec!(1));
        let before = order.clone();

        let fill = fill_for(&order, dec!(1), dec!(100), "T-1");
        let err = order.apply(fill).unwrap_err();

        assert!(matches!(
            err,
            OrderError::InvalidStateTransition {
                status: OrderStatus::Initialized,
                event: "OrderFilled"
            }
        ));
        assert_eq!(order, before);
    }

    #[test]
    fn test_terminal_states_accept_no_events() {
        let template = stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(100));
        let terminal = [
            OrderStatus::Denied,
            OrderStatus::Rejected,
            OrderStatus::Canceled,
            OrderStatus::Expired,
            OrderStatus::Filled,
        ];

        for status in terminal {
            for event in every_event(&template) {
                let result = status.transition(&event);
                // A fill can still race a cancel at the venue
                let allowed = status == OrderStatus::Canceled
                    && matches!(event, OrderEventAny::Filled(_));
                assert_eq!(
                    result.is_ok(),
                    allowed,
                    "{status:?} + {} should be {}",
                    event.kind(),
                    if allowed { "allowed" } else { "rejected" }
                );
            }
        }
    }

    #[test]
    fn test_initialized_never_fills_or_works() {
        let template = stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(100));
        for event in every_event(&template) {
            let ok = OrderStatus::Initialized.transition(&event).is_ok();
            let expected = matches!(
                event,
                OrderEventAny::Denied(_)
                    | OrderEventAny::Submitted(_)
                    | OrderEventAny::Rejected(_)
                    | OrderEventAny::Accepted(_)
                    | OrderEventAny::Canceled(_)
                    | OrderEventAny::Expired(_)
                    | OrderEventAny::Triggered(_)
            );
            assert_eq!(ok, expected, "Initialized + {}", event.kind());
        }
    }

    #[test]
    fn test_cancel_rejected_restores_previous_status() {
        let mut order = stubs::limit_order("O-1", Side::Sell, dec!(1), dec!(110));
        let account = stubs::account_id();
        order
            .apply(OrderEventAny::Submitted(OrderSubmitted::new(&order, account.clone(), stubs::ts(1))))
            .unwrap();
        order
            .apply(OrderEventAny::Accepted(OrderAccepted::new(&order, venue_id(), account.clone(), stubs::ts(1))))
            .unwrap();
        order
            .apply(OrderEventAny::Working(OrderWorking::new(&order, venue_id(), account.clone(), stubs::ts(1))))
            .unwrap();
        order
            .apply(OrderEventAny::PendingCancel(OrderPendingCancel::new(&order, account, stubs::ts(2))))
            .unwrap();
        assert_eq!(order.status, OrderStatus::PendingCancel);

        order
            .apply(OrderEventAny::CancelRejected(OrderCancelRejected::new(&order, "too late", stubs::ts(3))))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Working);
    }

    #[test]
    fn test_update_applies_new_price_and_quantity() {
        let mut order = stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(100));
        let account = stubs::account_id();
        order
            .apply(OrderEventAny::Submitted(OrderSubmitted::new(&order, account.clone(), stubs::ts(1))))
            .unwrap();
        order
            .apply(OrderEventAny::Accepted(OrderAccepted::new(&order, venue_id(), account.clone(), stubs::ts(1))))
            .unwrap();
        order
            .apply(OrderEventAny::PendingUpdate(OrderPendingUpdate::new(&order, account, stubs::ts(2))))
            .unwrap();

        let updated = OrderUpdated::new(&order, dec!(3), Some(dec!(99)), None, stubs::ts(3));
        order.apply(OrderEventAny::Updated(updated)).unwrap();

        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.quantity, dec!(3));
        assert_eq!(order.leaves_qty, dec!(3));
        assert_eq!(order.price, Some(dec!(99)));
    }

    #[test]
    fn test_duplicate_fill_is_rejected() {
        let mut order = stubs::market_order("O-1", Side::Buy, dec!(2));
        let account = stubs::account_id();
        order
            .apply(OrderEventAny::Submitted(OrderSubmitted::new(&order, account, stubs::ts(1))))
            .unwrap();
        let fill = fill_for(&order, dec!(1), dec!(100), "T-1");
        order.apply(fill.clone()).unwrap();

        assert!(matches!(
            order.apply(fill),
            Err(OrderError::DuplicateFill { .. })
        ));
        assert_eq!(order.filled_qty, dec!(1));
    }

    #[test]
    fn test_overfill_is_rejected_and_leaves_order_unchanged() {
        let mut order = stubs::limit_order("O-1", Side::Buy, dec!(2), dec!(100));
        let account = stubs::account_id();
        order
            .apply(OrderEventAny::Submitted(OrderSubmitted::new(&order, account.clone(), stubs::ts(1))))
            .unwrap();
        order
            .apply(OrderEventAny::Accepted(OrderAccepted::new(&order, venue_id(), account, stubs::ts(1))))
            .unwrap();
        order.apply(fill_for(&order, dec!(1.5), dec!(100), "T-1")).unwrap();

        let result = order.apply(fill_for(&order, dec!(1), dec!(100), "T-2"));

        assert!(matches!(
            result,
            Err(OrderError::Overfill { filled_qty, last_qty, .. })
                if filled_qty == dec!(1.5) && last_qty == dec!(1)
        ));
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.filled_qty, dec!(1.5));
        assert_eq!(order.leaves_qty, dec!(0.5));
    }

    #[test]
    fn test_new_rejects_non_positive_quantity() {
        let init = stubs::order_init("O-1", Side::Buy, OrderType::Market, dec!(0), None);
        assert!(matches!(Order::new(init), Err(OrderError::InvalidQuantity(_))));

        let init = stubs::order_init("O-2", Side::Buy, OrderType::Limit, dec!(1), None);
        assert!(matches!(Order::new(init), Err(OrderError::InvalidOrder(_))));
    }

    #[test]
    fn test_event_for_other_order_is_rejected() {
        let mut order = stubs::market_order("O-1", Side::Buy, dec!(1));
        let other = stubs::market_order("O-2", Side::Buy, dec!(1));
        let event = OrderEventAny::Submitted(OrderSubmitted::new(&other, stubs::account_id(), stubs::ts(1)));

        assert!(matches!(
            order.apply(event),
            Err(OrderError::MismatchedOrder { .. })
        ));
    }
}
