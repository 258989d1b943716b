use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{LiquiditySide, Order, OrderType, Side, TimeInForce};
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, TradeId, TraderId,
    VenueOrderId,
};
use crate::values::{Currency, Money, Price, Quantity, Timestamp};

/// First event of every order, captured by the order factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInitialized {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
    pub time_in_force: TimeInForce,
    pub post_only: bool,
    pub reduce_only: bool,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

/// Order refused by pre-trade risk checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDenied {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub reason: String,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSubmitted {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub account_id: AccountId,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: VenueOrderId,
    pub account_id: AccountId,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

/// Order is resting on the venue's book at `price`/`trigger_price`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWorking {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: VenueOrderId,
    pub account_id: AccountId,
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub account_id: AccountId,
    pub reason: String,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCanceled {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: Option<AccountId>,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExpired {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: Option<AccountId>,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTriggered {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: Option<AccountId>,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPendingUpdate {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: AccountId,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPendingCancel {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: AccountId,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderModifyRejected {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: Option<AccountId>,
    pub reason: String,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelRejected {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: Option<AccountId>,
    pub reason: String,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdated {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: Option<AccountId>,
    pub quantity: Quantity,
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

/// An execution against the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFilled {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: VenueOrderId,
    pub account_id: AccountId,
    pub trade_id: TradeId,
    pub position_id: Option<PositionId>,
    pub side: Side,
    pub order_type: OrderType,
    pub last_qty: Quantity,
    pub last_px: Price,
    pub currency: Currency,
    pub commission: Money,
    pub liquidity_side: LiquiditySide,
    /// Set on fills synthesized locally during reconciliation
    pub reconciliation: bool,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

impl OrderFilled {
    /// Signed fill quantity (+ for buys, - for sells)
    pub fn signed_qty(&self) -> Decimal {
        self.side.sign() * self.last_qty
    }
}

/// Closed set of order events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEventAny {
    Initialized(OrderInitialized),
    Denied(OrderDenied),
    Submitted(OrderSubmitted),
    Accepted(OrderAccepted),
    Working(OrderWorking),
    Rejected(OrderRejected),
    Canceled(OrderCanceled),
    Expired(OrderExpired),
    Triggered(OrderTriggered),
    PendingUpdate(OrderPendingUpdate),
    PendingCancel(OrderPendingCancel),
    ModifyRejected(OrderModifyRejected),
    CancelRejected(OrderCancelRejected),
    Updated(OrderUpdated),
    Filled(OrderFilled),
}

macro_rules! each_event {
    ($self:ident, $e:ident => $body:expr) => {
        match $self {
            OrderEventAny::Initialized($e) => $body,
            OrderEventAny::Denied($e) => $body,
            OrderEventAny::Submitted($e) => $body,
            OrderEventAny::Accepted($e) => $body,
            OrderEventAny::Working($e) => $body,
            OrderEventAny::Rejected($e) => $body,
            OrderEventAny::Canceled($e) => $body,
            OrderEventAny::Expired($e) => $body,
            OrderEventAny::Triggered($e) => $body,
            OrderEventAny::PendingUpdate($e) => $body,
            OrderEventAny::PendingCancel($e) => $body,
            OrderEventAny::ModifyRejected($e) => $body,
            OrderEventAny::CancelRejected($e) => $body,
            OrderEventAny::Updated($e) => $body,
            OrderEventAny::Filled($e) => $body,
        }
    };
}

impl OrderEventAny {
    pub fn trader_id(&self) -> &TraderId {
        each_event!(self, e => &e.trader_id)
    }

    pub fn strategy_id(&self) -> &StrategyId {
        each_event!(self, e => &e.strategy_id)
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        each_event!(self, e => &e.instrument_id)
    }

    pub fn client_order_id(&self) -> &ClientOrderId {
        each_event!(self, e => &e.client_order_id)
    }

    pub fn ts_event(&self) -> Timestamp {
        each_event!(self, e => e.ts_event)
    }

    pub fn ts_init(&self) -> Timestamp {
        each_event!(self, e => e.ts_init)
    }

    /// Event type name used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            OrderEventAny::Initialized(_) => "OrderInitialized",
            OrderEventAny::Denied(_) => "OrderDenied",
            OrderEventAny::Submitted(_) => "OrderSubmitted",
            OrderEventAny::Accepted(_) => "OrderAccepted",
            OrderEventAny::Working(_) => "OrderWorking",
            OrderEventAny::Rejected(_) => "OrderRejected",
            OrderEventAny::Canceled(_) => "OrderCanceled",
            OrderEventAny::Expired(_) => "OrderExpired",
            OrderEventAny::Triggered(_) => "OrderTriggered",
            OrderEventAny::PendingUpdate(_) => "OrderPendingUpdate",
            OrderEventAny::PendingCancel(_) => "OrderPendingCancel",
            OrderEventAny::ModifyRejected(_) => "OrderModifyRejected",
            OrderEventAny::CancelRejected(_) => "OrderCancelRejected",
            OrderEventAny::Updated(_) => "OrderUpdated",
            OrderEventAny::Filled(_) => "OrderFilled",
        }
    }

    /// Venue order id carried by the event, if any
    pub fn venue_order_id(&self) -> Option<&VenueOrderId> {
        match self {
            OrderEventAny::Accepted(e) => Some(&e.venue_order_id),
            OrderEventAny::Working(e) => Some(&e.venue_order_id),
            OrderEventAny::Filled(e) => Some(&e.venue_order_id),
            OrderEventAny::Canceled(e) => e.venue_order_id.as_ref(),
            OrderEventAny::Expired(e) => e.venue_order_id.as_ref(),
            OrderEventAny::Triggered(e) => e.venue_order_id.as_ref(),
            OrderEventAny::PendingUpdate(e) => e.venue_order_id.as_ref(),
            OrderEventAny::PendingCancel(e) => e.venue_order_id.as_ref(),
            OrderEventAny::ModifyRejected(e) => e.venue_order_id.as_ref(),
            OrderEventAny::CancelRejected(e) => e.venue_order_id.as_ref(),
            OrderEventAny::Updated(e) => e.venue_order_id.as_ref(),
            _ => None,
        }
    }
}

// ===== Constructors from an order snapshot =====
//
// Venues and clients build events against the cached order so the identity
// fields always agree with the order the event will be applied to.

impl OrderInitialized {
    pub fn from_order(order: &Order) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            side: order.side,
            order_type: order.order_type,
            quantity: order.quantity,
            price: order.price,
            trigger_price: order.trigger_price,
            time_in_force: order.time_in_force,
            post_only: order.post_only,
            reduce_only: order.reduce_only,
            ts_event: order.ts_init,
            ts_init: order.ts_init,
        }
    }
}

impl OrderDenied {
    pub fn new(order: &Order, reason: impl Into<String>, ts: Timestamp) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            reason: reason.into(),
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderSubmitted {
    pub fn new(order: &Order, account_id: AccountId, ts: Timestamp) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            account_id,
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderAccepted {
    pub fn new(
        order: &Order,
        venue_order_id: VenueOrderId,
        account_id: AccountId,
        ts: Timestamp,
    ) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id,
            account_id,
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderWorking {
    pub fn new(
        order: &Order,
        venue_order_id: VenueOrderId,
        account_id: AccountId,
        ts: Timestamp,
    ) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id,
            account_id,
            price: order.price,
            trigger_price: order.trigger_price,
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderRejected {
    pub fn new(
        order: &Order,
        account_id: AccountId,
        reason: impl Into<String>,
        ts: Timestamp,
    ) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            account_id,
            reason: reason.into(),
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderCanceled {
    pub fn new(order: &Order, ts: Timestamp) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: order.venue_order_id.clone(),
            account_id: order.account_id.clone(),
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderExpired {
    pub fn new(order: &Order, ts: Timestamp) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: order.venue_order_id.clone(),
            account_id: order.account_id.clone(),
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderTriggered {
    pub fn new(order: &Order, ts: Timestamp) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: order.venue_order_id.clone(),
            account_id: order.account_id.clone(),
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderModifyRejected {
    pub fn new(order: &Order, reason: impl Into<String>, ts: Timestamp) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: order.venue_order_id.clone(),
            account_id: order.account_id.clone(),
            reason: reason.into(),
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderCancelRejected {
    pub fn new(order: &Order, reason: impl Into<String>, ts: Timestamp) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: order.venue_order_id.clone(),
            account_id: order.account_id.clone(),
            reason: reason.into(),
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderUpdated {
    pub fn new(
        order: &Order,
        quantity: Quantity,
        price: Option<Price>,
        trigger_price: Option<Price>,
        ts: Timestamp,
    ) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: order.venue_order_id.clone(),
            account_id: order.account_id.clone(),
            quantity,
            price,
            trigger_price,
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderPendingUpdate {
    pub fn new(order: &Order, account_id: AccountId, ts: Timestamp) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: order.venue_order_id.clone(),
            account_id,
            ts_event: ts,
            ts_init: ts,
        }
    }
}

impl OrderPendingCancel {
    pub fn new(order: &Order, account_id: AccountId, ts: Timestamp) -> Self {
        Self {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: order.venue_order_id.clone(),
            account_id,
            ts_event: ts,
            ts_init: ts,
        }
    }
}
