use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal::prelude::Signed;
use tessera_core::commands::{CancelAllOrders, CancelOrder, ModifyOrder};
use tessera_core::data::{Bar, OrderBookDepth, QuoteTick, TradeTick};
use tessera_core::events::{
    OrderAccepted, OrderCancelRejected, OrderCanceled, OrderEventAny, OrderExpired, OrderFilled,
    OrderModifyRejected, OrderRejected, OrderTriggered, OrderUpdated, OrderWorking,
};
use tessera_core::reports::{FillReport, OrderStatusReport, PositionStatusReport};
use tessera_core::{
    AccountId, ClientOrderId, Instrument, InstrumentId, LiquiditySide, Order, OrderStatus,
    OrderType, Price, Quantity, Side, StrategyId, TimeInForce, Timestamp, TradeId, VenueOrderId,
};

use crate::config::MatchingEngineConfig;
use crate::error::{MatchingError, Result};
use crate::fee_model::FeeModel;
use crate::fill_model::FillModel;

/// Net venue-side position on the engine's instrument
#[derive(Debug, Clone, Default, PartialEq)]
struct NetPosition {
    signed_qty: Decimal,
    avg_px_open: Option<Price>,
    ts_last: Option<Timestamp>,
}

impl NetPosition {
    fn apply(&mut self, signed_qty: Decimal, px: Price, ts: Timestamp) {
        let current = self.signed_qty;
        let next = current + signed_qty;

        self.avg_px_open = if next.is_zero() {
            None
        } else if current.is_zero() || current.signum() == signed_qty.signum() {
            let held = current.abs();
            let added = signed_qty.abs();
            let avg = self.avg_px_open.unwrap_or(px);
            Some((held * avg + added * px) / (held + added))
        } else if current.signum() != next.signum() {
            // Flipped through flat; the remainder opened at this price
            Some(px)
        } else {
            self.avg_px_open
        };
        self.signed_qty = next;
        self.ts_last = Some(ts);
    }
}

/// Simulated venue matching for one instrument against an L1 book
///
/// The engine keeps its own copy of every working order and applies each
/// event it emits to that copy first, so the venue view and the emitted
/// stream never disagree. Methods return the events produced by the call in
/// emission order; the caller delivers them to the execution engine.
#[derive(Debug)]
pub struct OrderMatchingEngine {
    instrument: Instrument,
    raw_id: u32,
    account_id: AccountId,
    config: MatchingEngineConfig,
    fill_model: FillModel,
    fee_model: FeeModel,
    bid: Option<Price>,
    ask: Option<Price>,
    last: Option<Price>,
    bid_size: Option<Quantity>,
    ask_size: Option<Quantity>,
    /// Working orders in arrival order
    orders: Vec<Order>,
    day_ends: BTreeMap<ClientOrderId, Timestamp>,
    seen: BTreeSet<ClientOrderId>,
    strategy_qty: BTreeMap<StrategyId, Decimal>,
    position: NetPosition,
    fills: Vec<FillReport>,
    venue_order_count: u64,
    trade_count: u64,
    events: Vec<OrderEventAny>,
}

impl OrderMatchingEngine {
    pub fn new(
        instrument: Instrument,
        raw_id: u32,
        account_id: AccountId,
        config: MatchingEngineConfig,
        fill_model: FillModel,
        fee_model: FeeModel,
    ) -> Self {
        Self {
            instrument,
            raw_id,
            account_id,
            config,
            fill_model,
            fee_model,
            bid: None,
            ask: None,
            last: None,
            bid_size: None,
            ask_size: None,
            orders: Vec::new(),
            day_ends: BTreeMap::new(),
            seen: BTreeSet::new(),
            strategy_qty: BTreeMap::new(),
            position: NetPosition::default(),
            fills: Vec::new(),
            venue_order_count: 0,
            trade_count: 0,
            events: Vec::new(),
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument.id
    }

    pub fn raw_id(&self) -> u32 {
        self.raw_id
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bid
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.ask
    }

    pub fn last(&self) -> Option<Price> {
        self.last
    }

    /// Working orders in arrival order
    pub fn orders_open(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, client_order_id: &ClientOrderId) -> Option<&Order> {
        self.orders
            .iter()
            .find(|o| &o.client_order_id == client_order_id)
    }

    /// Net signed quantity the venue holds for this instrument
    pub fn net_position(&self) -> Decimal {
        self.position.signed_qty
    }

    /// Return to the freshly constructed state, reseeding the fill model
    pub fn reset(&mut self) {
        self.bid = None;
        self.ask = None;
        self.last = None;
        self.bid_size = None;
        self.ask_size = None;
        self.orders.clear();
        self.day_ends.clear();
        self.seen.clear();
        self.strategy_qty.clear();
        self.position = NetPosition::default();
        self.fills.clear();
        self.venue_order_count = 0;
        self.trade_count = 0;
        self.events.clear();
        self.fill_model.reset();
        log::debug!("Reset matching engine: instrument_id={}", self.instrument.id);
    }

    // ===== Commands =====

    /// Take in a new order
    ///
    /// Invalid orders are rejected like a venue would; valid ones are
    /// accepted and then filled, rested or canceled by type and time in force.
    pub fn process_order(&mut self, order: &Order, ts: Timestamp) -> Vec<OrderEventAny> {
        let mut order = order.clone();

        if !self.seen.insert(order.client_order_id.clone()) {
            log::error!(
                "Dropped duplicate order: client_order_id={}, instrument_id={}",
                order.client_order_id,
                self.instrument.id
            );
            return self.drain();
        }

        if let Some(reason) = self.validate_order(&order, ts) {
            self.reject(&mut order, reason, ts);
            return self.drain();
        }

        match order.order_type {
            OrderType::Market => self.process_market_order(order, ts),
            OrderType::Limit => self.process_limit_order(order, ts),
            OrderType::StopMarket => self.process_stop_market_order(order, ts),
            OrderType::StopLimit => self.process_stop_limit_order(order, ts),
        }
        self.drain()
    }

    pub fn process_cancel(&mut self, cmd: &CancelOrder, ts: Timestamp) -> Vec<OrderEventAny> {
        match self.position_of(&cmd.client_order_id) {
            Some(idx) => {
                let mut order = self.orders.remove(idx);
                self.cancel(&mut order, ts);
            }
            None => {
                let reason = format!("Order {} not found", cmd.client_order_id);
                log::warn!(
                    "Rejected cancel: client_order_id={}, reason={}",
                    cmd.client_order_id,
                    reason
                );
                self.events
                    .push(OrderEventAny::CancelRejected(OrderCancelRejected {
                        trader_id: cmd.trader_id.clone(),
                        strategy_id: cmd.strategy_id.clone(),
                        instrument_id: cmd.instrument_id.clone(),
                        client_order_id: cmd.client_order_id.clone(),
                        venue_order_id: cmd.venue_order_id.clone(),
                        account_id: Some(self.account_id.clone()),
                        reason,
                        ts_event: ts,
                        ts_init: ts,
                    }));
            }
        }
        self.drain()
    }

    /// Cancel every working order of the command's strategy, optionally one side
    pub fn process_cancel_all(
        &mut self,
        cmd: &CancelAllOrders,
        ts: Timestamp,
    ) -> Vec<OrderEventAny> {
        let orders = std::mem::take(&mut self.orders);
        for mut order in orders {
            let matches = order.strategy_id == cmd.strategy_id
                && cmd.side.is_none_or(|side| side == order.side);
            if matches {
                self.cancel(&mut order, ts);
            } else {
                self.orders.push(order);
            }
        }
        self.drain()
    }

    /// Amend a working order, then re-evaluate it against the book
    pub fn process_modify(&mut self, cmd: &ModifyOrder, ts: Timestamp) -> Vec<OrderEventAny> {
        let Some(idx) = self.position_of(&cmd.client_order_id) else {
            let reason = format!("Order {} not found", cmd.client_order_id);
            log::warn!(
                "Rejected modify: client_order_id={}, reason={}",
                cmd.client_order_id,
                reason
            );
            self.events
                .push(OrderEventAny::ModifyRejected(OrderModifyRejected {
                    trader_id: cmd.trader_id.clone(),
                    strategy_id: cmd.strategy_id.clone(),
                    instrument_id: cmd.instrument_id.clone(),
                    client_order_id: cmd.client_order_id.clone(),
                    venue_order_id: cmd.venue_order_id.clone(),
                    account_id: Some(self.account_id.clone()),
                    reason,
                    ts_event: ts,
                    ts_init: ts,
                }));
            return self.drain();
        };

        let mut order = self.orders.remove(idx);
        let quantity = cmd.quantity.unwrap_or(order.quantity);
        let price = cmd.price.or(order.price);
        let trigger_price = cmd.trigger_price.or(order.trigger_price);

        if let Some(reason) = self.validate_modify(&order, quantity, price, trigger_price) {
            log::warn!(
                "Rejected modify: client_order_id={}, reason={}",
                order.client_order_id,
                reason
            );
            let event = OrderModifyRejected::new(&order, reason, ts);
            self.emit(&mut order, OrderEventAny::ModifyRejected(event));
            self.orders.insert(idx, order);
            return self.drain();
        }

        let event = OrderUpdated::new(&order, quantity, price, trigger_price, ts);
        self.emit(&mut order, OrderEventAny::Updated(event));
        self.match_modified(&mut order, ts);

        if order.is_open() {
            self.orders.insert(idx, order);
        }
        self.drain()
    }

    // ===== Market data =====

    pub fn process_quote_tick(&mut self, quote: &QuoteTick) -> Result<Vec<OrderEventAny>> {
        self.check_instrument(&quote.instrument_id)?;
        log::debug!(
            "Processing quote: instrument_id={}, bid={}, ask={}",
            quote.instrument_id,
            quote.bid_price,
            quote.ask_price
        );

        self.bid = Some(quote.bid_price);
        self.ask = Some(quote.ask_price);
        self.bid_size = Some(quote.bid_size);
        self.ask_size = Some(quote.ask_size);
        self.iterate(quote.ts_event);
        Ok(self.drain())
    }

    /// A trade sets both sides of the L1 book to its price
    pub fn process_trade_tick(&mut self, trade: &TradeTick) -> Result<Vec<OrderEventAny>> {
        self.check_instrument(&trade.instrument_id)?;
        log::debug!(
            "Processing trade: instrument_id={}, price={}, size={}",
            trade.instrument_id,
            trade.price,
            trade.size
        );

        self.last = Some(trade.price);
        if !self.config.trade_execution {
            return Ok(self.drain());
        }
        self.bid = Some(trade.price);
        self.ask = Some(trade.price);
        self.bid_size = Some(trade.size);
        self.ask_size = Some(trade.size);
        self.iterate(trade.ts_event);
        Ok(self.drain())
    }

    /// Walk the bar's open, high, low and close as successive L1 prices
    ///
    /// Internally aggregated bars are ignored; they were built from data
    /// the engine has already seen.
    pub fn process_bar(&mut self, bar: &Bar) -> Result<Vec<OrderEventAny>> {
        self.check_instrument(&bar.bar_type.instrument_id)?;
        if !self.config.bar_execution || bar.bar_type.is_internally_aggregated() {
            return Ok(self.drain());
        }
        log::debug!("Processing bar: bar_type={}, close={}", bar.bar_type, bar.close);

        for px in [bar.open, bar.high, bar.low, bar.close] {
            self.bid = Some(px);
            self.ask = Some(px);
            self.last = Some(px);
            self.bid_size = None;
            self.ask_size = None;
            self.iterate(bar.ts_event);
        }
        Ok(self.drain())
    }

    pub fn process_depth(&mut self, depth: &OrderBookDepth) -> Result<Vec<OrderEventAny>> {
        self.check_instrument(&depth.instrument_id)?;
        log::debug!(
            "Processing depth: instrument_id={}, levels={}",
            depth.instrument_id,
            depth.depth()
        );

        if let Some(level) = depth.best_bid() {
            self.bid = Some(level.price);
            self.bid_size = Some(level.quantity);
        }
        if let Some(level) = depth.best_ask() {
            self.ask = Some(level.price);
            self.ask_size = Some(level.quantity);
        }
        self.iterate(depth.ts_event);
        Ok(self.drain())
    }

    /// Re-evaluate working orders at `ts` without a book change
    pub fn process_time(&mut self, ts: Timestamp) -> Vec<OrderEventAny> {
        self.iterate(ts);
        self.drain()
    }

    // ===== Venue state reports =====

    pub fn order_status_reports(&self, ts: Timestamp) -> Vec<OrderStatusReport> {
        self.orders
            .iter()
            .filter_map(|order| {
                Some(OrderStatusReport {
                    account_id: self.account_id.clone(),
                    instrument_id: order.instrument_id.clone(),
                    client_order_id: Some(order.client_order_id.clone()),
                    venue_order_id: order.venue_order_id.clone()?,
                    side: order.side,
                    order_type: order.order_type,
                    time_in_force: order.time_in_force,
                    status: order.status,
                    quantity: order.quantity,
                    filled_qty: order.filled_qty,
                    avg_px: order.avg_px,
                    price: order.price,
                    trigger_price: order.trigger_price,
                    ts_last: order.ts_last,
                    ts_init: ts,
                })
            })
            .collect()
    }

    pub fn fill_reports(&self) -> &[FillReport] {
        &self.fills
    }

    pub fn position_status_report(&self, ts: Timestamp) -> Option<PositionStatusReport> {
        let ts_last = self.position.ts_last?;
        Some(PositionStatusReport {
            account_id: self.account_id.clone(),
            instrument_id: self.instrument.id.clone(),
            position_id: None,
            signed_qty: self.position.signed_qty,
            avg_px_open: self.position.avg_px_open,
            ts_last,
            ts_init: ts,
        })
    }

    // ===== Order intake =====

    fn validate_order(&self, order: &Order, ts: Timestamp) -> Option<String> {
        let instrument = &self.instrument;

        if order.instrument_id != instrument.id {
            return Some(format!(
                "Instrument {} not traded by the matching engine for {}",
                order.instrument_id, instrument.id
            ));
        }
        if let Some(reason) = self.check_quantity(order.quantity) {
            return Some(reason);
        }
        if order.order_type.has_price() && order.price.is_none() {
            return Some(format!("{:?} order requires a price", order.order_type));
        }
        if order.order_type.has_trigger() && order.trigger_price.is_none() {
            return Some(format!("{:?} order requires a trigger price", order.order_type));
        }
        for px in [order.price, order.trigger_price].into_iter().flatten() {
            if let Some(reason) = self.check_price(px) {
                return Some(reason);
            }
        }
        if let TimeInForce::GTD(expire_time) = order.time_in_force {
            if expire_time <= ts {
                return Some(format!("GTD expire time {expire_time} is in the past"));
            }
        }
        if self.config.use_reduce_only && order.reduce_only && self.would_increase(order) {
            return Some(format!(
                "REDUCE_ONLY {:?} {:?} order would have increased position",
                order.order_type, order.side
            ));
        }
        None
    }

    fn validate_modify(
        &self,
        order: &Order,
        quantity: Quantity,
        price: Option<Price>,
        trigger_price: Option<Price>,
    ) -> Option<String> {
        if let Some(reason) = self.check_quantity(quantity) {
            return Some(reason);
        }
        if quantity <= order.filled_qty {
            return Some(format!(
                "Modified quantity {} not above filled quantity {}",
                quantity, order.filled_qty
            ));
        }
        for px in [price, trigger_price].into_iter().flatten() {
            if let Some(reason) = self.check_price(px) {
                return Some(reason);
            }
        }
        if order.post_only {
            if let Some(px) = price {
                if self.is_limit_matched(order.side, px) {
                    return Some(format!(
                        "POST_ONLY LIMIT {:?} order with new limit px of {} would have been a TAKER: bid={}, ask={}",
                        order.side,
                        px,
                        fmt_px(self.bid),
                        fmt_px(self.ask)
                    ));
                }
            }
        }
        None
    }

    fn check_quantity(&self, quantity: Quantity) -> Option<String> {
        let instrument = &self.instrument;
        if quantity <= Decimal::ZERO {
            return Some(format!("Invalid order quantity {quantity}: must be positive"));
        }
        if instrument.make_qty(quantity) != quantity {
            return Some(format!(
                "Invalid order quantity {} for {}: size precision is {}",
                quantity, instrument.id, instrument.size_precision
            ));
        }
        if let Some(min) = instrument.min_quantity {
            if quantity < min {
                return Some(format!("Order quantity {quantity} below minimum {min}"));
            }
        }
        if let Some(max) = instrument.max_quantity {
            if quantity > max {
                return Some(format!("Order quantity {quantity} above maximum {max}"));
            }
        }
        None
    }

    fn check_price(&self, px: Price) -> Option<String> {
        let instrument = &self.instrument;
        if px <= Decimal::ZERO {
            return Some(format!("Invalid price {px}: must be positive"));
        }
        if instrument.make_price(px) != px {
            return Some(format!(
                "Invalid price {} for {}: price precision is {}",
                px, instrument.id, instrument.price_precision
            ));
        }
        if let Some(min) = instrument.min_price {
            if px < min {
                return Some(format!("Price {px} below minimum {min}"));
            }
        }
        if let Some(max) = instrument.max_price {
            if px > max {
                return Some(format!("Price {px} above maximum {max}"));
            }
        }
        None
    }

    fn would_increase(&self, order: &Order) -> bool {
        let held = self
            .strategy_qty
            .get(&order.strategy_id)
            .copied()
            .unwrap_or_default();
        held.is_zero() || held.signum() == order.side.sign()
    }

    /// Resting order of the same strategy an aggressive order would hit
    ///
    /// The taker fills at the touch, capped by its own limit, so only resting
    /// orders at or through that price are reachable.
    fn self_trade(&self, order: &Order) -> Option<String> {
        let touch = self.taker_price(order.side)?;
        let fill_px = match (order.side, order.price) {
            (Side::Buy, Some(limit)) => limit.min(touch),
            (Side::Sell, Some(limit)) => limit.max(touch),
            (_, None) => touch,
        };
        self.orders
            .iter()
            .filter(|resting| {
                resting.strategy_id == order.strategy_id && resting.side == order.side.opposite()
            })
            .filter(|resting| {
                resting.order_type == OrderType::Limit
                    || (resting.order_type == OrderType::StopLimit && resting.is_triggered)
            })
            .find(|resting| match (order.side, resting.price) {
                (Side::Buy, Some(resting_px)) => resting_px <= fill_px,
                (Side::Sell, Some(resting_px)) => resting_px >= fill_px,
                (_, None) => false,
            })
            .map(|resting| {
                format!(
                    "SELF_TRADE: would have matched resting order {} of strategy {}",
                    resting.client_order_id, resting.strategy_id
                )
            })
    }

    fn process_market_order(&mut self, mut order: Order, ts: Timestamp) {
        if self.taker_price(order.side).is_none() {
            let reason = format!("No market for {}", order.instrument_id);
            self.reject(&mut order, reason, ts);
            return;
        }
        if let Some(reason) = self.self_trade(&order) {
            self.reject(&mut order, reason, ts);
            return;
        }

        self.accept(&mut order, ts);
        self.fill_taker(&mut order, ts);
        if order.is_open() {
            self.cancel(&mut order, ts);
        }
    }

    fn process_limit_order(&mut self, mut order: Order, ts: Timestamp) {
        let Some(price) = order.price else {
            return;
        };
        let marketable = self.is_limit_matched(order.side, price);

        if marketable && order.post_only {
            let reason = format!(
                "POST_ONLY LIMIT {:?} order limit px of {} would have been a TAKER: bid={}, ask={}",
                order.side,
                price,
                fmt_px(self.bid),
                fmt_px(self.ask)
            );
            self.reject(&mut order, reason, ts);
            return;
        }
        if marketable {
            if let Some(reason) = self.self_trade(&order) {
                self.reject(&mut order, reason, ts);
                return;
            }
        }

        self.accept(&mut order, ts);
        if marketable {
            self.fill_taker(&mut order, ts);
        }
        self.rest_or_cancel(order, ts);
    }

    fn process_stop_market_order(&mut self, mut order: Order, ts: Timestamp) {
        let Some(trigger) = order.trigger_price else {
            return;
        };

        if self.is_stop_matched(order.side, trigger) {
            if self.config.reject_stop_orders {
                let reason = self.stop_in_market_reason(&order, trigger);
                self.reject(&mut order, reason, ts);
                return;
            }
            self.accept(&mut order, ts);
            self.fill_taker(&mut order, ts);
            if order.is_open() {
                self.cancel(&mut order, ts);
            }
            return;
        }

        self.accept(&mut order, ts);
        self.rest_or_cancel(order, ts);
    }

    fn process_stop_limit_order(&mut self, mut order: Order, ts: Timestamp) {
        let (Some(trigger), Some(price)) = (order.trigger_price, order.price) else {
            return;
        };

        if self.is_stop_matched(order.side, trigger) {
            if self.config.reject_stop_orders {
                let reason = self.stop_in_market_reason(&order, trigger);
                self.reject(&mut order, reason, ts);
                return;
            }
            self.accept(&mut order, ts);
            self.trigger(&mut order, ts);
            if self.is_limit_matched(order.side, price) {
                self.fill_taker(&mut order, ts);
            }
            self.rest_or_cancel(order, ts);
            return;
        }

        self.accept(&mut order, ts);
        self.rest_or_cancel(order, ts);
    }

    fn stop_in_market_reason(&self, order: &Order, trigger: Price) -> String {
        format!(
            "{:?} {:?} order trigger px of {} was in the market: bid={}, ask={}",
            order.order_type,
            order.side,
            trigger,
            fmt_px(self.bid),
            fmt_px(self.ask)
        )
    }

    /// Rest an open order, or cancel its remainder if it may not rest
    fn rest_or_cancel(&mut self, mut order: Order, ts: Timestamp) {
        if !order.is_open() {
            return;
        }
        if order.time_in_force.is_immediate() {
            self.cancel(&mut order, ts);
            return;
        }
        if order.status == OrderStatus::Accepted {
            if let Some(venue_order_id) = order.venue_order_id.clone() {
                let event = OrderWorking::new(&order, venue_order_id, self.account_id.clone(), ts);
                self.emit(&mut order, OrderEventAny::Working(event));
            }
        }
        self.orders.push(order);
    }

    fn match_modified(&mut self, order: &mut Order, ts: Timestamp) {
        match order.order_type {
            OrderType::Market => {}
            OrderType::Limit => {
                if order.price.is_some_and(|px| self.is_limit_matched(order.side, px)) {
                    self.fill_taker(order, ts);
                }
            }
            OrderType::StopMarket => {
                if order
                    .trigger_price
                    .is_some_and(|px| self.is_stop_matched(order.side, px))
                {
                    self.fill_taker(order, ts);
                }
            }
            OrderType::StopLimit => {
                if !order.is_triggered
                    && order
                        .trigger_price
                        .is_some_and(|px| self.is_stop_matched(order.side, px))
                {
                    self.trigger(order, ts);
                }
                if order.is_triggered
                    && order.price.is_some_and(|px| self.is_limit_matched(order.side, px))
                {
                    self.fill_taker(order, ts);
                }
            }
        }
    }

    // ===== Iteration =====

    /// Expire, trigger, then fill working orders against the current book
    fn iterate(&mut self, ts: Timestamp) {
        let mut orders = std::mem::take(&mut self.orders);

        for order in orders.iter_mut() {
            let day_end = self.day_ends.get(&order.client_order_id).copied();
            if order.time_in_force.is_expired(ts, day_end) {
                let event = OrderExpired::new(order, ts);
                self.emit(order, OrderEventAny::Expired(event));
            }
        }

        for order in orders.iter_mut().filter(|o| o.is_open()) {
            self.trigger_stop(order, ts);
        }

        for order in orders.iter_mut().filter(|o| o.is_open()) {
            self.fill_resting_limit(order, ts);
        }

        orders.retain(|o| o.is_open());
        self.day_ends
            .retain(|id, _| orders.iter().any(|o| &o.client_order_id == id));
        self.orders = orders;
    }

    fn trigger_stop(&mut self, order: &mut Order, ts: Timestamp) {
        let Some(trigger) = order.trigger_price else {
            return;
        };
        if order.is_triggered || !self.is_stop_matched(order.side, trigger) {
            return;
        }

        match order.order_type {
            OrderType::StopMarket => {
                if self.fill_model.is_stop_filled() {
                    self.fill_taker(order, ts);
                }
            }
            OrderType::StopLimit => {
                self.trigger(order, ts);
                if order.price.is_some_and(|px| self.is_limit_matched(order.side, px)) {
                    self.fill_taker(order, ts);
                }
            }
            OrderType::Market | OrderType::Limit => {}
        }
    }

    fn fill_resting_limit(&mut self, order: &mut Order, ts: Timestamp) {
        let is_limit = match order.order_type {
            OrderType::Limit => true,
            OrderType::StopLimit => order.is_triggered,
            OrderType::Market | OrderType::StopMarket => false,
        };
        let Some(price) = order.price else {
            return;
        };
        if !is_limit || !self.is_limit_matched(order.side, price) {
            return;
        }
        if self.is_at_touch(order.side, price) && !self.fill_model.is_limit_filled() {
            return;
        }

        let quantity = order.leaves_qty;
        self.fill(order, price, quantity, LiquiditySide::Maker, ts);
    }

    // ===== Book predicates =====

    fn taker_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }

    fn is_limit_matched(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.ask.is_some_and(|ask| ask <= price),
            Side::Sell => self.bid.is_some_and(|bid| bid >= price),
        }
    }

    fn is_stop_matched(&self, side: Side, trigger: Price) -> bool {
        match side {
            Side::Buy => self.ask.is_some_and(|ask| ask >= trigger),
            Side::Sell => self.bid.is_some_and(|bid| bid <= trigger),
        }
    }

    fn is_at_touch(&self, side: Side, price: Price) -> bool {
        self.taker_price(side) == Some(price)
    }

    /// False only when the book reports less size than `quantity`
    fn top_size_covers(&self, side: Side, quantity: Quantity) -> bool {
        let size = match side {
            Side::Buy => self.ask_size,
            Side::Sell => self.bid_size,
        };
        size.is_none_or(|size| size >= quantity)
    }

    // ===== Event generation =====

    fn fill_taker(&mut self, order: &mut Order, ts: Timestamp) {
        let Some(mut px) = self.taker_price(order.side) else {
            return;
        };
        if order.time_in_force == TimeInForce::FOK && !self.top_size_covers(order.side, order.leaves_qty)
        {
            log::info!(
                "Canceling FOK order: client_order_id={}, reason=insufficient size at top of book",
                order.client_order_id
            );
            self.cancel(order, ts);
            return;
        }

        if self.fill_model.is_slipped() {
            let increment = self.instrument.price_increment;
            px = match order.side {
                Side::Buy => px + increment,
                Side::Sell => px - increment,
            };
            // Slippage never crosses the order's own limit
            if let Some(limit) = order.price {
                px = match order.side {
                    Side::Buy => px.min(limit),
                    Side::Sell => px.max(limit),
                };
            }
        }

        let quantity = order.leaves_qty;
        self.fill(order, px, quantity, LiquiditySide::Taker, ts);
    }

    fn fill(
        &mut self,
        order: &mut Order,
        last_px: Price,
        last_qty: Quantity,
        liquidity_side: LiquiditySide,
        ts: Timestamp,
    ) {
        let Some(venue_order_id) = order.venue_order_id.clone() else {
            log::error!(
                "Cannot fill unaccepted order: client_order_id={}",
                order.client_order_id
            );
            return;
        };
        let commission =
            self.fee_model
                .commission(&self.instrument, last_qty, last_px, liquidity_side);
        let trade_id = self.next_trade_id();

        let fill = OrderFilled {
            trader_id: order.trader_id.clone(),
            strategy_id: order.strategy_id.clone(),
            instrument_id: order.instrument_id.clone(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: venue_order_id.clone(),
            account_id: self.account_id.clone(),
            trade_id: trade_id.clone(),
            position_id: None,
            side: order.side,
            order_type: order.order_type,
            last_qty,
            last_px,
            currency: self.instrument.quote_currency.clone(),
            commission: commission.clone(),
            liquidity_side,
            reconciliation: false,
            ts_event: ts,
            ts_init: ts,
        };
        let signed_qty = fill.signed_qty();

        if !self.emit(order, OrderEventAny::Filled(fill)) {
            return;
        }
        log::info!(
            "Filled order: client_order_id={}, qty={}, px={}, liquidity={:?}, commission={}",
            order.client_order_id,
            last_qty,
            last_px,
            liquidity_side,
            commission
        );

        *self
            .strategy_qty
            .entry(order.strategy_id.clone())
            .or_default() += signed_qty;
        self.position.apply(signed_qty, last_px, ts);
        self.fills.push(FillReport {
            account_id: self.account_id.clone(),
            instrument_id: order.instrument_id.clone(),
            venue_order_id,
            client_order_id: Some(order.client_order_id.clone()),
            trade_id,
            side: order.side,
            last_qty,
            last_px,
            commission,
            liquidity_side,
            ts_event: ts,
            ts_init: ts,
        });
    }

    fn accept(&mut self, order: &mut Order, ts: Timestamp) {
        let venue_order_id = self.next_venue_order_id();
        let event = OrderAccepted::new(order, venue_order_id, self.account_id.clone(), ts);
        if self.emit(order, OrderEventAny::Accepted(event)) && order.time_in_force == TimeInForce::DAY
        {
            if let Some(day_end) = next_midnight(ts) {
                self.day_ends.insert(order.client_order_id.clone(), day_end);
            }
        }
    }

    fn reject(&mut self, order: &mut Order, reason: String, ts: Timestamp) {
        log::warn!(
            "Rejected order: client_order_id={}, reason={}",
            order.client_order_id,
            reason
        );
        let event = OrderRejected::new(order, self.account_id.clone(), reason, ts);
        self.emit(order, OrderEventAny::Rejected(event));
    }

    fn cancel(&mut self, order: &mut Order, ts: Timestamp) {
        let event = OrderCanceled::new(order, ts);
        self.emit(order, OrderEventAny::Canceled(event));
    }

    fn trigger(&mut self, order: &mut Order, ts: Timestamp) {
        let event = OrderTriggered::new(order, ts);
        self.emit(order, OrderEventAny::Triggered(event));
    }

    /// Apply to the venue copy, then queue for delivery
    fn emit(&mut self, order: &mut Order, event: OrderEventAny) -> bool {
        match order.apply(event.clone()) {
            Ok(()) => {
                self.events.push(event);
                true
            }
            Err(e) => {
                log::error!(
                    "Dropped venue event: client_order_id={}, event={}, error={}",
                    order.client_order_id,
                    event.kind(),
                    e
                );
                false
            }
        }
    }

    fn drain(&mut self) -> Vec<OrderEventAny> {
        std::mem::take(&mut self.events)
    }

    fn position_of(&self, client_order_id: &ClientOrderId) -> Option<usize> {
        self.orders
            .iter()
            .position(|o| &o.client_order_id == client_order_id)
    }

    fn check_instrument(&self, instrument_id: &InstrumentId) -> Result<()> {
        if instrument_id == &self.instrument.id {
            Ok(())
        } else {
            Err(MatchingError::InstrumentMismatch {
                expected: self.instrument.id.clone(),
                received: instrument_id.clone(),
            })
        }
    }

    fn next_venue_order_id(&mut self) -> VenueOrderId {
        self.venue_order_count += 1;
        VenueOrderId::new(format!(
            "{}-{}-{}",
            self.instrument.id.venue, self.raw_id, self.venue_order_count
        ))
    }

    fn next_trade_id(&mut self) -> TradeId {
        self.trade_count += 1;
        TradeId::new(format!(
            "{}-{}-{}",
            self.instrument.id.venue, self.raw_id, self.trade_count
        ))
    }
}

/// Start of the UTC day after `ts`
fn next_midnight(ts: Timestamp) -> Option<Timestamp> {
    let next_day = ts.date_naive().checked_add_signed(Duration::days(1))?;
    Some(next_day.and_hms_opt(0, 0, 0)?.and_utc())
}

fn fmt_px(px: Option<Price>) -> String {
    px.map_or_else(|| "None".to_string(), |px| px.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tessera_core::events::OrderInitialized;
    use tessera_core::{AggressorSide, stubs};

    use crate::fill_model::FillModelConfig;

    fn engine_with(config: MatchingEngineConfig, fill: FillModelConfig) -> OrderMatchingEngine {
        let _ = env_logger::builder().is_test(true).try_init();
        OrderMatchingEngine::new(
            stubs::btcusdt(),
            1,
            stubs::account_id(),
            config,
            FillModel::new(fill).unwrap(),
            FeeModel::MakerTaker,
        )
    }

    fn engine() -> OrderMatchingEngine {
        engine_with(MatchingEngineConfig::default(), FillModelConfig::default())
    }

    fn init(id: &str, side: Side, order_type: OrderType, qty: Quantity) -> OrderInitialized {
        stubs::order_init(id, side, order_type, qty, None)
    }

    fn stop_market(id: &str, side: Side, qty: Quantity, trigger: Price) -> Order {
        Order::new(OrderInitialized {
            trigger_price: Some(trigger),
            ..init(id, side, OrderType::StopMarket, qty)
        })
        .unwrap()
    }

    fn stop_limit(id: &str, side: Side, qty: Quantity, trigger: Price, price: Price) -> Order {
        Order::new(OrderInitialized {
            price: Some(price),
            trigger_price: Some(trigger),
            ..init(id, side, OrderType::StopLimit, qty)
        })
        .unwrap()
    }

    fn with_tif(order: Order, tif: TimeInForce) -> Order {
        let init = order.init_event().cloned().unwrap();
        Order::new(OrderInitialized {
            time_in_force: tif,
            ..init
        })
        .unwrap()
    }

    fn kinds(events: &[OrderEventAny]) -> Vec<&'static str> {
        events.iter().map(|e| e.kind()).collect()
    }

    fn fill_of(events: &[OrderEventAny]) -> &OrderFilled {
        events
            .iter()
            .find_map(|e| match e {
                OrderEventAny::Filled(f) => Some(f),
                _ => None,
            })
            .unwrap()
    }

    fn quote(engine: &mut OrderMatchingEngine, bid: Price, ask: Price, secs: i64) -> Vec<OrderEventAny> {
        engine
            .process_quote_tick(&stubs::quote(bid, ask, secs))
            .unwrap()
    }

    fn cancel_cmd(id: &str) -> CancelOrder {
        CancelOrder {
            trader_id: stubs::trader_id(),
            strategy_id: stubs::strategy_id(),
            client_id: None,
            instrument_id: stubs::btcusdt_id(),
            client_order_id: ClientOrderId::new(id),
            venue_order_id: None,
            command_id: Default::default(),
            ts_init: stubs::ts(5),
        }
    }

    fn modify_cmd(id: &str, quantity: Option<Quantity>, price: Option<Price>) -> ModifyOrder {
        ModifyOrder {
            trader_id: stubs::trader_id(),
            strategy_id: stubs::strategy_id(),
            client_id: None,
            instrument_id: stubs::btcusdt_id(),
            client_order_id: ClientOrderId::new(id),
            venue_order_id: None,
            quantity,
            price,
            trigger_price: None,
            command_id: Default::default(),
            ts_init: stubs::ts(5),
        }
    }

    #[test]
    fn test_market_buy_fills_at_ask_as_taker() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);

        let order = stubs::market_order("O-1", Side::Buy, dec!(2));
        let events = engine.process_order(&order, stubs::ts(2));

        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderFilled"]);
        let fill = fill_of(&events);
        assert_eq!(fill.last_qty, dec!(2));
        assert_eq!(fill.last_px, dec!(100));
        assert_eq!(fill.liquidity_side, LiquiditySide::Taker);
        assert_eq!(fill.commission.amount, dec!(0.1));
        assert_eq!(fill.venue_order_id, VenueOrderId::new("SIM-1-1"));
        assert_eq!(fill.trade_id, TradeId::new("SIM-1-1"));
        assert_eq!(engine.net_position(), dec!(2));
        assert!(engine.orders_open().is_empty());
    }

    #[test]
    fn test_market_without_book_rejected() {
        let mut engine = engine();
        let order = stubs::market_order("O-1", Side::Sell, dec!(1));

        let events = engine.process_order(&order, stubs::ts(1));

        let OrderEventAny::Rejected(rejected) = &events[0] else {
            panic!("expected rejection, got {events:?}");
        };
        assert_eq!(rejected.reason, "No market for BTCUSDT.SIM");
    }

    #[test]
    fn test_invalid_precision_rejected() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);

        let qty = stubs::limit_order("O-1", Side::Buy, dec!(0.0001), dec!(90));
        let px = stubs::limit_order("O-2", Side::Buy, dec!(1), dec!(90.001));

        let e1 = engine.process_order(&qty, stubs::ts(2));
        let e2 = engine.process_order(&px, stubs::ts(2));

        assert_eq!(kinds(&e1), vec!["OrderRejected"]);
        assert_eq!(kinds(&e2), vec!["OrderRejected"]);
    }

    #[test]
    fn test_quantity_above_instrument_max_rejected() {
        let mut engine = OrderMatchingEngine::new(
            stubs::btcusdt().with_quantity_bounds(Some(dec!(0.001)), Some(dec!(5))),
            1,
            stubs::account_id(),
            MatchingEngineConfig::default(),
            FillModel::default(),
            FeeModel::MakerTaker,
        );
        quote(&mut engine, dec!(99), dec!(100), 1);

        let events = engine.process_order(&stubs::market_order("O-1", Side::Buy, dec!(6)), stubs::ts(2));

        let OrderEventAny::Rejected(rejected) = &events[0] else {
            panic!("expected rejection");
        };
        assert!(rejected.reason.contains("above maximum"));
    }

    #[test]
    fn test_limit_away_rests_then_fills_as_maker_on_cross() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);

        let order = stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(95));
        let events = engine.process_order(&order, stubs::ts(2));
        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderWorking"]);
        assert_eq!(engine.orders_open().len(), 1);

        assert!(quote(&mut engine, dec!(96), dec!(97), 3).is_empty());

        let events = quote(&mut engine, dec!(93), dec!(94), 4);
        assert_eq!(kinds(&events), vec!["OrderFilled"]);
        let fill = fill_of(&events);
        assert_eq!(fill.last_px, dec!(95));
        assert_eq!(fill.liquidity_side, LiquiditySide::Maker);
        assert_eq!(fill.commission.amount, dec!(0.019));
        assert!(engine.orders_open().is_empty());
    }

    #[test]
    fn test_marketable_limit_fills_at_touch_as_taker() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);

        let order = stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(101));
        let events = engine.process_order(&order, stubs::ts(2));

        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderFilled"]);
        assert_eq!(fill_of(&events).last_px, dec!(100));
        assert_eq!(fill_of(&events).liquidity_side, LiquiditySide::Taker);
    }

    #[test]
    fn test_post_only_crossing_rejected() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let mut init = stubs::order_init("O-1", Side::Sell, OrderType::Limit, dec!(1), Some(dec!(98)));
        init.post_only = true;
        let order = Order::new(init).unwrap();

        let events = engine.process_order(&order, stubs::ts(2));

        let OrderEventAny::Rejected(rejected) = &events[0] else {
            panic!("expected rejection");
        };
        assert!(rejected.reason.starts_with("POST_ONLY"));
    }

    #[test]
    fn test_ioc_away_from_market_canceled() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let order = with_tif(
            stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(90)),
            TimeInForce::IOC,
        );

        let events = engine.process_order(&order, stubs::ts(2));

        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderCanceled"]);
        assert!(engine.orders_open().is_empty());
    }

    #[test]
    fn test_fok_larger_than_top_size_canceled() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let order = with_tif(
            stubs::limit_order("O-1", Side::Buy, dec!(20), dec!(100)),
            TimeInForce::FOK,
        );

        let events = engine.process_order(&order, stubs::ts(2));

        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderCanceled"]);
    }

    #[test]
    fn test_fok_within_top_size_fills() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let order = with_tif(
            stubs::limit_order("O-1", Side::Buy, dec!(10), dec!(100)),
            TimeInForce::FOK,
        );

        let events = engine.process_order(&order, stubs::ts(2));

        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderFilled"]);
    }

    #[test]
    fn test_reduce_only_that_would_increase_rejected() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let mut init = stubs::order_init("O-1", Side::Buy, OrderType::Market, dec!(1), None);
        init.reduce_only = true;

        let events = engine.process_order(&Order::new(init).unwrap(), stubs::ts(2));

        let OrderEventAny::Rejected(rejected) = &events[0] else {
            panic!("expected rejection");
        };
        assert!(rejected.reason.contains("REDUCE_ONLY"));
    }

    #[test]
    fn test_reduce_only_sell_after_buy_fills() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        engine.process_order(&stubs::market_order("O-1", Side::Buy, dec!(2)), stubs::ts(2));
        let mut init = stubs::order_init("O-2", Side::Sell, OrderType::Market, dec!(1), None);
        init.reduce_only = true;

        let events = engine.process_order(&Order::new(init).unwrap(), stubs::ts(3));

        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderFilled"]);
        assert_eq!(engine.net_position(), dec!(1));
    }

    #[test]
    fn test_aggressive_order_against_own_resting_order_rejected() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        // Resting at the touch, where the market buy would fill
        engine.process_order(&stubs::limit_order("O-1", Side::Sell, dec!(1), dec!(100)), stubs::ts(2));

        let events = engine.process_order(&stubs::market_order("O-2", Side::Buy, dec!(1)), stubs::ts(3));

        let OrderEventAny::Rejected(rejected) = &events[0] else {
            panic!("expected rejection");
        };
        assert!(rejected.reason.starts_with("SELF_TRADE"));
        assert!(rejected.reason.contains("O-1"));
    }

    #[test]
    fn test_own_resting_order_away_from_touch_does_not_block_taker() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let resting = engine.process_order(&stubs::limit_order("O-1", Side::Sell, dec!(1), dec!(200)), stubs::ts(2));
        assert_eq!(kinds(&resting), vec!["OrderAccepted", "OrderWorking"]);

        let events = engine.process_order(&stubs::market_order("O-2", Side::Buy, dec!(1)), stubs::ts(3));

        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderFilled"]);
        let OrderEventAny::Filled(fill) = &events[1] else {
            panic!("expected fill");
        };
        assert_eq!(fill.last_px, dec!(100));
    }

    #[test]
    fn test_marketable_limit_self_trade_uses_capped_fill_price() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        engine.process_order(&stubs::limit_order("O-1", Side::Sell, dec!(1), dec!(100.5)), stubs::ts(2));

        // Limit 101 is marketable but fills at the ask of 100, below the resting 100.5
        let events = engine.process_order(&stubs::limit_order("O-2", Side::Buy, dec!(1), dec!(101)), stubs::ts(3));

        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderFilled"]);
    }

    #[test]
    fn test_stop_in_market_rejected_by_default() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);

        let events = engine.process_order(&stop_market("O-1", Side::Buy, dec!(1), dec!(99.5)), stubs::ts(2));

        let OrderEventAny::Rejected(rejected) = &events[0] else {
            panic!("expected rejection");
        };
        assert!(rejected.reason.contains("was in the market"));
    }

    #[test]
    fn test_stop_market_triggers_and_fills_on_move() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let events = engine.process_order(&stop_market("O-1", Side::Buy, dec!(1), dec!(102)), stubs::ts(2));
        assert_eq!(kinds(&events), vec!["OrderAccepted", "OrderWorking"]);

        let events = quote(&mut engine, dec!(102), dec!(103), 3);

        assert_eq!(kinds(&events), vec!["OrderFilled"]);
        assert_eq!(fill_of(&events).last_px, dec!(103));
        assert_eq!(fill_of(&events).liquidity_side, LiquiditySide::Taker);
    }

    #[test]
    fn test_stop_limit_triggers_then_rests_as_limit() {
        let mut engine = engine();
        quote(&mut engine, dec!(100), dec!(101), 1);
        let order = stop_limit("O-1", Side::Sell, dec!(1), dec!(98), dec!(97));
        engine.process_order(&order, stubs::ts(2));

        // Trigger hit but the limit is above the new bid
        let events = quote(&mut engine, dec!(96), dec!(98), 3);
        assert_eq!(kinds(&events), vec!["OrderTriggered"]);
        assert!(engine.order(&"O-1".into()).unwrap().is_triggered);

        // Bid returns above the limit; resting limit fills as maker
        let events = quote(&mut engine, dec!(97.5), dec!(98), 4);
        assert_eq!(kinds(&events), vec!["OrderFilled"]);
        assert_eq!(fill_of(&events).last_px, dec!(97));
        assert_eq!(fill_of(&events).liquidity_side, LiquiditySide::Maker);
    }

    #[test]
    fn test_gtd_expires_on_update() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let order = with_tif(
            stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(90)),
            TimeInForce::GTD(stubs::ts(10)),
        );
        engine.process_order(&order, stubs::ts(2));

        assert!(quote(&mut engine, dec!(99), dec!(100), 9).is_empty());
        let events = quote(&mut engine, dec!(99), dec!(100), 10);

        assert_eq!(kinds(&events), vec!["OrderExpired"]);
        assert!(engine.orders_open().is_empty());
    }

    #[test]
    fn test_gtd_in_past_rejected() {
        let mut engine = engine();
        let order = with_tif(
            stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(90)),
            TimeInForce::GTD(stubs::ts(1)),
        );

        let events = engine.process_order(&order, stubs::ts(2));

        assert_eq!(kinds(&events), vec!["OrderRejected"]);
    }

    #[test]
    fn test_day_order_expires_at_midnight() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let order = with_tif(
            stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(90)),
            TimeInForce::DAY,
        );
        engine.process_order(&order, stubs::ts(60));

        assert!(quote(&mut engine, dec!(99), dec!(100), 86_399).is_empty());
        let events = quote(&mut engine, dec!(99), dec!(100), 86_400);

        assert_eq!(kinds(&events), vec!["OrderExpired"]);
    }

    #[test]
    fn test_limit_at_touch_respects_fill_probability() {
        let mut engine = engine_with(
            MatchingEngineConfig::default(),
            FillModelConfig {
                prob_fill_on_limit: 0.0,
                random_seed: Some(1),
                ..FillModelConfig::default()
            },
        );
        quote(&mut engine, dec!(99), dec!(100), 1);
        engine.process_order(&stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(98)), stubs::ts(2));

        // Ask exactly at the limit: the draw says no
        assert!(quote(&mut engine, dec!(97), dec!(98), 3).is_empty());
        // Through the limit: fills regardless of the draw
        let events = quote(&mut engine, dec!(96), dec!(97), 4);
        assert_eq!(kinds(&events), vec!["OrderFilled"]);
    }

    #[test]
    fn test_slippage_worsens_taker_price_by_one_increment() {
        let mut engine = engine_with(
            MatchingEngineConfig::default(),
            FillModelConfig {
                prob_slippage: 1.0,
                random_seed: Some(1),
                ..FillModelConfig::default()
            },
        );
        quote(&mut engine, dec!(99), dec!(100), 1);

        let buy = engine.process_order(&stubs::market_order("O-1", Side::Buy, dec!(1)), stubs::ts(2));
        let sell = engine.process_order(&stubs::market_order("O-2", Side::Sell, dec!(1)), stubs::ts(2));

        assert_eq!(fill_of(&buy).last_px, dec!(100.01));
        assert_eq!(fill_of(&sell).last_px, dec!(98.99));
    }

    #[test]
    fn test_cancel_unknown_order_rejected() {
        let mut engine = engine();

        let events = engine.process_cancel(&cancel_cmd("O-9"), stubs::ts(5));

        let OrderEventAny::CancelRejected(rejected) = &events[0] else {
            panic!("expected cancel rejection");
        };
        assert!(rejected.reason.contains("O-9"));
    }

    #[test]
    fn test_cancel_working_order() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        engine.process_order(&stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(90)), stubs::ts(2));

        let events = engine.process_cancel(&cancel_cmd("O-1"), stubs::ts(5));

        assert_eq!(kinds(&events), vec!["OrderCanceled"]);
        assert!(engine.orders_open().is_empty());
    }

    #[test]
    fn test_modify_unknown_order_rejected() {
        let mut engine = engine();

        let events = engine.process_modify(&modify_cmd("O-9", Some(dec!(2)), None), stubs::ts(5));

        assert_eq!(kinds(&events), vec!["OrderModifyRejected"]);
    }

    #[test]
    fn test_modify_into_market_fills() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        engine.process_order(&stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(90)), stubs::ts(2));

        let events = engine.process_modify(&modify_cmd("O-1", None, Some(dec!(100))), stubs::ts(5));

        assert_eq!(kinds(&events), vec!["OrderUpdated", "OrderFilled"]);
        assert_eq!(fill_of(&events).last_px, dec!(100));
        assert!(engine.orders_open().is_empty());
    }

    #[test]
    fn test_modify_quantity_keeps_order_working() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        engine.process_order(&stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(90)), stubs::ts(2));

        let events = engine.process_modify(&modify_cmd("O-1", Some(dec!(3)), None), stubs::ts(5));

        assert_eq!(kinds(&events), vec!["OrderUpdated"]);
        let order = engine.order(&"O-1".into()).unwrap();
        assert_eq!(order.quantity, dec!(3));
        assert_eq!(order.status, OrderStatus::Working);
    }

    #[test]
    fn test_trade_tick_moves_book() {
        let mut engine = engine();
        engine.process_order(&stubs::limit_order("O-1", Side::Sell, dec!(1), dec!(105)), stubs::ts(1));

        let trade = TradeTick::new(
            stubs::btcusdt_id(),
            dec!(105.5),
            dec!(3),
            AggressorSide::Buyer,
            TradeId::new("T-1"),
            stubs::ts(2),
        );
        let events = engine.process_trade_tick(&trade).unwrap();

        assert_eq!(kinds(&events), vec!["OrderFilled"]);
        assert_eq!(engine.last(), Some(dec!(105.5)));
    }

    #[test]
    fn test_data_for_other_instrument_errors() {
        let mut engine = engine();
        let mut quote = stubs::quote(dec!(1), dec!(2), 1);
        quote.instrument_id = InstrumentId::new("ETHUSDT", "SIM");

        let err = engine.process_quote_tick(&quote).unwrap_err();

        assert!(matches!(err, MatchingError::InstrumentMismatch { .. }));
    }

    #[test]
    fn test_reports_reflect_venue_state() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        engine.process_order(&stubs::market_order("O-1", Side::Buy, dec!(1)), stubs::ts(2));
        engine.process_order(&stubs::market_order("O-2", Side::Buy, dec!(1)), stubs::ts(3));
        quote(&mut engine, dec!(109), dec!(110), 4);
        engine.process_order(&stubs::market_order("O-3", Side::Buy, dec!(2)), stubs::ts(5));
        engine.process_order(&stubs::limit_order("O-4", Side::Buy, dec!(1), dec!(50)), stubs::ts(6));

        let position = engine.position_status_report(stubs::ts(7)).unwrap();
        assert_eq!(position.signed_qty, dec!(4));
        assert_eq!(position.avg_px_open, Some(dec!(105)));
        assert_eq!(engine.fill_reports().len(), 3);
        let orders = engine.order_status_reports(stubs::ts(7));
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].venue_order_id, VenueOrderId::new("SIM-1-4"));
    }

    #[test]
    fn test_reset_reproduces_identical_ids() {
        let mut engine = engine();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let first = engine.process_order(&stubs::market_order("O-1", Side::Buy, dec!(1)), stubs::ts(2));

        engine.reset();
        quote(&mut engine, dec!(99), dec!(100), 1);
        let second = engine.process_order(&stubs::market_order("O-1", Side::Buy, dec!(1)), stubs::ts(2));

        assert_eq!(first, second);
    }
}
