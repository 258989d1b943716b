//! Risk Engine
//!
//! Gatekeeper between strategies and the execution engine. Submit and modify
//! commands are checked against the configured limits; cancels always pass.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_cache::Cache;
use tessera_common::{Component, ComponentCore, Endpoints, Message, MessageBus, MessageHandler, Throttler};
use tessera_core::commands::{ModifyOrder, SubmitOrder, TradingCommand};
use tessera_core::data::PriceType;
use tessera_core::events::{OrderDenied, OrderEventAny, OrderModifyRejected};
use tessera_core::{Instrument, InstrumentId, Order, Price, Quantity, Side, StrategyId};
use tessera_ports::Clock;

use crate::config::RiskEngineConfig;
use crate::error::Result;

/// Which orders the risk engine lets through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TradingState {
    /// All orders admitted
    #[default]
    Active,
    /// Only orders that reduce an open position admitted
    Reducing,
    /// No new orders or modifications admitted
    Halted,
}

impl fmt::Display for TradingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingState::Active => write!(f, "ACTIVE"),
            TradingState::Reducing => write!(f, "REDUCING"),
            TradingState::Halted => write!(f, "HALTED"),
        }
    }
}

pub struct RiskEngine {
    core: ComponentCore,
    weak: Weak<RiskEngine>,
    clock: Rc<dyn Clock>,
    cache: Rc<RefCell<Cache>>,
    msgbus: Rc<MessageBus>,
    config: RiskEngineConfig,
    trading_state: Cell<TradingState>,
    max_notional: RefCell<BTreeMap<InstrumentId, Decimal>>,
    submit_throttler: RefCell<Throttler>,
    modify_throttler: RefCell<Throttler>,
    command_count: Cell<u64>,
    denied_count: Cell<u64>,
}

impl RiskEngine {
    pub fn new(
        clock: Rc<dyn Clock>,
        cache: Rc<RefCell<Cache>>,
        msgbus: Rc<MessageBus>,
        config: RiskEngineConfig,
    ) -> Rc<Self> {
        let submit = config.max_order_submit_rate;
        let modify = config.max_order_modify_rate;
        Rc::new_cyclic(|weak| Self {
            core: ComponentCore::new("RiskEngine"),
            weak: weak.clone(),
            clock,
            cache,
            msgbus,
            max_notional: RefCell::new(config.max_notional_per_order.clone()),
            submit_throttler: RefCell::new(Throttler::new("ORDER_SUBMIT_THROTTLER", submit.limit, submit.interval())),
            modify_throttler: RefCell::new(Throttler::new("ORDER_MODIFY_THROTTLER", modify.limit, modify.interval())),
            config,
            trading_state: Cell::new(TradingState::Active),
            command_count: Cell::new(0),
            denied_count: Cell::new(0),
        })
    }

    pub fn config(&self) -> &RiskEngineConfig {
        &self.config
    }

    /// Register the `RiskEngine.execute` endpoint
    pub fn register_endpoints(&self) -> Result<()> {
        let weak = self.weak.clone();
        self.msgbus.register(
            Endpoints::RISK_ENGINE_EXECUTE,
            MessageHandler::new(Endpoints::RISK_ENGINE_EXECUTE, move |msg| {
                let Some(engine) = weak.upgrade() else {
                    return Ok(());
                };
                match msg {
                    Message::TradingCommand(cmd) => Ok(engine.execute(cmd)?),
                    other => {
                        log::warn!("Dropped unexpected message: endpoint=RiskEngine.execute, kind={}", other.kind());
                        Ok(())
                    }
                }
            }),
        )?;
        Ok(())
    }

    pub fn trading_state(&self) -> TradingState {
        self.trading_state.get()
    }

    pub fn set_trading_state(&self, state: TradingState) {
        let previous = self.trading_state.replace(state);
        if previous == state {
            return;
        }
        if state == TradingState::Halted {
            log::warn!("Changed trading state: from={previous}, to={state}");
        } else {
            log::info!("Changed trading state: from={previous}, to={state}");
        }
    }

    /// Override the per-order notional limit for one instrument
    pub fn set_max_notional_per_order(&self, instrument_id: InstrumentId, notional: Decimal) {
        self.max_notional.borrow_mut().insert(instrument_id, notional);
    }

    pub fn max_notional_per_order(&self, instrument_id: &InstrumentId) -> Option<Decimal> {
        self.max_notional.borrow().get(instrument_id).copied()
    }

    pub fn command_count(&self) -> u64 {
        self.command_count.get()
    }

    pub fn denied_count(&self) -> u64 {
        self.denied_count.get()
    }

    /// Check a command and forward it to the execution engine if it passes
    pub fn execute(&self, command: &TradingCommand) -> Result<()> {
        self.command_count.set(self.command_count.get() + 1);
        if self.config.bypass {
            return self.forward(command);
        }
        match command {
            TradingCommand::SubmitOrder(cmd) => self.handle_submit(command, cmd),
            TradingCommand::ModifyOrder(cmd) => self.handle_modify(command, cmd),
            TradingCommand::CancelOrder(_) | TradingCommand::CancelAllOrders(_) => self.forward(command),
        }
    }

    fn forward(&self, command: &TradingCommand) -> Result<()> {
        self.msgbus.send(
            Endpoints::EXEC_ENGINE_EXECUTE,
            &Message::TradingCommand(command.clone()),
        )?;
        Ok(())
    }

    fn handle_submit(&self, command: &TradingCommand, cmd: &SubmitOrder) -> Result<()> {
        let order = &cmd.order;
        if let Some(reason) = self.check_submit(order) {
            return self.deny(cmd, reason);
        }
        if !self.submit_throttler.borrow_mut().try_acquire(self.clock.now()) {
            let limit = self.config.max_order_submit_rate;
            return self.deny(
                cmd,
                format!("exceeded MAX_ORDER_SUBMIT_RATE {}/{}ms", limit.limit, limit.interval_ms),
            );
        }
        self.forward(command)
    }

    fn check_submit(&self, order: &Order) -> Option<String> {
        match self.trading_state.get() {
            TradingState::Halted => return Some("trading state HALTED".to_string()),
            TradingState::Reducing if self.increases_position(order) => {
                return Some(format!(
                    "trading state REDUCING and {:?} {} would increase position",
                    order.side, order.quantity
                ));
            }
            _ => {}
        }

        let instrument = self.cache.borrow().instrument(&order.instrument_id).cloned();
        let Some(instrument) = instrument else {
            return Some(format!("instrument {} not found", order.instrument_id));
        };

        self.check_quantity(&instrument, order.quantity)
            .or_else(|| self.check_prices(&instrument, order.side, order.price, order.trigger_price))
            .or_else(|| self.check_notional(&instrument, order))
            .or_else(|| self.check_reduce_only(order))
            .or_else(|| self.check_position_size(order))
    }

    fn deny(&self, cmd: &SubmitOrder, reason: String) -> Result<()> {
        self.denied_count.set(self.denied_count.get() + 1);
        let order = &cmd.order;
        log::warn!(
            "Denied order: client_order_id={}, strategy={}, reason={reason}",
            order.client_order_id,
            order.strategy_id
        );
        self.cache
            .borrow_mut()
            .add_order(order.clone(), cmd.position_id.clone(), cmd.client_id.clone())?;
        let denied = OrderDenied::new(order, reason, self.clock.now());
        self.msgbus.send(
            Endpoints::EXEC_ENGINE_PROCESS,
            &Message::OrderEvent(OrderEventAny::Denied(denied)),
        )?;
        Ok(())
    }

    fn handle_modify(&self, command: &TradingCommand, cmd: &ModifyOrder) -> Result<()> {
        let order = self.cache.borrow().order(&cmd.client_order_id).cloned();
        let Some(order) = order else {
            log::warn!("Dropped modify for unknown order: client_order_id={}", cmd.client_order_id);
            return Ok(());
        };
        if let Some(reason) = self.check_modify(&order, cmd) {
            return self.reject_modify(&order, reason);
        }
        if !self.modify_throttler.borrow_mut().try_acquire(self.clock.now()) {
            let limit = self.config.max_order_modify_rate;
            return self.reject_modify(
                &order,
                format!("exceeded MAX_ORDER_MODIFY_RATE {}/{}ms", limit.limit, limit.interval_ms),
            );
        }
        self.forward(command)
    }

    fn check_modify(&self, order: &Order, cmd: &ModifyOrder) -> Option<String> {
        let quantity = cmd.quantity.unwrap_or(order.quantity);
        match self.trading_state.get() {
            TradingState::Halted => return Some("trading state HALTED".to_string()),
            TradingState::Reducing if quantity > order.quantity => {
                return Some(format!(
                    "trading state REDUCING and quantity {} above {}",
                    quantity, order.quantity
                ));
            }
            _ => {}
        }

        let instrument = self.cache.borrow().instrument(&order.instrument_id).cloned();
        let Some(instrument) = instrument else {
            return Some(format!("instrument {} not found", order.instrument_id));
        };
        if quantity < order.filled_qty {
            return Some(format!(
                "quantity {} below filled quantity {}",
                quantity, order.filled_qty
            ));
        }
        self.check_quantity(&instrument, quantity)
            .or_else(|| self.check_prices(&instrument, order.side, cmd.price, cmd.trigger_price))
    }

    fn reject_modify(&self, order: &Order, reason: String) -> Result<()> {
        self.denied_count.set(self.denied_count.get() + 1);
        log::warn!(
            "Rejected modify: client_order_id={}, strategy={}, reason={reason}",
            order.client_order_id,
            order.strategy_id
        );
        let rejected = OrderModifyRejected::new(order, reason, self.clock.now());
        self.msgbus.send(
            Endpoints::EXEC_ENGINE_PROCESS,
            &Message::OrderEvent(OrderEventAny::ModifyRejected(rejected)),
        )?;
        Ok(())
    }

    // Checks: each returns the denial reason

    fn check_quantity(&self, instrument: &Instrument, quantity: Quantity) -> Option<String> {
        if quantity <= Decimal::ZERO {
            return Some(format!("quantity {quantity} not positive"));
        }
        if instrument.make_qty(quantity) != quantity {
            return Some(format!(
                "quantity {quantity} exceeds size precision {}",
                instrument.size_precision
            ));
        }
        if let Some(min) = instrument.min_quantity.filter(|min| quantity < *min) {
            return Some(format!("quantity {quantity} below minimum {min}"));
        }
        if let Some(max) = instrument.max_quantity.filter(|max| quantity > *max) {
            return Some(format!("quantity {quantity} above maximum {max}"));
        }
        if let Some(max) = self.config.max_order_qty.filter(|max| quantity > *max) {
            return Some(format!("quantity {quantity} exceeds max_order_qty {max}"));
        }
        None
    }

    fn check_prices(
        &self,
        instrument: &Instrument,
        side: Side,
        price: Option<Price>,
        trigger_price: Option<Price>,
    ) -> Option<String> {
        let reference = self.reference_price(&instrument.id, side);
        for (label, px) in [("price", price), ("trigger price", trigger_price)] {
            let Some(px) = px else { continue };
            if px <= Decimal::ZERO {
                return Some(format!("{label} {px} not positive"));
            }
            if instrument.make_price(px) != px {
                return Some(format!(
                    "{label} {px} exceeds price precision {}",
                    instrument.price_precision
                ));
            }
            if let (Some(band), Some(reference)) = (self.config.price_band_pct, reference) {
                let distance = (px - reference).abs() / reference;
                if distance > band {
                    return Some(format!(
                        "{label} {px} outside band {band} of reference {reference}"
                    ));
                }
            }
        }
        None
    }

    fn check_notional(&self, instrument: &Instrument, order: &Order) -> Option<String> {
        let max = self.max_notional_per_order(&instrument.id)?;
        let price = order
            .price
            .or(order.trigger_price)
            .or_else(|| self.reference_price(&instrument.id, order.side))?;
        let notional = instrument.notional_value(order.quantity, price);
        (notional > max).then(|| format!("notional {notional} exceeds max_notional_per_order {max}"))
    }

    fn check_reduce_only(&self, order: &Order) -> Option<String> {
        if !order.reduce_only {
            return None;
        }
        let net = self.net_position(&order.instrument_id, Some(&order.strategy_id));
        let reduces = !net.is_zero()
            && net.is_sign_positive() != order.side.sign().is_sign_positive()
            && order.quantity <= net.abs();
        (!reduces).then(|| {
            format!(
                "reduce-only {:?} {} would not reduce position {}",
                order.side, order.quantity, net
            )
        })
    }

    fn check_position_size(&self, order: &Order) -> Option<String> {
        let max = self.config.max_position_size?;
        let after = self.net_position(&order.instrument_id, None) + order.side.sign() * order.quantity;
        (after.abs() > max).then(|| format!("position {after} would exceed max_position_size {max}"))
    }

    fn increases_position(&self, order: &Order) -> bool {
        let net = self.net_position(&order.instrument_id, None);
        let after = net + order.side.sign() * order.quantity;
        after.abs() > net.abs() || (after.is_sign_positive() != net.is_sign_positive() && !after.is_zero())
    }

    fn net_position(&self, instrument_id: &InstrumentId, strategy_id: Option<&StrategyId>) -> Decimal {
        self.cache
            .borrow()
            .positions_open(None, Some(instrument_id), strategy_id)
            .iter()
            .map(|p| p.signed_qty)
            .sum()
    }

    fn reference_price(&self, instrument_id: &InstrumentId, side: Side) -> Option<Price> {
        let cache = self.cache.borrow();
        let touch = match side {
            Side::Buy => PriceType::Ask,
            Side::Sell => PriceType::Bid,
        };
        cache
            .price(instrument_id, touch)
            .or_else(|| cache.price(instrument_id, PriceType::Last))
    }
}

impl Component for RiskEngine {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn on_reset(&self) -> anyhow::Result<()> {
        self.trading_state.set(TradingState::Active);
        self.submit_throttler.borrow_mut().reset();
        self.modify_throttler.borrow_mut().reset();
        self.command_count.set(0);
        self.denied_count.set(0);
        Ok(())
    }

    fn on_dispose(&self) -> anyhow::Result<()> {
        self.msgbus.deregister(Endpoints::RISK_ENGINE_EXECUTE);
        Ok(())
    }
}
