//! Execution Engine
//!
//! Routes trading commands to execution clients and turns the events they
//! report back into cache state:
//! - Orders advance only through their state machine; illegal events are dropped
//! - Fills open, change or close positions under an OMS-dependent position id
//! - Every fill and order change refreshes the owning account's balances

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use rust_decimal::Decimal;
use tessera_cache::{Cache, state_after_fill, state_after_order_change};
use tessera_common::{Component, ComponentCore, Endpoints, Message, MessageBus, MessageHandler, Topics};
use tessera_core::commands::{CancelAllOrders, CancelOrder, ModifyOrder, SubmitOrder, TradingCommand};
use tessera_core::events::{
    AccountState, OrderEventAny, OrderFilled, OrderPendingCancel, OrderPendingUpdate,
    PositionEvent, PositionEventKind,
};
use tessera_core::{
    Account, ClientId, OmsType, Order, OrderStatus, Position, PositionId, StrategyId, Timestamp,
    Venue,
};
use tessera_ports::{Clock, ExecutionClient};

use crate::config::ExecEngineConfig;
use crate::error::{ExecutionError, Result};

/// Central hub between strategies, execution clients and the cache
pub struct ExecutionEngine {
    core: ComponentCore,
    weak: Weak<ExecutionEngine>,
    pub(crate) clock: Rc<dyn Clock>,
    pub(crate) cache: Rc<RefCell<Cache>>,
    pub(crate) msgbus: Rc<MessageBus>,
    pub(crate) config: ExecEngineConfig,
    clients: RefCell<BTreeMap<ClientId, Rc<dyn ExecutionClient>>>,
    routing: RefCell<HashMap<Venue, ClientId>>,
    default_client: RefCell<Option<ClientId>>,
    oms_overrides: RefCell<HashMap<StrategyId, OmsType>>,
    pub(crate) recon_count: Cell<u64>,
    command_count: Cell<u64>,
    event_count: Cell<u64>,
    pub(crate) report_count: Cell<u64>,
}

impl ExecutionEngine {
    pub fn new(
        clock: Rc<dyn Clock>,
        cache: Rc<RefCell<Cache>>,
        msgbus: Rc<MessageBus>,
        config: ExecEngineConfig,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            core: ComponentCore::new("ExecEngine"),
            weak: weak.clone(),
            clock,
            cache,
            msgbus,
            config,
            clients: RefCell::new(BTreeMap::new()),
            routing: RefCell::new(HashMap::new()),
            default_client: RefCell::new(None),
            oms_overrides: RefCell::new(HashMap::new()),
            recon_count: Cell::new(0),
            command_count: Cell::new(0),
            event_count: Cell::new(0),
            report_count: Cell::new(0),
        })
    }

    pub fn config(&self) -> &ExecEngineConfig {
        &self.config
    }

    /// Register the `ExecEngine.execute` and `ExecEngine.process` endpoints
    pub fn register_endpoints(&self) -> Result<()> {
        let weak = self.weak.clone();
        self.msgbus.register(
            Endpoints::EXEC_ENGINE_EXECUTE,
            MessageHandler::new(Endpoints::EXEC_ENGINE_EXECUTE, move |msg| {
                let Some(engine) = weak.upgrade() else {
                    return Ok(());
                };
                match msg {
                    Message::TradingCommand(cmd) => Ok(engine.execute(cmd)?),
                    other => {
                        log::warn!("Dropped unexpected message: endpoint=ExecEngine.execute, kind={}", other.kind());
                        Ok(())
                    }
                }
            }),
        )?;

        let weak = self.weak.clone();
        self.msgbus.register(
            Endpoints::EXEC_ENGINE_PROCESS,
            MessageHandler::new(Endpoints::EXEC_ENGINE_PROCESS, move |msg| {
                let Some(engine) = weak.upgrade() else {
                    return Ok(());
                };
                match msg {
                    Message::OrderEvent(event) => engine.process(event.clone()),
                    Message::AccountState(state) => engine.process_account_state(state.clone()),
                    other => log::warn!("Dropped unexpected message: endpoint=ExecEngine.process, kind={}", other.kind()),
                }
                Ok(())
            }),
        )?;
        Ok(())
    }

    // Clients

    /// Register a client, routed by its venue
    pub fn register_client(&self, client: Rc<dyn ExecutionClient>) -> Result<()> {
        let client_id = client.client_id().clone();
        if self.clients.borrow().contains_key(&client_id) {
            return Err(ExecutionError::DuplicateClient(client_id));
        }
        self.routing
            .borrow_mut()
            .insert(client.venue().clone(), client_id.clone());
        log::info!(
            "Registered execution client: client_id={client_id}, venue={}, oms_type={:?}",
            client.venue(),
            client.oms_type()
        );
        self.clients.borrow_mut().insert(client_id, client);
        Ok(())
    }

    /// Register the client used when neither client id nor venue resolve
    pub fn register_default_client(&self, client: Rc<dyn ExecutionClient>) -> Result<()> {
        let client_id = client.client_id().clone();
        self.register_client(client)?;
        *self.default_client.borrow_mut() = Some(client_id);
        Ok(())
    }

    pub fn deregister_client(&self, client_id: &ClientId) -> bool {
        self.routing.borrow_mut().retain(|_, id| id != client_id);
        let mut default = self.default_client.borrow_mut();
        if default.as_ref() == Some(client_id) {
            *default = None;
        }
        self.clients.borrow_mut().remove(client_id).is_some()
    }

    pub fn registered_clients(&self) -> Vec<ClientId> {
        self.clients.borrow().keys().cloned().collect()
    }

    pub(crate) fn clients(&self) -> Vec<Rc<dyn ExecutionClient>> {
        self.clients.borrow().values().cloned().collect()
    }

    /// Override the venue's OMS type for one strategy
    pub fn register_oms_type(&self, strategy_id: StrategyId, oms_type: OmsType) {
        self.oms_overrides.borrow_mut().insert(strategy_id, oms_type);
    }

    fn client_for(&self, client_id: Option<&ClientId>, venue: &Venue) -> Result<Rc<dyn ExecutionClient>> {
        let clients = self.clients.borrow();
        if let Some(id) = client_id {
            return clients
                .get(id)
                .cloned()
                .ok_or_else(|| ExecutionError::NoClient(id.to_string()));
        }
        let routed = self.routing.borrow().get(venue).cloned();
        routed
            .or_else(|| self.default_client.borrow().clone())
            .and_then(|id| clients.get(&id).cloned())
            .ok_or_else(|| ExecutionError::NoClient(venue.to_string()))
    }

    fn oms_type(&self, strategy_id: &StrategyId, venue: &Venue) -> OmsType {
        if let Some(oms_type) = self.oms_overrides.borrow().get(strategy_id) {
            return *oms_type;
        }
        let client_id = self.routing.borrow().get(venue).cloned();
        client_id
            .and_then(|id| self.clients.borrow().get(&id).map(|c| c.oms_type()))
            .unwrap_or(OmsType::Netting)
    }

    // Commands

    pub fn execute(&self, command: &TradingCommand) -> Result<()> {
        self.command_count.set(self.command_count.get() + 1);
        log::debug!(
            "Executing trading command: kind={}, strategy={}, instrument={}",
            command.kind(),
            command.strategy_id(),
            command.instrument_id()
        );
        let client = self.client_for(command.client_id(), &command.instrument_id().venue)?;
        match command {
            TradingCommand::SubmitOrder(cmd) => self.handle_submit(client, cmd),
            TradingCommand::CancelOrder(cmd) => self.handle_cancel(client, cmd),
            TradingCommand::ModifyOrder(cmd) => self.handle_modify(client, cmd),
            TradingCommand::CancelAllOrders(cmd) => self.handle_cancel_all(client, cmd),
        }
    }

    fn handle_submit(&self, client: Rc<dyn ExecutionClient>, cmd: &SubmitOrder) -> Result<()> {
        self.cache.borrow_mut().add_order(
            cmd.order.clone(),
            cmd.position_id.clone(),
            Some(client.client_id().clone()),
        )?;
        if let Err(e) = client.submit_order(cmd) {
            log::error!(
                "Failed to submit order: client_order_id={}, client_id={}, error={e}",
                cmd.order.client_order_id,
                client.client_id()
            );
            return Err(e.into());
        }
        Ok(())
    }

    fn handle_cancel(&self, client: Rc<dyn ExecutionClient>, cmd: &CancelOrder) -> Result<()> {
        let order = self.cache.borrow().order(&cmd.client_order_id).cloned();
        let Some(order) = order else {
            log::warn!("Dropped cancel for unknown order: client_order_id={}", cmd.client_order_id);
            return Ok(());
        };
        if order.is_closed() {
            log::warn!(
                "Dropped cancel for closed order: client_order_id={}, status={:?}",
                order.client_order_id,
                order.status
            );
            return Ok(());
        }
        if order.status != OrderStatus::PendingCancel {
            let account_id = order
                .account_id
                .clone()
                .unwrap_or_else(|| client.account_id().clone());
            self.handle_event(OrderEventAny::PendingCancel(OrderPendingCancel::new(
                &order,
                account_id,
                self.clock.now(),
            )));
        }
        client.cancel_order(cmd)?;
        Ok(())
    }

    fn handle_modify(&self, client: Rc<dyn ExecutionClient>, cmd: &ModifyOrder) -> Result<()> {
        let order = self.cache.borrow().order(&cmd.client_order_id).cloned();
        let Some(order) = order else {
            log::warn!("Dropped modify for unknown order: client_order_id={}", cmd.client_order_id);
            return Ok(());
        };
        if order.is_closed() || order.status == OrderStatus::PendingCancel {
            log::warn!(
                "Dropped modify for order: client_order_id={}, status={:?}",
                order.client_order_id,
                order.status
            );
            return Ok(());
        }
        let account_id = order
            .account_id
            .clone()
            .unwrap_or_else(|| client.account_id().clone());
        self.handle_event(OrderEventAny::PendingUpdate(OrderPendingUpdate::new(
            &order,
            account_id,
            self.clock.now(),
        )));
        client.modify_order(cmd)?;
        Ok(())
    }

    fn handle_cancel_all(&self, client: Rc<dyn ExecutionClient>, cmd: &CancelAllOrders) -> Result<()> {
        let orders: Vec<Order> = self
            .cache
            .borrow()
            .orders_open(None, Some(&cmd.instrument_id), Some(&cmd.strategy_id), cmd.side)
            .into_iter()
            .filter(|o| o.status != OrderStatus::PendingCancel)
            .cloned()
            .collect();
        log::debug!(
            "Canceling all orders: instrument={}, strategy={}, count={}",
            cmd.instrument_id,
            cmd.strategy_id,
            orders.len()
        );
        let ts = self.clock.now();
        for order in &orders {
            let account_id = order
                .account_id
                .clone()
                .unwrap_or_else(|| client.account_id().clone());
            self.handle_event(OrderEventAny::PendingCancel(OrderPendingCancel::new(order, account_id, ts)));
        }
        client.cancel_all_orders(cmd)?;
        Ok(())
    }

    // Events

    /// Apply an order event reported by a client
    ///
    /// Events for unknown orders and illegal transitions are logged and
    /// dropped; the cache is left unchanged.
    pub fn process(&self, event: OrderEventAny) {
        self.handle_event(event);
    }

    /// Returns true when the event was applied
    pub(crate) fn handle_event(&self, event: OrderEventAny) -> bool {
        self.event_count.set(self.event_count.get() + 1);
        let client_order_id = event.client_order_id().clone();
        let order = self.cache.borrow().order(&client_order_id).cloned();
        let Some(mut order) = order else {
            log::warn!(
                "Dropped event for unknown order: client_order_id={client_order_id}, event={}",
                event.kind()
            );
            return false;
        };

        let event = match event {
            OrderEventAny::Filled(mut fill) => {
                fill.position_id = Some(self.determine_position_id(&order, &fill));
                OrderEventAny::Filled(fill)
            }
            other => other,
        };

        if let Err(e) = order.apply(event.clone()) {
            log::error!(
                "Dropped invalid order event: client_order_id={client_order_id}, event={}, status={:?}, error={e}",
                event.kind(),
                order.status
            );
            return false;
        }
        if let Err(e) = self.cache.borrow_mut().update_order(order.clone()) {
            log::error!("Failed to update order: client_order_id={client_order_id}, error={e}");
            return false;
        }
        log::debug!(
            "Applied order event: client_order_id={client_order_id}, event={}, status={:?}",
            event.kind(),
            order.status
        );

        self.msgbus.publish(
            &Topics::order_events(&order.strategy_id),
            &Message::OrderEvent(event.clone()),
        );

        match &event {
            OrderEventAny::Filled(fill) => self.handle_fill(fill),
            other => self.refresh_account(&order, other.ts_event()),
        }
        true
    }

    fn determine_position_id(&self, order: &Order, fill: &OrderFilled) -> PositionId {
        match self.oms_type(&fill.strategy_id, &fill.instrument_id.venue) {
            OmsType::Netting => {
                PositionId::new(format!("{}-{}", fill.instrument_id, fill.strategy_id))
            }
            OmsType::Hedging => fill
                .position_id
                .clone()
                .or_else(|| order.position_id.clone())
                .or_else(|| self.cache.borrow().position_id(&fill.client_order_id).cloned())
                .unwrap_or_else(|| {
                    PositionId::new(format!("{}-{}", fill.instrument_id, fill.client_order_id))
                }),
        }
    }

    fn handle_fill(&self, fill: &OrderFilled) {
        let Some(position_id) = fill.position_id.clone() else {
            return;
        };
        let instrument = self.cache.borrow().instrument(&fill.instrument_id).cloned();
        let Some(instrument) = instrument else {
            log::error!(
                "Cannot apply fill without instrument: instrument={}, trade_id={}",
                fill.instrument_id,
                fill.trade_id
            );
            return;
        };

        let existing = self.cache.borrow().position(&position_id).cloned();
        let applied = match existing {
            Some(mut position) if position.is_open() => {
                let before = position.realized_pnl;
                position.apply(fill).map_err(ExecutionError::from).and_then(|_| {
                    let kind = if position.is_closed() {
                        PositionEventKind::Closed
                    } else {
                        PositionEventKind::Changed
                    };
                    let delta = position.realized_pnl - before;
                    self.cache.borrow_mut().update_position(position.clone())?;
                    Ok((position, kind, delta))
                })
            }
            Some(_) => {
                // Netting id reused after the previous cycle closed
                let position = Position::new(&instrument, fill, position_id.clone());
                let delta = position.realized_pnl;
                self.cache
                    .borrow_mut()
                    .replace_position(position.clone())
                    .map(|_| (position, PositionEventKind::Opened, delta))
                    .map_err(ExecutionError::from)
            }
            None => {
                let position = Position::new(&instrument, fill, position_id.clone());
                let delta = position.realized_pnl;
                self.cache
                    .borrow_mut()
                    .add_position(position.clone())
                    .map(|_| (position, PositionEventKind::Opened, delta))
                    .map_err(ExecutionError::from)
            }
        };
        let (position, kind, pnl_delta) = match applied {
            Ok(applied) => applied,
            Err(e) => {
                log::error!(
                    "Failed to apply fill to position: position_id={position_id}, trade_id={}, error={e}",
                    fill.trade_id
                );
                return;
            }
        };

        self.cache
            .borrow_mut()
            .add_position_id(&position_id, &fill.client_order_id, &fill.strategy_id);
        log::info!(
            "Applied fill: client_order_id={}, trade_id={}, side={:?}, qty={}, px={}, position_id={}, signed_qty={}",
            fill.client_order_id,
            fill.trade_id,
            fill.side,
            fill.last_qty,
            fill.last_px,
            position_id,
            position.signed_qty
        );

        let event = PositionEvent::from_position(kind, &position, fill.last_qty, fill.last_px, self.clock.now());
        self.msgbus.publish(
            &Topics::position_events(&position.strategy_id),
            &Message::PositionEvent(event),
        );

        let state = state_after_fill(
            &self.cache.borrow(),
            &fill.account_id,
            fill,
            pnl_delta,
            fill.ts_event,
        );
        match state {
            Some(state) => self.apply_account_state(state),
            None => log::debug!("No account for fill: account_id={}", fill.account_id),
        }
    }

    fn refresh_account(&self, order: &Order, ts: Timestamp) {
        let Some(account_id) = &order.account_id else {
            return;
        };
        let state = state_after_order_change(&self.cache.borrow(), account_id, ts);
        if let Some(state) = state {
            self.apply_account_state(state);
        }
    }

    /// Apply an account state reported by a client
    pub fn process_account_state(&self, state: AccountState) {
        self.apply_account_state(state);
    }

    fn apply_account_state(&self, state: AccountState) {
        let result: Result<()> = {
            let mut cache = self.cache.borrow_mut();
            match cache.account(&state.account_id).cloned() {
                Some(mut account) => account
                    .apply(state.clone())
                    .map_err(ExecutionError::from)
                    .and_then(|_| Ok(cache.update_account(account)?)),
                None => {
                    log::info!("Registered account: account_id={}, type={:?}", state.account_id, state.account_type);
                    cache
                        .add_account(Account::new(state.clone()))
                        .map_err(ExecutionError::from)
                }
            }
        };
        if let Err(e) = result {
            log::error!("Failed to apply account state: account_id={}, error={e}", state.account_id);
            return;
        }
        let topic = Topics::account_events(&state.account_id);
        self.msgbus.publish(&topic, &Message::AccountState(state));
    }

    // Counters

    pub fn command_count(&self) -> u64 {
        self.command_count.get()
    }

    pub fn event_count(&self) -> u64 {
        self.event_count.get()
    }

    pub fn report_count(&self) -> u64 {
        self.report_count.get()
    }

    /// Net signed quantity of the open positions of `strategy_id`
    pub fn net_quantity(&self, strategy_id: &StrategyId) -> Decimal {
        self.cache
            .borrow()
            .positions_open(None, None, Some(strategy_id))
            .iter()
            .map(|p| p.signed_qty)
            .sum()
    }
}

impl Component for ExecutionEngine {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn on_start(&self) -> anyhow::Result<()> {
        for client in self.clients() {
            client.connect()?;
            if !self.config.reconciliation {
                continue;
            }
            match client.generate_mass_status() {
                Ok(mass_status) => {
                    let report = self.reconcile_state(&mass_status);
                    if !report.is_reconciled() {
                        log::warn!(
                            "Reconciliation incomplete: client_id={}, unreconcilable={}",
                            client.client_id(),
                            report.unreconcilable().len()
                        );
                    }
                }
                Err(e) => log::warn!(
                    "Failed to generate mass status: client_id={}, error={e}",
                    client.client_id()
                ),
            }
        }
        Ok(())
    }

    fn on_stop(&self) -> anyhow::Result<()> {
        for client in self.clients() {
            if let Err(e) = client.disconnect() {
                log::warn!(
                    "Failed to disconnect execution client: client_id={}, error={e}",
                    client.client_id()
                );
            }
        }
        Ok(())
    }

    fn on_reset(&self) -> anyhow::Result<()> {
        self.command_count.set(0);
        self.event_count.set(0);
        self.report_count.set(0);
        self.recon_count.set(0);
        Ok(())
    }

    fn on_dispose(&self) -> anyhow::Result<()> {
        self.msgbus.deregister(Endpoints::EXEC_ENGINE_EXECUTE);
        self.msgbus.deregister(Endpoints::EXEC_ENGINE_PROCESS);
        Ok(())
    }
}
