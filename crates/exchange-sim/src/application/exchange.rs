use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use rust_decimal::Decimal;
use tessera_common::{Endpoints, Message, MessageBus};
use tessera_core::commands::TradingCommand;
use tessera_core::data::Data;
use tessera_core::events::{AccountState, OrderEventAny, OrderRejected};
use tessera_core::reports::ExecutionMassStatus;
use tessera_core::{
    AccountBalance, AccountId, ClientId, Instrument, InstrumentId, OmsType, Price, Timestamp,
    Venue,
};
use tessera_matching::{FillModel, OrderMatchingEngine};
use tessera_ports::Clock;

use crate::config::SimulatedVenueConfig;
use crate::error::{ExchangeError, Result};

/// A simulated venue: one matching engine per instrument plus a command queue
///
/// Commands arrive through [`SimulatedExchange::send`] and are only matched
/// when the owner calls [`SimulatedExchange::settle`], so a command issued
/// while another is being processed never re-enters a matching engine.
/// Every resulting event goes to the `ExecEngine.process` endpoint.
pub struct SimulatedExchange {
    config: SimulatedVenueConfig,
    account_id: AccountId,
    clock: Rc<dyn Clock>,
    msgbus: Rc<MessageBus>,
    engines: RefCell<BTreeMap<InstrumentId, OrderMatchingEngine>>,
    queue: RefCell<VecDeque<TradingCommand>>,
    command_count: Cell<u64>,
    event_count: Cell<u64>,
}

impl SimulatedExchange {
    pub fn new(
        config: SimulatedVenueConfig,
        clock: Rc<dyn Clock>,
        msgbus: Rc<MessageBus>,
    ) -> Result<Self> {
        // Validate probabilities once so add_instrument cannot fail on them
        FillModel::new(config.fill_model.clone())?;
        let account_id = config.account_id();
        log::info!(
            "Created simulated exchange: venue={}, account_id={account_id}, oms_type={:?}",
            config.venue,
            config.oms_type
        );
        Ok(Self {
            config,
            account_id,
            clock,
            msgbus,
            engines: RefCell::new(BTreeMap::new()),
            queue: RefCell::new(VecDeque::new()),
            command_count: Cell::new(0),
            event_count: Cell::new(0),
        })
    }

    pub fn venue(&self) -> &Venue {
        &self.config.venue
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn oms_type(&self) -> OmsType {
        self.config.oms_type
    }

    pub fn config(&self) -> &SimulatedVenueConfig {
        &self.config
    }

    /// Create the matching engine for an instrument traded on this venue
    pub fn add_instrument(&self, instrument: Instrument) -> Result<()> {
        if instrument.id.venue != self.config.venue {
            return Err(ExchangeError::WrongVenue {
                instrument_id: instrument.id.clone(),
                venue: self.config.venue.clone(),
            });
        }
        let mut engines = self.engines.borrow_mut();
        if engines.contains_key(&instrument.id) {
            return Err(ExchangeError::DuplicateInstrument(instrument.id.clone()));
        }
        let raw_id = engines.len() as u32 + 1;
        let fill_model = FillModel::new(self.config.fill_model.clone())?;
        log::info!(
            "Added matching engine: instrument_id={}, raw_id={raw_id}",
            instrument.id
        );
        let instrument_id = instrument.id.clone();
        engines.insert(
            instrument_id,
            OrderMatchingEngine::new(
                instrument,
                raw_id,
                self.account_id.clone(),
                self.config.matching.clone(),
                fill_model,
                self.config.fee_model.clone(),
            ),
        );
        Ok(())
    }

    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.engines.borrow().keys().cloned().collect()
    }

    pub fn best_bid(&self, instrument_id: &InstrumentId) -> Option<Price> {
        self.engines.borrow().get(instrument_id)?.best_bid()
    }

    pub fn best_ask(&self, instrument_id: &InstrumentId) -> Option<Price> {
        self.engines.borrow().get(instrument_id)?.best_ask()
    }

    /// Venue-side net quantity across all strategies
    pub fn net_position(&self, instrument_id: &InstrumentId) -> Decimal {
        self.engines
            .borrow()
            .get(instrument_id)
            .map(|e| e.net_position())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn open_order_count(&self) -> usize {
        self.engines.borrow().values().map(|e| e.orders_open().len()).sum()
    }

    // Commands

    /// Queue a command until the next [`SimulatedExchange::settle`]
    pub fn send(&self, command: TradingCommand) {
        log::debug!(
            "Queued trading command: venue={}, kind={}, instrument={}",
            self.config.venue,
            command.kind(),
            command.instrument_id()
        );
        self.queue.borrow_mut().push_back(command);
    }

    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Match queued commands until the queue stays empty
    ///
    /// Commands queued by event handlers during delivery are processed in the
    /// same call. Returns the number of commands processed.
    pub fn settle(&self) -> usize {
        let mut processed = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(command) = next else {
                break;
            };
            let events = self.execute(&command);
            processed += 1;
            self.deliver(events);
        }
        processed
    }

    fn execute(&self, command: &TradingCommand) -> Vec<OrderEventAny> {
        self.command_count.set(self.command_count.get() + 1);
        let ts = self.clock.now();
        let mut engines = self.engines.borrow_mut();
        let Some(engine) = engines.get_mut(command.instrument_id()) else {
            return match command {
                TradingCommand::SubmitOrder(cmd) => {
                    let reason = format!("Instrument {} not found", cmd.order.instrument_id);
                    log::warn!(
                        "Rejected order for unknown instrument: client_order_id={}, instrument={}",
                        cmd.order.client_order_id,
                        cmd.order.instrument_id
                    );
                    vec![OrderEventAny::Rejected(OrderRejected::new(
                        &cmd.order,
                        self.account_id.clone(),
                        reason,
                        ts,
                    ))]
                }
                other => {
                    log::warn!(
                        "Dropped command for unknown instrument: kind={}, instrument={}",
                        other.kind(),
                        other.instrument_id()
                    );
                    Vec::new()
                }
            };
        };
        match command {
            TradingCommand::SubmitOrder(cmd) => engine.process_order(&cmd.order, ts),
            TradingCommand::CancelOrder(cmd) => engine.process_cancel(cmd, ts),
            TradingCommand::ModifyOrder(cmd) => engine.process_modify(cmd, ts),
            TradingCommand::CancelAllOrders(cmd) => engine.process_cancel_all(cmd, ts),
        }
    }

    // Market data

    /// Move the matching engine of the data's instrument
    ///
    /// Data for instruments without an engine is ignored.
    pub fn process_data(&self, data: &Data) {
        let events = {
            let mut engines = self.engines.borrow_mut();
            let Some(engine) = engines.get_mut(data.instrument_id()) else {
                return;
            };
            let result = match data {
                Data::Instrument(_) => return,
                Data::Quote(quote) => engine.process_quote_tick(quote),
                Data::Trade(trade) => engine.process_trade_tick(trade),
                Data::Bar(bar) => engine.process_bar(bar),
                Data::Depth(depth) => engine.process_depth(depth),
            };
            match result {
                Ok(events) => events,
                Err(e) => {
                    log::error!(
                        "Failed to process data: venue={}, instrument={}, error={e}",
                        self.config.venue,
                        data.instrument_id()
                    );
                    return;
                }
            }
        };
        self.deliver(events);
    }

    /// Expire orders whose time in force ran out without a market update
    pub fn process_time(&self, ts: Timestamp) {
        let events: Vec<OrderEventAny> = self
            .engines
            .borrow_mut()
            .values_mut()
            .flat_map(|engine| engine.process_time(ts))
            .collect();
        self.deliver(events);
    }

    fn deliver(&self, events: Vec<OrderEventAny>) {
        for event in events {
            self.event_count.set(self.event_count.get() + 1);
            // The bus logs delivery failures itself
            let _ = self
                .msgbus
                .send(Endpoints::EXEC_ENGINE_PROCESS, &Message::OrderEvent(event));
        }
    }

    // Account and reports

    /// Account snapshot with the configured starting balances
    pub fn account_state(&self, ts: Timestamp) -> AccountState {
        AccountState {
            account_id: self.account_id.clone(),
            account_type: self.config.account_type,
            base_currency: self.config.base_currency.clone(),
            balances: self
                .config
                .starting_balances
                .iter()
                .map(|m| AccountBalance::new(m.currency.clone(), m.amount, Decimal::ZERO))
                .collect(),
            margins: Vec::new(),
            is_reported: true,
            ts_event: ts,
            ts_init: ts,
        }
    }

    /// Orders, fills and net positions as the venue sees them
    pub fn generate_mass_status(&self, client_id: ClientId) -> ExecutionMassStatus {
        let ts = self.clock.now();
        let mut mass_status = ExecutionMassStatus::new(
            client_id,
            self.account_id.clone(),
            self.config.venue.clone(),
            ts,
        );
        for engine in self.engines.borrow().values() {
            mass_status.order_reports.extend(engine.order_status_reports(ts));
            mass_status
                .fill_reports
                .extend(engine.fill_reports().iter().cloned());
            mass_status
                .position_reports
                .extend(engine.position_status_report(ts));
        }
        log::debug!(
            "Generated mass status: venue={}, orders={}, fills={}, positions={}",
            self.config.venue,
            mass_status.order_reports.len(),
            mass_status.fill_reports.len(),
            mass_status.position_reports.len()
        );
        mass_status
    }

    pub fn command_count(&self) -> u64 {
        self.command_count.get()
    }

    pub fn event_count(&self) -> u64 {
        self.event_count.get()
    }

    /// Clear books, orders and queued commands; fill models restart from their seed
    pub fn reset(&self) {
        for engine in self.engines.borrow_mut().values_mut() {
            engine.reset();
        }
        self.queue.borrow_mut().clear();
        self.command_count.set(0);
        self.event_count.set(0);
        log::info!("Reset simulated exchange: venue={}", self.config.venue);
    }
}
