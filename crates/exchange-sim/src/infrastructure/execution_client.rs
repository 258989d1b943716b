use std::cell::Cell;
use std::rc::Rc;

use tessera_common::{Endpoints, Message, MessageBus};
use tessera_core::commands::{CancelAllOrders, CancelOrder, ModifyOrder, SubmitOrder, TradingCommand};
use tessera_core::events::{OrderEventAny, OrderSubmitted};
use tessera_core::reports::ExecutionMassStatus;
use tessera_core::{AccountId, ClientId, OmsType, Venue};
use tessera_ports::{ClientError, Clock, ExecutionClient};

use crate::application::SimulatedExchange;

/// Execution client routing commands into a [`SimulatedExchange`]
///
/// Submissions are acknowledged with `OrderSubmitted` straight away; the
/// venue's answer follows when the exchange settles its queue.
pub struct BacktestExecutionClient {
    client_id: ClientId,
    exchange: Rc<SimulatedExchange>,
    clock: Rc<dyn Clock>,
    msgbus: Rc<MessageBus>,
    connected: Cell<bool>,
}

impl BacktestExecutionClient {
    pub fn new(exchange: Rc<SimulatedExchange>, clock: Rc<dyn Clock>, msgbus: Rc<MessageBus>) -> Self {
        Self {
            client_id: ClientId::new(exchange.venue().as_str()),
            exchange,
            clock,
            msgbus,
            connected: Cell::new(false),
        }
    }

    pub fn exchange(&self) -> &Rc<SimulatedExchange> {
        &self.exchange
    }

    fn check_connected(&self) -> Result<(), ClientError> {
        if self.connected.get() {
            Ok(())
        } else {
            Err(ClientError::NotConnected(self.client_id.to_string()))
        }
    }

    fn send_to_engine(&self, msg: Message) -> Result<(), ClientError> {
        self.msgbus
            .send(Endpoints::EXEC_ENGINE_PROCESS, &msg)
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

impl ExecutionClient for BacktestExecutionClient {
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn venue(&self) -> &Venue {
        self.exchange.venue()
    }

    fn account_id(&self) -> &AccountId {
        self.exchange.account_id()
    }

    fn oms_type(&self) -> OmsType {
        self.exchange.oms_type()
    }

    /// Connecting reports the venue's starting account state
    fn connect(&self) -> Result<(), ClientError> {
        if self.connected.replace(true) {
            return Ok(());
        }
        log::info!(
            "Connected execution client: client_id={}, account_id={}",
            self.client_id,
            self.exchange.account_id()
        );
        let state = self.exchange.account_state(self.clock.now());
        self.send_to_engine(Message::AccountState(state))
    }

    fn disconnect(&self) -> Result<(), ClientError> {
        if self.connected.replace(false) {
            log::info!("Disconnected execution client: client_id={}", self.client_id);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn submit_order(&self, cmd: &SubmitOrder) -> Result<(), ClientError> {
        self.check_connected()?;
        let submitted = OrderSubmitted::new(&cmd.order, self.exchange.account_id().clone(), self.clock.now());
        self.send_to_engine(Message::OrderEvent(OrderEventAny::Submitted(submitted)))?;
        self.exchange.send(TradingCommand::SubmitOrder(cmd.clone()));
        Ok(())
    }

    fn modify_order(&self, cmd: &ModifyOrder) -> Result<(), ClientError> {
        self.check_connected()?;
        self.exchange.send(TradingCommand::ModifyOrder(cmd.clone()));
        Ok(())
    }

    fn cancel_order(&self, cmd: &CancelOrder) -> Result<(), ClientError> {
        self.check_connected()?;
        self.exchange.send(TradingCommand::CancelOrder(cmd.clone()));
        Ok(())
    }

    fn cancel_all_orders(&self, cmd: &CancelAllOrders) -> Result<(), ClientError> {
        self.check_connected()?;
        self.exchange.send(TradingCommand::CancelAllOrders(cmd.clone()));
        Ok(())
    }

    fn generate_mass_status(&self) -> Result<ExecutionMassStatus, ClientError> {
        self.check_connected()?;
        Ok(self.exchange.generate_mass_status(self.client_id.clone()))
    }
}
