//! Channel-backed clients for live adapters
//!
//! The node thread never blocks on an adapter. Commands go out through
//! bounded `tokio::sync::mpsc` channels with `try_send`; everything the
//! adapter produces comes back as an [`AdapterMessage`] on the node's
//! inbound channel.
//!
//! ```text
//!   ExecutionEngine ──► ChannelExecutionClient ──TradingCommand──► adapter task
//!   DataEngine ──────► ChannelDataClient ──────DataCommand──────► adapter task
//!                                                                     │
//!   LiveNode ◄─────────────────── AdapterMessage ◄────────────────────┘
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tessera_common::{Endpoints, Message, MessageBus};
use tessera_core::commands::{
    CancelAllOrders, CancelOrder, DataCommand, DataResponse, ModifyOrder, RequestData,
    SubscribeData, SubmitOrder, TradingCommand,
};
use tessera_core::data::Data;
use tessera_core::events::{AccountState, OrderEventAny, OrderSubmitted};
use tessera_core::reports::ExecutionMassStatus;
use tessera_core::{AccountId, ClientId, OmsType, Venue};
use tessera_ports::{ClientError, Clock, DataClient, ExecutionClient};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Everything an adapter can hand back to the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdapterMessage {
    Data(Data),
    OrderEvent(OrderEventAny),
    AccountState(AccountState),
    DataResponse(DataResponse),
}

fn try_send<T>(client_id: &ClientId, tx: &mpsc::Sender<T>, item: T) -> Result<(), ClientError> {
    match tx.try_send(item) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
            log::warn!("Dropped command, channel full: client_id={client_id}");
            Err(ClientError::ChannelFull)
        }
        Err(TrySendError::Closed(_)) => {
            log::error!("Dropped command, channel closed: client_id={client_id}");
            Err(ClientError::ChannelClosed)
        }
    }
}

pub struct ChannelExecutionClient {
    client_id: ClientId,
    venue: Venue,
    account_id: AccountId,
    oms_type: OmsType,
    tx: mpsc::Sender<TradingCommand>,
    clock: Rc<dyn Clock>,
    msgbus: Rc<MessageBus>,
    connected: Cell<bool>,
    mass_status: RefCell<Option<ExecutionMassStatus>>,
}

impl ChannelExecutionClient {
    pub fn new(
        venue: Venue,
        account_id: AccountId,
        oms_type: OmsType,
        tx: mpsc::Sender<TradingCommand>,
        clock: Rc<dyn Clock>,
        msgbus: Rc<MessageBus>,
    ) -> Self {
        Self {
            client_id: ClientId::new(venue.as_str()),
            venue,
            account_id,
            oms_type,
            tx,
            clock,
            msgbus,
            connected: Cell::new(false),
            mass_status: RefCell::new(None),
        }
    }

    /// Venue snapshot used for reconciliation on the next start
    pub fn set_mass_status(&self, status: ExecutionMassStatus) {
        *self.mass_status.borrow_mut() = Some(status);
    }

    fn check_connected(&self) -> Result<(), ClientError> {
        if self.connected.get() {
            Ok(())
        } else {
            Err(ClientError::NotConnected(self.client_id.to_string()))
        }
    }

    fn send(&self, command: TradingCommand) -> Result<(), ClientError> {
        self.check_connected()?;
        try_send(&self.client_id, &self.tx, command)
    }
}

impl ExecutionClient for ChannelExecutionClient {
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn venue(&self) -> &Venue {
        &self.venue
    }

    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    fn oms_type(&self) -> OmsType {
        self.oms_type
    }

    fn connect(&self) -> Result<(), ClientError> {
        if !self.connected.replace(true) {
            log::info!("Connected execution client: client_id={}", self.client_id);
        }
        Ok(())
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

    /// Acknowledged with `OrderSubmitted` once the command is in the channel
    fn submit_order(&self, cmd: &SubmitOrder) -> Result<(), ClientError> {
        self.send(TradingCommand::SubmitOrder(cmd.clone()))?;
        let submitted = OrderSubmitted::new(&cmd.order, self.account_id.clone(), self.clock.now());
        self.msgbus
            .send(
                Endpoints::EXEC_ENGINE_PROCESS,
                &Message::OrderEvent(OrderEventAny::Submitted(submitted)),
            )
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    fn modify_order(&self, cmd: &ModifyOrder) -> Result<(), ClientError> {
        self.send(TradingCommand::ModifyOrder(cmd.clone()))
    }

    fn cancel_order(&self, cmd: &CancelOrder) -> Result<(), ClientError> {
        self.send(TradingCommand::CancelOrder(cmd.clone()))
    }

    fn cancel_all_orders(&self, cmd: &CancelAllOrders) -> Result<(), ClientError> {
        self.send(TradingCommand::CancelAllOrders(cmd.clone()))
    }

    fn generate_mass_status(&self) -> Result<ExecutionMassStatus, ClientError> {
        Ok(self.mass_status.borrow().clone().unwrap_or_else(|| {
            ExecutionMassStatus::new(
                self.client_id.clone(),
                self.account_id.clone(),
                self.venue.clone(),
                self.clock.now(),
            )
        }))
    }
}

pub struct ChannelDataClient {
    client_id: ClientId,
    venue: Venue,
    tx: mpsc::Sender<DataCommand>,
    connected: Cell<bool>,
}

impl ChannelDataClient {
    pub fn new(venue: Venue, tx: mpsc::Sender<DataCommand>) -> Self {
        Self {
            client_id: ClientId::new(venue.as_str()),
            venue,
            tx,
            connected: Cell::new(false),
        }
    }

    fn forward(&self, command: DataCommand) -> Result<(), ClientError> {
        if !self.connected.get() {
            return Err(ClientError::NotConnected(self.client_id.to_string()));
        }
        try_send(&self.client_id, &self.tx, command)
    }

    fn subscribe(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.forward(DataCommand::Subscribe(cmd.clone()))
    }

    fn unsubscribe(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.forward(DataCommand::Unsubscribe(cmd.clone()))
    }

    fn request(&self, req: &RequestData) -> Result<(), ClientError> {
        self.forward(DataCommand::Request(req.clone()))
    }
}

impl DataClient for ChannelDataClient {
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn venue(&self) -> Option<&Venue> {
        Some(&self.venue)
    }

    fn connect(&self) -> Result<(), ClientError> {
        if !self.connected.replace(true) {
            log::info!("Connected data client: client_id={}", self.client_id);
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ClientError> {
        if self.connected.replace(false) {
            log::info!("Disconnected data client: client_id={}", self.client_id);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn subscribe_instrument(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_instruments(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_quote_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_trade_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_bars(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn subscribe_order_book_depth(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.subscribe(cmd)
    }

    fn unsubscribe_instrument(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_instruments(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_quote_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_trade_ticks(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_bars(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn unsubscribe_order_book_depth(&self, cmd: &SubscribeData) -> Result<(), ClientError> {
        self.unsubscribe(cmd)
    }

    fn request_instrument(&self, req: &RequestData) -> Result<(), ClientError> {
        self.request(req)
    }

    fn request_instruments(&self, req: &RequestData) -> Result<(), ClientError> {
        self.request(req)
    }

    fn request_quote_ticks(&self, req: &RequestData) -> Result<(), ClientError> {
        self.request(req)
    }

    fn request_trade_ticks(&self, req: &RequestData) -> Result<(), ClientError> {
        self.request(req)
    }

    fn request_bars(&self, req: &RequestData) -> Result<(), ClientError> {
        self.request(req)
    }

    fn request_order_book_depth(&self, req: &RequestData) -> Result<(), ClientError> {
        self.request(req)
    }
}
