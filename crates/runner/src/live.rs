//! Live Node
//!
//! Same kernel as the backtest engine, driven by wall-clock time and adapter
//! channels instead of a replayed stream. All engine work happens on the
//! task that calls [`LiveNode::run`]; adapters live on other tasks and only
//! ever touch channels.
//!
//! | Direction        | Channel                          | Overflow                     |
//! |------------------|----------------------------------|------------------------------|
//! | adapter → node   | one bounded `AdapterMessage` mpsc | adapter awaits capacity      |
//! | node → exec      | bounded `TradingCommand` mpsc     | `ClientError::ChannelFull`   |
//! | node → data      | bounded `DataCommand` mpsc        | `ClientError::ChannelFull`   |

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::future::Future;
use std::rc::Rc;

use tessera_clock::LiveClock;
use tessera_common::init_logging;
use tessera_core::commands::{DataCommand, TradingCommand};
use tessera_core::{AccountId, Instrument, OmsType, Venue};
use tessera_strategy::{Strategy, StrategyRuntime};
use tokio::sync::mpsc;

use crate::channels::{AdapterMessage, ChannelDataClient, ChannelExecutionClient};
use crate::config::LiveNodeConfig;
use crate::error::LiveNodeError;
use crate::kernel::Kernel;

pub type Result<T> = std::result::Result<T, LiveNodeError>;

pub struct LiveNode {
    config: LiveNodeConfig,
    clock: Rc<LiveClock>,
    kernel: Kernel,
    inbound_tx: mpsc::Sender<AdapterMessage>,
    inbound_rx: RefCell<Option<mpsc::Receiver<AdapterMessage>>>,
    exec_venues: RefCell<BTreeSet<Venue>>,
    data_venues: RefCell<BTreeSet<Venue>>,
    running: Cell<bool>,
}

impl LiveNode {
    pub fn new(config: LiveNodeConfig) -> Result<Self> {
        if let Some(logging) = &config.logging {
            init_logging(logging);
        }
        let clock = Rc::new(LiveClock::new());
        let kernel = Kernel::new::<LiveNodeError>(
            config.trader_id.clone(),
            clock.clone(),
            config.data.clone(),
            config.risk.clone(),
            config.exec.clone(),
        )?;
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        log::info!("Created live node: trader_id={}", config.trader_id);
        Ok(Self {
            config,
            clock,
            kernel,
            inbound_tx,
            inbound_rx: RefCell::new(Some(inbound_rx)),
            exec_venues: RefCell::new(BTreeSet::new()),
            data_venues: RefCell::new(BTreeSet::new()),
            running: Cell::new(false),
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Sender handed to adapter tasks; cloneable and `Send`
    pub fn inbound_sender(&self) -> mpsc::Sender<AdapterMessage> {
        self.inbound_tx.clone()
    }

    /// Register an order routing adapter for `venue`
    ///
    /// Returns the client, for seeding its reconciliation snapshot, and the
    /// receiving end of its command channel for the adapter task.
    pub fn add_execution_client(
        &self,
        venue: Venue,
        account_id: AccountId,
        oms_type: OmsType,
    ) -> Result<(Rc<ChannelExecutionClient>, mpsc::Receiver<TradingCommand>)> {
        if !self.exec_venues.borrow_mut().insert(venue.clone()) {
            return Err(LiveNodeError::DuplicateClient(venue));
        }
        let (tx, rx) = mpsc::channel(self.config.command_capacity);
        let client = Rc::new(ChannelExecutionClient::new(
            venue,
            account_id,
            oms_type,
            tx,
            self.kernel.clock.clone(),
            self.kernel.msgbus.clone(),
        ));
        self.kernel.exec_engine.register_client(client.clone())?;
        Ok((client, rx))
    }

    /// Register a market data adapter for `venue`
    pub fn add_data_client(&self, venue: Venue) -> Result<mpsc::Receiver<DataCommand>> {
        if !self.data_venues.borrow_mut().insert(venue.clone()) {
            return Err(LiveNodeError::DuplicateClient(venue));
        }
        let (tx, rx) = mpsc::channel(self.config.command_capacity);
        self.kernel
            .data_engine
            .register_client(Rc::new(ChannelDataClient::new(venue, tx)), None)?;
        Ok(rx)
    }

    pub fn add_instrument(&self, instrument: Instrument) -> Result<()> {
        log::info!("Added instrument: instrument_id={}", instrument.id);
        self.kernel.cache.borrow_mut().add_instrument(instrument)?;
        Ok(())
    }

    pub fn add_strategy(&self, strategy: Box<dyn Strategy>) -> Result<Rc<StrategyRuntime>> {
        Ok(self.kernel.add_strategy(strategy)?)
    }

    /// Connect clients, reconcile, then start strategies
    pub fn start(&self) -> Result<()> {
        if self.running.replace(true) {
            return Err(LiveNodeError::AlreadyRunning);
        }
        self.kernel.start()?;
        log::info!("Started live node: trader_id={}", self.config.trader_id);
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        if !self.running.replace(false) {
            return Ok(());
        }
        self.kernel.stop_trader()?;
        // Let adapter answers to the stop-time cancels land before disconnecting
        self.drain();
        self.kernel.stop_engines()?;
        log::info!("Stopped live node: trader_id={}", self.config.trader_id);
        Ok(())
    }

    pub fn dispose(&self) -> Result<()> {
        self.stop()?;
        self.kernel.dispose()?;
        Ok(())
    }

    /// Route one adapter message into the engine that owns it
    pub fn process_message(&self, msg: AdapterMessage) {
        match msg {
            AdapterMessage::Data(data) => self.kernel.data_engine.process(data),
            AdapterMessage::OrderEvent(event) => self.kernel.exec_engine.process(event),
            AdapterMessage::AccountState(state) => self.kernel.exec_engine.process_account_state(state),
            AdapterMessage::DataResponse(response) => {
                if let Err(e) = self.kernel.data_engine.response(response) {
                    log::error!("Failed to handle data response: error={e}");
                }
            }
        }
    }

    fn fire_timers(&self) -> usize {
        let due = self.clock.pop_due();
        for handler in &due {
            handler.run();
        }
        due.len()
    }

    /// Process everything already queued plus due timers, without waiting
    ///
    /// Does nothing while [`LiveNode::run`] owns the inbound receiver.
    pub fn drain(&self) -> usize {
        let mut processed = self.fire_timers();
        loop {
            let next = match self.inbound_rx.borrow_mut().as_mut() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            };
            let Some(msg) = next else { break };
            self.process_message(msg);
            processed += 1;
        }
        processed
    }

    /// Start, run the event loop until `shutdown` resolves, then stop
    ///
    /// Each turn handles one inbound message, or fires timers once the next
    /// deadline (or the idle interval) passes.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut rx = self
            .inbound_rx
            .borrow_mut()
            .take()
            .ok_or(LiveNodeError::AlreadyRunning)?;
        if let Err(e) = self.start() {
            *self.inbound_rx.borrow_mut() = Some(rx);
            return Err(e);
        }

        tokio::pin!(shutdown);
        let idle = self.config.idle();
        let mut closed = false;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                msg = rx.recv() => match msg {
                    Some(msg) => self.process_message(msg),
                    None => {
                        closed = true;
                        break;
                    }
                },
                _ = self.clock.sleep_until_next(idle) => {
                    self.fire_timers();
                }
            }
        }

        *self.inbound_rx.borrow_mut() = Some(rx);
        self.stop()?;
        if closed {
            log::error!("Inbound channel closed: trader_id={}", self.config.trader_id);
            return Err(LiveNodeError::ChannelClosed);
        }
        Ok(())
    }
}
