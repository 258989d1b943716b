//! Backtest Engine
//!
//! Replays historical data through the kernel against simulated venues.
//!
//! Per element of the merged stream, in order:
//!
//! 1. fire timers due before the element, each at its own time
//! 2. move the clock to the element's `ts_init`
//! 3. `DataEngine.process` (cache + publish; strategies react)
//! 4. the venue's matching engine processes the element
//! 5. every venue settles its command queue
//!
//! Ties on `ts_init` break by instrument id, then data kind
//! (instrument < depth < quote < trade < bar), then insertion order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_clock::TestClock;
use tessera_common::{LoggingConfig, Message, MessageHandler, Topics, init_logging};
use tessera_core::data::Data;
use tessera_core::{Currency, Instrument, InstrumentId, Timestamp, TraderId, Venue};
use tessera_exchange_sim::{
    BacktestDataClient, BacktestExecutionClient, SimulatedExchange, SimulatedVenueConfig,
};
use tessera_strategy::{Strategy, StrategyRuntime};

use crate::config::BacktestEngineConfig;
use crate::error::BacktestError;
use crate::kernel::Kernel;

pub type Result<T> = std::result::Result<T, BacktestError>;

/// Summary of one backtest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trader_id: TraderId,
    /// Data elements replayed
    pub iterations: u64,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub total_events: usize,
    pub total_orders: usize,
    pub total_positions: usize,
    /// Realized P&L summed over venues, per settlement currency
    pub realized_pnl: BTreeMap<Currency, Decimal>,
    /// Every message published under `events.*`, in publication order
    pub events: Vec<Message>,
}

impl BacktestResult {
    /// Emitted events as JSON, for comparing runs byte for byte
    pub fn events_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.events)?)
    }
}

struct BacktestVenue {
    exchange: Rc<SimulatedExchange>,
    data_client: Rc<BacktestDataClient>,
}

pub struct BacktestEngine {
    config: BacktestEngineConfig,
    clock: Rc<TestClock>,
    kernel: Kernel,
    venues: BTreeMap<Venue, BacktestVenue>,
    instruments: BTreeMap<InstrumentId, Instrument>,
    stream: Vec<Data>,
    event_log: Rc<RefCell<Vec<Message>>>,
    iterations: u64,
    has_run: bool,
}

impl BacktestEngine {
    pub fn new(config: BacktestEngineConfig) -> Result<Self> {
        if let Some(level) = &config.log_level {
            init_logging(&LoggingConfig {
                level: level.clone(),
                ..Default::default()
            });
        }

        let clock = Rc::new(TestClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let kernel: Kernel = Kernel::new::<BacktestError>(
            config.trader_id.clone(),
            clock.clone(),
            config.data.clone(),
            config.risk.clone(),
            config.exec.clone(),
        )?;

        let event_log = Rc::new(RefCell::new(Vec::new()));
        let sink = event_log.clone();
        kernel.msgbus.subscribe(
            Topics::EVENTS_ALL,
            MessageHandler::new("BacktestEngine-events", move |msg: &Message| {
                if msg.is_event() {
                    sink.borrow_mut().push(msg.clone());
                }
                Ok(())
            }),
            0,
        );

        let venues = config.venues.clone();
        let mut engine = Self {
            config,
            clock,
            kernel,
            venues: BTreeMap::new(),
            instruments: BTreeMap::new(),
            stream: Vec::new(),
            event_log,
            iterations: 0,
            has_run: false,
        };
        for venue in venues {
            engine.add_venue(venue)?;
        }
        log::info!("Created backtest engine: trader_id={}", engine.config.trader_id);
        Ok(engine)
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn clock(&self) -> &Rc<TestClock> {
        &self.clock
    }

    pub fn exchange(&self, venue: &Venue) -> Option<&Rc<SimulatedExchange>> {
        self.venues.get(venue).map(|v| &v.exchange)
    }

    /// Stand up a simulated venue with its execution and data clients
    pub fn add_venue(&mut self, mut venue_config: SimulatedVenueConfig) -> Result<()> {
        let venue = venue_config.venue.clone();
        if self.venues.contains_key(&venue) {
            return Err(BacktestError::DuplicateVenue(venue));
        }
        if let Some(fill_model) = &self.config.fill_model {
            venue_config.fill_model = fill_model.clone();
        }
        if venue_config.fill_model.random_seed.is_none() {
            venue_config.fill_model.random_seed = Some(self.config.seed);
        }

        let clock = self.kernel.clock.clone();
        let msgbus = self.kernel.msgbus.clone();
        let exchange = Rc::new(SimulatedExchange::new(venue_config, clock.clone(), msgbus.clone())?);
        self.kernel
            .exec_engine
            .register_client(Rc::new(BacktestExecutionClient::new(
                exchange.clone(),
                clock.clone(),
                msgbus.clone(),
            )))?;
        let data_client = Rc::new(BacktestDataClient::new(venue.clone(), clock, msgbus));
        self.kernel
            .data_engine
            .register_client(data_client.clone(), None)?;

        log::info!("Added venue: venue={venue}");
        self.venues.insert(
            venue,
            BacktestVenue {
                exchange,
                data_client,
            },
        );
        Ok(())
    }

    /// Make an instrument tradable on its venue and known to the cache
    pub fn add_instrument(&mut self, instrument: Instrument) -> Result<()> {
        let venue = self
            .venues
            .get(&instrument.id.venue)
            .ok_or_else(|| BacktestError::VenueNotFound(instrument.id.venue.clone()))?;
        venue.exchange.add_instrument(instrument.clone())?;
        venue
            .data_client
            .add_data([Data::Instrument(Box::new(instrument.clone()))]);
        self.kernel
            .cache
            .borrow_mut()
            .add_instrument(instrument.clone())?;
        log::info!("Added instrument: instrument_id={}", instrument.id);
        self.instruments.insert(instrument.id.clone(), instrument);
        Ok(())
    }

    /// Queue historical data; every element's instrument must be added first
    pub fn add_data(&mut self, data: impl IntoIterator<Item = Data>) -> Result<()> {
        let data: Vec<Data> = data.into_iter().collect();
        if let Some(unknown) = data
            .iter()
            .find(|d| !self.instruments.contains_key(d.instrument_id()))
        {
            return Err(BacktestError::InstrumentNotFound(unknown.instrument_id().clone()));
        }
        for (venue, entry) in &self.venues {
            entry.data_client.add_data(
                data.iter()
                    .filter(|d| &d.instrument_id().venue == venue)
                    .cloned(),
            );
        }
        log::info!("Added data: count={}", data.len());
        self.stream.extend(data);
        Ok(())
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy>) -> Result<Rc<StrategyRuntime>> {
        Ok(self.kernel.add_strategy(strategy)?)
    }

    /// Replay every queued element and summarise the run
    pub fn run(&mut self) -> Result<BacktestResult> {
        if self.has_run {
            return Err(BacktestError::AlreadyRun);
        }
        self.has_run = true;

        // Stable: equal keys keep insertion order
        self.stream.sort_by(|a, b| {
            a.ts_init()
                .cmp(&b.ts_init())
                .then_with(|| a.instrument_id().cmp(b.instrument_id()))
                .then_with(|| a.kind_rank().cmp(&b.kind_rank()))
        });
        let start = self.stream.first().map(|d| d.ts_init());
        let end = self.stream.last().map(|d| d.ts_init());
        if let Some(start) = start {
            self.clock.set_time(start);
        }

        log::info!(
            "Starting backtest: elements={}, venues={}, strategies={}",
            self.stream.len(),
            self.venues.len(),
            self.kernel.trader.strategy_ids().len()
        );
        self.kernel.start()?;
        self.settle();

        let stream = std::mem::take(&mut self.stream);
        for data in &stream {
            self.advance_time(data.ts_init());
            // Venue first, so strategies see fills caused by this element
            if let Some(venue) = self.venues.get(&data.instrument_id().venue) {
                venue.exchange.process_data(data);
            }
            self.settle();
            self.kernel.data_engine.process(data.clone());
            self.settle();
            self.iterations += 1;
        }
        self.stream = stream;

        self.kernel.stop_trader()?;
        self.settle();
        self.kernel.stop_engines()?;

        let result = self.result(start, end);
        log::info!(
            "Finished backtest: iterations={}, events={}, orders={}, positions={}",
            result.iterations,
            result.total_events,
            result.total_orders,
            result.total_positions
        );
        Ok(result)
    }

    /// Fire timers due up to `to` at their own times, then land on `to`
    ///
    /// Timers are popped one at a time so callbacks can add or cancel timers
    /// due inside the same window.
    fn advance_time(&self, to: Timestamp) {
        while let Some(handler) = self.clock.pop_next(to) {
            let ts = handler.event.ts_event;
            self.clock.set_time(ts);
            for venue in self.venues.values() {
                venue.exchange.process_time(ts);
            }
            handler.run();
            self.settle();
        }
        self.clock.set_time(to);
        for venue in self.venues.values() {
            venue.exchange.process_time(to);
        }
    }

    /// Settle every venue until no venue has queued commands
    ///
    /// Events from one venue can make a strategy trade on another.
    fn settle(&self) {
        loop {
            let processed: usize = self.venues.values().map(|v| v.exchange.settle()).sum();
            if processed == 0 {
                break;
            }
        }
    }

    fn result(&self, start: Option<Timestamp>, end: Option<Timestamp>) -> BacktestResult {
        let mut realized_pnl = BTreeMap::new();
        for venue in self.venues.keys() {
            for (currency, pnl) in self.kernel.portfolio.realized_pnls(venue) {
                *realized_pnl.entry(currency).or_insert(Decimal::ZERO) += pnl;
            }
        }
        let cache = self.kernel.cache.borrow();
        let events = self.event_log.borrow().clone();
        BacktestResult {
            trader_id: self.config.trader_id.clone(),
            iterations: self.iterations,
            start,
            end,
            total_events: events.len(),
            total_orders: cache.orders_total_count(),
            total_positions: cache.positions_total_count(),
            realized_pnl,
            events,
        }
    }

    /// Return to the state right after setup so the same run can be repeated
    ///
    /// Venues, instruments, data and strategies are kept; orders, positions,
    /// accounts, timers and the event log are cleared.
    pub fn reset(&mut self) -> Result<()> {
        self.kernel.reset()?;
        self.clock.reset(DateTime::<Utc>::UNIX_EPOCH);
        for venue in self.venues.values() {
            venue.exchange.reset();
        }
        {
            let mut cache = self.kernel.cache.borrow_mut();
            cache.reset();
            for instrument in self.instruments.values() {
                cache.add_instrument(instrument.clone())?;
            }
        }
        self.event_log.borrow_mut().clear();
        self.iterations = 0;
        self.has_run = false;
        log::info!("Reset backtest engine: trader_id={}", self.config.trader_id);
        Ok(())
    }

    /// Tear down the kernel; the engine cannot run afterwards
    pub fn dispose(&mut self) -> Result<()> {
        self.kernel.dispose()?;
        self.has_run = true;
        Ok(())
    }
}
