//! Data Engine
//!
//! Routes data commands to data clients, writes incoming data to the cache
//! and republishes it on the bus:
//! - Subscriptions are idempotent: a client is called once per data type
//! - Requests validate their time range before any client is touched
//! - Internal bar types are built here from the quote and trade stream

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::{Rc, Weak};

use tessera_cache::Cache;
use tessera_common::{Component, ComponentCore, Endpoints, Message, MessageBus, MessageHandler, Topics};
use tessera_core::commands::{DataCommand, DataPayload, DataResponse, RequestData, SubscribeData};
use tessera_core::data::{Bar, BarType, Data, DataType, PriceType, QuoteTick, TradeTick};
use tessera_core::{ClientId, Venue};
use tessera_ports::{Clock, DataClient, TimeEvent};

use crate::aggregation::{BarAggregator, create_aggregator, floor_to_interval};
use crate::config::DataEngineConfig;
use crate::error::{DataEngineError, Result};

/// Central hub between data clients, the cache and subscribers
pub struct DataEngine {
    core: ComponentCore,
    weak: Weak<DataEngine>,
    clock: Rc<dyn Clock>,
    cache: Rc<RefCell<Cache>>,
    msgbus: Rc<MessageBus>,
    config: DataEngineConfig,
    clients: RefCell<BTreeMap<ClientId, Rc<dyn DataClient>>>,
    routing: RefCell<HashMap<Venue, ClientId>>,
    default_client: RefCell<Option<ClientId>>,
    subscriptions: RefCell<BTreeSet<DataType>>,
    /// Tick types subscribed on behalf of a caller, not just an aggregator
    requested: RefCell<BTreeSet<DataType>>,
    /// Aggregators holding each underlying tick subscription
    aggregated_ticks: RefCell<BTreeMap<DataType, usize>>,
    aggregators: RefCell<BTreeMap<BarType, Box<dyn BarAggregator>>>,
    command_count: Cell<u64>,
    data_count: Cell<u64>,
    request_count: Cell<u64>,
    response_count: Cell<u64>,
}

impl DataEngine {
    pub fn new(
        clock: Rc<dyn Clock>,
        cache: Rc<RefCell<Cache>>,
        msgbus: Rc<MessageBus>,
        config: DataEngineConfig,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            core: ComponentCore::new("DataEngine"),
            weak: weak.clone(),
            clock,
            cache,
            msgbus,
            config,
            clients: RefCell::new(BTreeMap::new()),
            routing: RefCell::new(HashMap::new()),
            default_client: RefCell::new(None),
            subscriptions: RefCell::new(BTreeSet::new()),
            requested: RefCell::new(BTreeSet::new()),
            aggregated_ticks: RefCell::new(BTreeMap::new()),
            aggregators: RefCell::new(BTreeMap::new()),
            command_count: Cell::new(0),
            data_count: Cell::new(0),
            request_count: Cell::new(0),
            response_count: Cell::new(0),
        })
    }

    pub fn config(&self) -> &DataEngineConfig {
        &self.config
    }

    /// Register the `DataEngine.execute`, `.process` and `.response` endpoints
    pub fn register_endpoints(&self) -> Result<()> {
        let weak = self.weak.clone();
        self.msgbus.register(
            Endpoints::DATA_ENGINE_EXECUTE,
            MessageHandler::new(Endpoints::DATA_ENGINE_EXECUTE, move |msg| {
                let Some(engine) = weak.upgrade() else {
                    return Ok(());
                };
                match msg {
                    Message::DataCommand(cmd) => Ok(engine.execute(cmd)?),
                    other => {
                        log::warn!("Dropped unexpected message: endpoint=DataEngine.execute, kind={}", other.kind());
                        Ok(())
                    }
                }
            }),
        )?;

        let weak = self.weak.clone();
        self.msgbus.register(
            Endpoints::DATA_ENGINE_PROCESS,
            MessageHandler::new(Endpoints::DATA_ENGINE_PROCESS, move |msg| {
                let Some(engine) = weak.upgrade() else {
                    return Ok(());
                };
                match msg {
                    Message::Data(data) => engine.process(data.clone()),
                    other => log::warn!("Dropped unexpected message: endpoint=DataEngine.process, kind={}", other.kind()),
                }
                Ok(())
            }),
        )?;

        let weak = self.weak.clone();
        self.msgbus.register(
            Endpoints::DATA_ENGINE_RESPONSE,
            MessageHandler::new(Endpoints::DATA_ENGINE_RESPONSE, move |msg| {
                let Some(engine) = weak.upgrade() else {
                    return Ok(());
                };
                match msg {
                    Message::DataResponse(resp) => Ok(engine.response(resp.clone())?),
                    other => {
                        log::warn!("Dropped unexpected message: endpoint=DataEngine.response, kind={}", other.kind());
                        Ok(())
                    }
                }
            }),
        )?;
        Ok(())
    }

    // Clients

    /// Register a client, routed by `routing` or else by the client's own venue
    pub fn register_client(&self, client: Rc<dyn DataClient>, routing: Option<Venue>) -> Result<()> {
        let client_id = client.client_id().clone();
        if self.clients.borrow().contains_key(&client_id) {
            return Err(DataEngineError::DuplicateClient(client_id));
        }
        if let Some(venue) = routing.or_else(|| client.venue().cloned()) {
            self.routing.borrow_mut().insert(venue, client_id.clone());
        }
        log::info!("Registered data client: client_id={client_id}");
        self.clients.borrow_mut().insert(client_id, client);
        Ok(())
    }

    /// Register the client used when neither client id nor venue resolve
    pub fn register_default_client(&self, client: Rc<dyn DataClient>) -> Result<()> {
        let client_id = client.client_id().clone();
        self.register_client(client, None)?;
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

    fn client_for(&self, client_id: Option<&ClientId>, venue: &Venue) -> Result<Rc<dyn DataClient>> {
        let clients = self.clients.borrow();
        if let Some(id) = client_id {
            return clients
                .get(id)
                .cloned()
                .ok_or_else(|| DataEngineError::NoClient(id.to_string()));
        }
        let routed = self.routing.borrow().get(venue).cloned();
        routed
            .or_else(|| self.default_client.borrow().clone())
            .and_then(|id| clients.get(&id).cloned())
            .ok_or_else(|| DataEngineError::NoClient(venue.to_string()))
    }

    // Commands

    pub fn execute(&self, command: &DataCommand) -> Result<()> {
        self.command_count.set(self.command_count.get() + 1);
        log::debug!("Executing data command: data_type={:?}", command.data_type());
        match command {
            DataCommand::Subscribe(cmd) => self.handle_subscribe(cmd),
            DataCommand::Unsubscribe(cmd) => self.handle_unsubscribe(cmd),
            DataCommand::Request(req) => self.handle_request(req),
        }
    }

    fn handle_subscribe(&self, cmd: &SubscribeData) -> Result<()> {
        if let DataType::Bars(bar_type) = &cmd.data_type {
            if bar_type.is_internally_aggregated() {
                return self.start_bar_aggregation(bar_type, cmd);
            }
        }
        self.subscribe_client(cmd)?;
        self.requested.borrow_mut().insert(cmd.data_type.clone());
        Ok(())
    }

    fn subscribe_client(&self, cmd: &SubscribeData) -> Result<()> {
        if self.subscriptions.borrow().contains(&cmd.data_type) {
            log::debug!("Already subscribed: data_type={:?}", cmd.data_type);
            return Ok(());
        }

        let client = self.client_for(cmd.client_id.as_ref(), cmd.data_type.venue())?;
        match &cmd.data_type {
            DataType::Instrument(_) => client.subscribe_instrument(cmd)?,
            DataType::Instruments(_) => client.subscribe_instruments(cmd)?,
            DataType::QuoteTicks(_) => client.subscribe_quote_ticks(cmd)?,
            DataType::TradeTicks(_) => client.subscribe_trade_ticks(cmd)?,
            DataType::Bars(_) => client.subscribe_bars(cmd)?,
            DataType::OrderBookDepth { .. } => client.subscribe_order_book_depth(cmd)?,
        }
        log::info!(
            "Subscribed: data_type={:?}, client_id={}",
            cmd.data_type,
            client.client_id()
        );
        self.subscriptions.borrow_mut().insert(cmd.data_type.clone());
        Ok(())
    }

    fn handle_unsubscribe(&self, cmd: &SubscribeData) -> Result<()> {
        if let DataType::Bars(bar_type) = &cmd.data_type {
            if bar_type.is_internally_aggregated() {
                return self.stop_bar_aggregation(bar_type, cmd);
            }
        }
        self.requested.borrow_mut().remove(&cmd.data_type);
        if self.aggregated_ticks.borrow().contains_key(&cmd.data_type) {
            log::debug!("Kept subscription for bar aggregation: data_type={:?}", cmd.data_type);
            return Ok(());
        }
        self.unsubscribe_client(cmd)
    }

    fn unsubscribe_client(&self, cmd: &SubscribeData) -> Result<()> {
        if !self.subscriptions.borrow().contains(&cmd.data_type) {
            log::debug!("Not subscribed: data_type={:?}", cmd.data_type);
            return Ok(());
        }

        let client = self.client_for(cmd.client_id.as_ref(), cmd.data_type.venue())?;
        match &cmd.data_type {
            DataType::Instrument(_) => client.unsubscribe_instrument(cmd)?,
            DataType::Instruments(_) => client.unsubscribe_instruments(cmd)?,
            DataType::QuoteTicks(_) => client.unsubscribe_quote_ticks(cmd)?,
            DataType::TradeTicks(_) => client.unsubscribe_trade_ticks(cmd)?,
            DataType::Bars(_) => client.unsubscribe_bars(cmd)?,
            DataType::OrderBookDepth { .. } => client.unsubscribe_order_book_depth(cmd)?,
        }
        log::info!("Unsubscribed: data_type={:?}", cmd.data_type);
        self.subscriptions.borrow_mut().remove(&cmd.data_type);
        Ok(())
    }

    fn handle_request(&self, req: &RequestData) -> Result<()> {
        let now = self.clock.now();
        let start = req.start.unwrap_or(now);
        let end = req.end.unwrap_or(now);
        if start > end || end > now {
            return Err(DataEngineError::InvalidRequestRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
                now: now.to_rfc3339(),
            });
        }

        let client = self.client_for(req.client_id.as_ref(), req.data_type.venue())?;
        self.request_count.set(self.request_count.get() + 1);
        log::debug!(
            "Requesting data: request_id={}, data_type={:?}, client_id={}",
            req.request_id,
            req.data_type,
            client.client_id()
        );
        match &req.data_type {
            DataType::Instrument(_) => client.request_instrument(req)?,
            DataType::Instruments(_) => client.request_instruments(req)?,
            DataType::QuoteTicks(_) => client.request_quote_ticks(req)?,
            DataType::TradeTicks(_) => client.request_trade_ticks(req)?,
            DataType::Bars(_) => client.request_bars(req)?,
            DataType::OrderBookDepth { .. } => client.request_order_book_depth(req)?,
        }
        Ok(())
    }

    pub fn is_subscribed(&self, data_type: &DataType) -> bool {
        self.subscriptions.borrow().contains(data_type)
    }

    /// Active subscriptions, including internally aggregated bar types
    pub fn subscriptions(&self) -> Vec<DataType> {
        self.subscriptions.borrow().iter().cloned().collect()
    }

    // Bar aggregation

    fn start_bar_aggregation(&self, bar_type: &BarType, cmd: &SubscribeData) -> Result<()> {
        if self.aggregators.borrow().contains_key(bar_type) {
            log::debug!("Already aggregating: bar_type={bar_type}");
            return Ok(());
        }
        let aggregator = create_aggregator(
            bar_type,
            self.clock.now(),
            self.config.time_bars_build_with_no_updates,
            self.config.time_bars_timestamp_on_close,
        )?;

        // Underlying ticks first so a failing client leaves no aggregator behind
        let ticks = underlying_ticks(bar_type);
        self.subscribe_client(&SubscribeData {
            data_type: ticks.clone(),
            ..cmd.clone()
        })?;
        *self.aggregated_ticks.borrow_mut().entry(ticks).or_insert(0) += 1;

        if let Some(interval) = bar_type.spec.timedelta() {
            let weak = self.weak.clone();
            let timer_bar_type = bar_type.clone();
            let start = floor_to_interval(self.clock.now(), interval);
            self.clock.set_timer(
                &bar_type.to_string(),
                interval,
                start,
                None,
                Rc::new(move |event: &TimeEvent| {
                    if let Some(engine) = weak.upgrade() {
                        engine.on_bar_timer(&timer_bar_type, event);
                    }
                }),
            )?;
        }

        log::info!("Started bar aggregation: bar_type={bar_type}");
        self.aggregators
            .borrow_mut()
            .insert(bar_type.clone(), aggregator);
        self.subscriptions
            .borrow_mut()
            .insert(DataType::Bars(bar_type.clone()));
        Ok(())
    }

    /// Drop the aggregator, then the underlying ticks once nothing holds them
    fn stop_bar_aggregation(&self, bar_type: &BarType, cmd: &SubscribeData) -> Result<()> {
        if !self.remove_aggregator(bar_type) {
            return Ok(());
        }
        let ticks = underlying_ticks(bar_type);
        let released = {
            let mut held = self.aggregated_ticks.borrow_mut();
            match held.get_mut(&ticks) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    held.remove(&ticks);
                    true
                }
                None => false,
            }
        };
        if released && !self.requested.borrow().contains(&ticks) {
            self.unsubscribe_client(&SubscribeData {
                data_type: ticks,
                ..cmd.clone()
            })?;
        }
        Ok(())
    }

    fn remove_aggregator(&self, bar_type: &BarType) -> bool {
        if self.aggregators.borrow_mut().remove(bar_type).is_none() {
            log::debug!("Not aggregating: bar_type={bar_type}");
            return false;
        }
        if bar_type.spec.timedelta().is_some() {
            self.clock.cancel_timer(&bar_type.to_string());
        }
        self.subscriptions
            .borrow_mut()
            .remove(&DataType::Bars(bar_type.clone()));
        log::info!("Stopped bar aggregation: bar_type={bar_type}");
        true
    }

    fn on_bar_timer(&self, bar_type: &BarType, event: &TimeEvent) {
        let bars = match self.aggregators.borrow_mut().get_mut(bar_type) {
            Some(aggregator) => aggregator.on_time(event.ts_event),
            None => return,
        };
        for bar in bars {
            self.handle_bar(bar);
        }
    }

    fn aggregate_quote(&self, quote: &QuoteTick) -> Vec<Bar> {
        let mut aggregators = self.aggregators.borrow_mut();
        aggregators
            .iter_mut()
            .filter(|(bt, _)| {
                bt.instrument_id == quote.instrument_id && bt.spec.price_type != PriceType::Last
            })
            .flat_map(|(_, agg)| agg.handle_quote(quote))
            .collect()
    }

    fn aggregate_trade(&self, trade: &TradeTick) -> Vec<Bar> {
        let mut aggregators = self.aggregators.borrow_mut();
        aggregators
            .iter_mut()
            .filter(|(bt, _)| {
                bt.instrument_id == trade.instrument_id && bt.spec.price_type == PriceType::Last
            })
            .flat_map(|(_, agg)| agg.handle_trade(trade))
            .collect()
    }

    // Data

    /// Write `data` to the cache, publish it and feed bar aggregators
    pub fn process(&self, data: Data) {
        self.data_count.set(self.data_count.get() + 1);
        match data {
            Data::Instrument(instrument) => self.handle_instrument(*instrument),
            Data::Depth(depth) => {
                self.cache.borrow_mut().add_depth(depth.clone());
                self.publish(Data::Depth(depth));
            }
            Data::Quote(quote) => self.handle_quote(quote),
            Data::Trade(trade) => self.handle_trade(trade),
            Data::Bar(bar) => self.handle_bar(bar),
        }
    }

    fn handle_instrument(&self, instrument: tessera_core::Instrument) {
        if let Err(e) = self.cache.borrow_mut().add_instrument(instrument.clone()) {
            log::error!("Failed to cache instrument: instrument={}, error={e}", instrument.id);
            return;
        }
        self.publish(Data::Instrument(Box::new(instrument)));
    }

    fn handle_quote(&self, quote: QuoteTick) {
        if self.config.validate_data_sequence {
            let last = self.cache.borrow().quote(&quote.instrument_id).map(|q| q.ts_event);
            if last.is_some_and(|ts| quote.ts_event < ts) {
                log::warn!(
                    "Dropped out-of-sequence quote: instrument={}, ts_event={}",
                    quote.instrument_id,
                    quote.ts_event
                );
                return;
            }
        }
        self.cache.borrow_mut().add_quote(quote.clone());
        let bars = self.aggregate_quote(&quote);
        self.publish(Data::Quote(quote));
        for bar in bars {
            self.handle_bar(bar);
        }
    }

    fn handle_trade(&self, trade: TradeTick) {
        if self.config.validate_data_sequence {
            let last = self.cache.borrow().trade(&trade.instrument_id).map(|t| t.ts_event);
            if last.is_some_and(|ts| trade.ts_event < ts) {
                log::warn!(
                    "Dropped out-of-sequence trade: instrument={}, ts_event={}",
                    trade.instrument_id,
                    trade.ts_event
                );
                return;
            }
        }
        self.cache.borrow_mut().add_trade(trade.clone());
        let bars = self.aggregate_trade(&trade);
        self.publish(Data::Trade(trade));
        for bar in bars {
            self.handle_bar(bar);
        }
    }

    fn handle_bar(&self, bar: Bar) {
        if self.config.validate_data_sequence {
            let last = self.cache.borrow().bar(&bar.bar_type).map(|b| b.ts_event);
            if last.is_some_and(|ts| bar.ts_event < ts) {
                log::warn!(
                    "Dropped out-of-sequence bar: bar_type={}, ts_event={}",
                    bar.bar_type,
                    bar.ts_event
                );
                return;
            }
        }
        self.cache.borrow_mut().add_bar(bar.clone());
        self.publish(Data::Bar(bar));
    }

    fn publish(&self, data: Data) {
        let topic = Topics::for_data(&data);
        self.msgbus.publish(&topic, &Message::Data(data));
    }

    // Responses

    /// Write a response's payload to the cache and route it to the requester
    pub fn response(&self, response: DataResponse) -> Result<()> {
        self.response_count.set(self.response_count.get() + 1);
        log::debug!(
            "Handling data response: correlation_id={}, client_id={}, items={}",
            response.correlation_id,
            response.client_id,
            response.payload.len()
        );
        {
            let mut cache = self.cache.borrow_mut();
            match &response.payload {
                DataPayload::Instruments(instruments) => {
                    for instrument in instruments {
                        cache.add_instrument(instrument.clone())?;
                    }
                }
                DataPayload::Quotes(quotes) => cache.add_quotes(quotes.clone()),
                DataPayload::Trades(trades) => cache.add_trades(trades.clone()),
                DataPayload::Bars(bars) => cache.add_bars(bars.clone()),
                DataPayload::Depth(depth) => cache.add_depth(depth.clone()),
            }
        }
        let correlation_id = response.correlation_id;
        self.msgbus
            .response(correlation_id, &Message::DataResponse(response))?;
        Ok(())
    }

    // Counters

    pub fn command_count(&self) -> u64 {
        self.command_count.get()
    }

    pub fn data_count(&self) -> u64 {
        self.data_count.get()
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.get()
    }

    pub fn response_count(&self) -> u64 {
        self.response_count.get()
    }
}

impl Component for DataEngine {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn on_start(&self) -> anyhow::Result<()> {
        let clients: Vec<Rc<dyn DataClient>> = self.clients.borrow().values().cloned().collect();
        for client in clients {
            client.connect()?;
        }
        Ok(())
    }

    fn on_stop(&self) -> anyhow::Result<()> {
        let clients: Vec<Rc<dyn DataClient>> = self.clients.borrow().values().cloned().collect();
        for client in clients {
            if let Err(e) = client.disconnect() {
                log::warn!(
                    "Failed to disconnect data client: client_id={}, error={e}",
                    client.client_id()
                );
            }
        }
        Ok(())
    }

    fn on_reset(&self) -> anyhow::Result<()> {
        let bar_types: Vec<BarType> = self.aggregators.borrow().keys().cloned().collect();
        for bar_type in bar_types {
            self.remove_aggregator(&bar_type);
        }
        self.subscriptions.borrow_mut().clear();
        self.requested.borrow_mut().clear();
        self.aggregated_ticks.borrow_mut().clear();
        self.command_count.set(0);
        self.data_count.set(0);
        self.request_count.set(0);
        self.response_count.set(0);
        Ok(())
    }

    fn on_dispose(&self) -> anyhow::Result<()> {
        for endpoint in [
            Endpoints::DATA_ENGINE_EXECUTE,
            Endpoints::DATA_ENGINE_PROCESS,
            Endpoints::DATA_ENGINE_RESPONSE,
        ] {
            self.msgbus.deregister(endpoint);
        }
        Ok(())
    }
}

/// Tick stream an internal bar type is built from
fn underlying_ticks(bar_type: &BarType) -> DataType {
    let instrument_id = bar_type.instrument_id.clone();
    match bar_type.spec.price_type {
        PriceType::Last => DataType::TradeTicks(instrument_id),
        _ => DataType::QuoteTicks(instrument_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tessera_clock::TestClock;
    use tessera_core::data::{AggregationSource, BarAggregation, BarSpecification};
    use tessera_core::stubs;
    use tessera_ports::ClientError;
    use uuid::Uuid;

    struct RecordingClient {
        id: ClientId,
        calls: RefCell<Vec<String>>,
    }

    impl DataClient for RecordingClient {
        fn client_id(&self) -> &ClientId {
            &self.id
        }

        fn venue(&self) -> Option<&Venue> {
            None
        }

        fn connect(&self) -> std::result::Result<(), ClientError> {
            Ok(())
        }

        fn disconnect(&self) -> std::result::Result<(), ClientError> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn subscribe_quote_ticks(&self, cmd: &SubscribeData) -> std::result::Result<(), ClientError> {
            self.calls.borrow_mut().push(format!("sub {:?}", cmd.data_type));
            Ok(())
        }

        fn unsubscribe_quote_ticks(&self, cmd: &SubscribeData) -> std::result::Result<(), ClientError> {
            self.calls.borrow_mut().push(format!("unsub {:?}", cmd.data_type));
            Ok(())
        }

        fn request_quote_ticks(&self, req: &RequestData) -> std::result::Result<(), ClientError> {
            self.calls.borrow_mut().push(format!("req {}", req.request_id));
            Ok(())
        }
    }

    fn setup() -> (Rc<TestClock>, Rc<DataEngine>, Rc<RecordingClient>) {
        let clock = Rc::new(TestClock::new(stubs::ts(100)));
        let cache = Rc::new(RefCell::new(Cache::default()));
        let msgbus = Rc::new(MessageBus::new(stubs::trader_id(), None));
        let engine = DataEngine::new(clock.clone(), cache, msgbus, DataEngineConfig::default());
        let client = Rc::new(RecordingClient {
            id: ClientId::new("SIM"),
            calls: RefCell::new(Vec::new()),
        });
        engine.register_default_client(client.clone()).unwrap();
        (clock, engine, client)
    }

    fn subscribe(data_type: DataType) -> DataCommand {
        DataCommand::Subscribe(SubscribeData {
            client_id: None,
            venue: None,
            data_type,
            command_id: Uuid::nil(),
            ts_init: stubs::ts(100),
        })
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let (_clock, engine, client) = setup();
        let quotes = DataType::QuoteTicks(stubs::btcusdt_id());
        engine.execute(&subscribe(quotes.clone())).unwrap();
        engine.execute(&subscribe(quotes.clone())).unwrap();

        assert_eq!(client.calls.borrow().len(), 1);
        assert!(engine.is_subscribed(&quotes));
        assert_eq!(engine.command_count(), 2);
    }

    #[test]
    fn test_unsubscribe_without_subscription_is_noop() {
        let (_clock, engine, client) = setup();
        let cmd = DataCommand::Unsubscribe(SubscribeData {
            client_id: None,
            venue: None,
            data_type: DataType::QuoteTicks(stubs::btcusdt_id()),
            command_id: Uuid::nil(),
            ts_init: stubs::ts(100),
        });
        engine.execute(&cmd).unwrap();
        assert!(client.calls.borrow().is_empty());
    }

    #[test]
    fn test_unsupported_subscription_surfaces_client_error() {
        let (_clock, engine, _client) = setup();
        let result = engine.execute(&subscribe(DataType::TradeTicks(stubs::btcusdt_id())));
        assert!(matches!(result, Err(DataEngineError::Client(ClientError::Unsupported(_)))));
        assert!(!engine.is_subscribed(&DataType::TradeTicks(stubs::btcusdt_id())));
    }

    #[test]
    fn test_request_range_validated_before_client_call() {
        let (_clock, engine, client) = setup();
        let request = |start, end| {
            DataCommand::Request(RequestData {
                client_id: None,
                venue: None,
                data_type: DataType::QuoteTicks(stubs::btcusdt_id()),
                start,
                end,
                limit: None,
                request_id: Uuid::nil(),
                ts_init: stubs::ts(100),
            })
        };

        let future_end = engine.execute(&request(Some(stubs::ts(10)), Some(stubs::ts(200))));
        assert!(matches!(future_end, Err(DataEngineError::InvalidRequestRange { .. })));
        let inverted = engine.execute(&request(Some(stubs::ts(50)), Some(stubs::ts(10))));
        assert!(matches!(inverted, Err(DataEngineError::InvalidRequestRange { .. })));
        assert!(client.calls.borrow().is_empty());

        engine.execute(&request(Some(stubs::ts(10)), Some(stubs::ts(90)))).unwrap();
        engine.execute(&request(None, None)).unwrap();
        assert_eq!(client.calls.borrow().len(), 2);
        assert_eq!(engine.request_count(), 2);
    }

    #[test]
    fn test_explicit_unknown_client_fails() {
        let (_clock, engine, _client) = setup();
        let cmd = DataCommand::Subscribe(SubscribeData {
            client_id: Some(ClientId::new("NOPE")),
            venue: None,
            data_type: DataType::QuoteTicks(stubs::btcusdt_id()),
            command_id: Uuid::nil(),
            ts_init: stubs::ts(100),
        });
        assert!(matches!(engine.execute(&cmd), Err(DataEngineError::NoClient(_))));
    }

    #[test]
    fn test_process_quote_writes_cache() {
        let (_clock, engine, _client) = setup();
        engine.process(Data::Quote(stubs::quote(dec!(100), dec!(101), 100)));
        assert_eq!(
            engine.cache.borrow().quote(&stubs::btcusdt_id()).map(|q| q.bid_price),
            Some(dec!(100))
        );
        assert_eq!(engine.data_count(), 1);
    }

    fn unsubscribe(data_type: DataType) -> DataCommand {
        DataCommand::Unsubscribe(SubscribeData {
            client_id: None,
            venue: None,
            data_type,
            command_id: Uuid::nil(),
            ts_init: stubs::ts(100),
        })
    }

    fn bid_tick_bars(step: u64) -> DataType {
        DataType::Bars(BarType::new(
            stubs::btcusdt_id(),
            BarSpecification::new(step, BarAggregation::Tick, PriceType::Bid),
            AggregationSource::Internal,
        ))
    }

    #[test]
    fn test_stopping_bar_aggregation_releases_underlying_ticks() {
        let (_clock, engine, client) = setup();
        let quotes = DataType::QuoteTicks(stubs::btcusdt_id());

        engine.execute(&subscribe(bid_tick_bars(3))).unwrap();
        assert!(engine.is_subscribed(&quotes));

        engine.execute(&unsubscribe(bid_tick_bars(3))).unwrap();

        assert!(engine.subscriptions().is_empty());
        assert_eq!(
            *client.calls.borrow(),
            vec![format!("sub {quotes:?}"), format!("unsub {quotes:?}")]
        );
    }

    #[test]
    fn test_underlying_ticks_kept_while_still_held() {
        let (_clock, engine, client) = setup();
        let quotes = DataType::QuoteTicks(stubs::btcusdt_id());

        // Two aggregators share the quote stream, and a caller asked for it too
        engine.execute(&subscribe(bid_tick_bars(3))).unwrap();
        engine.execute(&subscribe(bid_tick_bars(5))).unwrap();
        engine.execute(&subscribe(quotes.clone())).unwrap();

        engine.execute(&unsubscribe(bid_tick_bars(3))).unwrap();
        engine.execute(&unsubscribe(bid_tick_bars(5))).unwrap();
        assert!(engine.is_subscribed(&quotes));

        engine.execute(&unsubscribe(quotes.clone())).unwrap();
        assert!(!engine.is_subscribed(&quotes));
        assert_eq!(client.calls.borrow().len(), 2);
    }

    #[test]
    fn test_unsubscribing_ticks_keeps_them_for_aggregation() {
        let (_clock, engine, client) = setup();
        let quotes = DataType::QuoteTicks(stubs::btcusdt_id());

        engine.execute(&subscribe(quotes.clone())).unwrap();
        engine.execute(&subscribe(bid_tick_bars(3))).unwrap();
        engine.execute(&unsubscribe(quotes.clone())).unwrap();
        assert!(engine.is_subscribed(&quotes));

        engine.execute(&unsubscribe(bid_tick_bars(3))).unwrap();
        assert!(!engine.is_subscribed(&quotes));
        assert_eq!(client.calls.borrow().len(), 2);
    }
}
