//! Strategy Runtime
//!
//! Binds one [`Strategy`] to the kernel. The runtime subscribes to the
//! strategy's event topics and requested data, calls its hooks, and turns the
//! returned [`Action`]s into bus commands:
//!
//! | Action                          | Destination                    |
//! |---------------------------------|--------------------------------|
//! | Subscribe / Unsubscribe         | `DataEngine.execute`           |
//! | Request                         | `DataEngine.execute` (request) |
//! | Submit / Modify / Cancel / Close| `RiskEngine.execute`           |
//! | SetTimer / SetTimeAlert         | clock                          |

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use anyhow::{Context, anyhow};
use tessera_cache::{Cache, Portfolio};
use tessera_common::{
    Component, ComponentCore, ComponentState, Endpoints, Message, MessageBus, MessageHandler, Topics,
};
use tessera_core::commands::{
    CancelAllOrders, CancelOrder, DataCommand, ModifyOrder, RequestData, SubscribeData, SubmitOrder,
    TradingCommand,
};
use tessera_core::data::{Data, DataType};
use tessera_core::{
    ClientOrderId, InstrumentId, Order, PositionId, Side, StrategyId, Timestamp, VenueOrderId,
};
use tessera_ports::{Clock, TimeEvent, TimeEventCallback};
use uuid::Uuid;

use crate::actions::Action;
use crate::context::StrategyContext;
use crate::order_factory::{OrderFactory, OrderSpec};
use crate::strategy::{Strategy, StrategyConfig};

pub struct StrategyRuntime {
    core: ComponentCore,
    weak: Weak<StrategyRuntime>,
    strategy_id: StrategyId,
    config: StrategyConfig,
    strategy: RefCell<Box<dyn Strategy>>,
    clock: Rc<dyn Clock>,
    cache: Rc<RefCell<Cache>>,
    portfolio: Portfolio,
    msgbus: Rc<MessageBus>,
    order_factory: OrderFactory,
    subscriptions: RefCell<BTreeSet<DataType>>,
    timers: RefCell<BTreeSet<String>>,
}

impl StrategyRuntime {
    pub fn new(
        strategy: Box<dyn Strategy>,
        clock: Rc<dyn Clock>,
        cache: Rc<RefCell<Cache>>,
        msgbus: Rc<MessageBus>,
    ) -> Rc<Self> {
        let config = strategy.config().clone();
        let strategy_id = config.strategy_id.clone();
        let order_factory = OrderFactory::new(msgbus.trader_id().clone(), strategy_id.clone(), clock.clone());
        Rc::new_cyclic(|weak| Self {
            core: ComponentCore::new(strategy_id.as_str()),
            weak: weak.clone(),
            strategy_id,
            config,
            strategy: RefCell::new(strategy),
            clock,
            portfolio: Portfolio::new(cache.clone()),
            cache,
            msgbus,
            order_factory,
            subscriptions: RefCell::new(BTreeSet::new()),
            timers: RefCell::new(BTreeSet::new()),
        })
    }

    pub fn strategy_id(&self) -> &StrategyId {
        &self.strategy_id
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn order_factory(&self) -> &OrderFactory {
        &self.order_factory
    }

    /// Data types currently streamed to the strategy
    pub fn subscriptions(&self) -> Vec<DataType> {
        self.subscriptions.borrow().iter().cloned().collect()
    }

    pub fn timer_names(&self) -> Vec<String> {
        self.timers.borrow().iter().cloned().collect()
    }

    fn handler_id(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.strategy_id)
    }

    fn context(&self) -> StrategyContext<'_> {
        StrategyContext {
            trader_id: self.msgbus.trader_id(),
            strategy_id: &self.strategy_id,
            clock: &*self.clock,
            cache: &self.cache,
            portfolio: &self.portfolio,
            order_factory: &self.order_factory,
        }
    }

    fn accepts_events(&self) -> bool {
        matches!(
            self.state(),
            ComponentState::Starting | ComponentState::Running | ComponentState::Stopping
        )
    }

    /// Run a hook, then apply what it returned with no borrow held
    fn dispatch<F>(&self, hook: &str, f: F)
    where
        F: FnOnce(&mut dyn Strategy, &StrategyContext<'_>) -> Vec<Action>,
    {
        let actions = {
            let Ok(mut strategy) = self.strategy.try_borrow_mut() else {
                log::error!(
                    "Dropped re-entrant callback: strategy_id={}, hook={hook}",
                    self.strategy_id
                );
                return;
            };
            let ctx = self.context();
            f(&mut **strategy, &ctx)
        };
        self.apply(actions);
    }

    // Inbound

    /// Deliver a data point to the strategy
    pub fn handle_data(&self, data: &Data) {
        if !self.accepts_events() {
            return;
        }
        match data {
            Data::Instrument(instrument) => self.dispatch("on_instrument", |s, ctx| s.on_instrument(instrument, ctx)),
            Data::Quote(quote) => self.dispatch("on_quote", |s, ctx| s.on_quote(quote, ctx)),
            Data::Trade(trade) => self.dispatch("on_trade", |s, ctx| s.on_trade(trade, ctx)),
            Data::Bar(bar) => self.dispatch("on_bar", |s, ctx| s.on_bar(bar, ctx)),
            Data::Depth(depth) => self.dispatch("on_depth", |s, ctx| s.on_depth(depth, ctx)),
        }
    }

    pub fn handle_message(&self, msg: &Message) {
        if !self.accepts_events() {
            return;
        }
        match msg {
            Message::Data(data) => self.handle_data(data),
            Message::OrderEvent(event) => self.dispatch("on_order_event", |s, ctx| s.on_order_event(event, ctx)),
            Message::PositionEvent(event) => {
                self.dispatch("on_position_event", |s, ctx| s.on_position_event(event, ctx))
            }
            Message::DataResponse(response) => {
                self.dispatch("on_data_response", |s, ctx| s.on_data_response(response, ctx))
            }
            Message::Time(event) => self.handle_time_event(event),
            other => log::debug!(
                "Ignored message: strategy_id={}, kind={}",
                self.strategy_id,
                other.kind()
            ),
        }
    }

    pub fn handle_time_event(&self, event: &TimeEvent) {
        if !self.accepts_events() {
            return;
        }
        self.dispatch("on_time_event", |s, ctx| s.on_time_event(event, ctx));
    }

    fn bus_handler(&self, suffix: &str) -> MessageHandler {
        let weak = self.weak.clone();
        MessageHandler::new(self.handler_id(suffix), move |msg| {
            if let Some(runtime) = weak.upgrade() {
                runtime.handle_message(msg);
            }
            Ok(())
        })
    }

    // Outbound

    /// Apply actions in order; a failing action is logged and the rest still run
    pub fn apply(&self, actions: Vec<Action>) {
        for action in actions {
            let kind = action.kind();
            if let Err(e) = self.apply_one(action) {
                log::error!(
                    "Failed to apply action: strategy_id={}, action={kind}, error={e:#}",
                    self.strategy_id
                );
            }
        }
    }

    fn apply_one(&self, action: Action) -> anyhow::Result<()> {
        match action {
            Action::Subscribe(data_type) => self.subscribe(data_type),
            Action::Unsubscribe(data_type) => self.unsubscribe(data_type),
            Action::Request {
                data_type,
                start,
                end,
                limit,
            } => self.request(data_type, start, end, limit),
            Action::SubmitOrder { order, position_id } => self.submit_order(order, position_id),
            Action::ModifyOrder {
                client_order_id,
                quantity,
                price,
                trigger_price,
            } => {
                let (instrument_id, venue_order_id) = self.order_ids(&client_order_id)?;
                self.send_command(TradingCommand::ModifyOrder(ModifyOrder {
                    trader_id: self.msgbus.trader_id().clone(),
                    strategy_id: self.strategy_id.clone(),
                    client_id: None,
                    instrument_id,
                    client_order_id,
                    venue_order_id,
                    quantity,
                    price,
                    trigger_price,
                    command_id: Uuid::new_v4(),
                    ts_init: self.clock.now(),
                }))
            }
            Action::CancelOrder { client_order_id } => {
                let (instrument_id, venue_order_id) = self.order_ids(&client_order_id)?;
                self.send_command(TradingCommand::CancelOrder(CancelOrder {
                    trader_id: self.msgbus.trader_id().clone(),
                    strategy_id: self.strategy_id.clone(),
                    client_id: None,
                    instrument_id,
                    client_order_id,
                    venue_order_id,
                    command_id: Uuid::new_v4(),
                    ts_init: self.clock.now(),
                }))
            }
            Action::CancelAllOrders { instrument_id, side } => self.cancel_all(instrument_id, side),
            Action::ClosePosition { instrument_id } => self.close_position(instrument_id),
            Action::SetTimer {
                name,
                interval,
                start,
                stop,
            } => {
                self.clock
                    .set_timer(&name, interval, start, stop, self.time_callback())?;
                self.timers.borrow_mut().insert(name);
                Ok(())
            }
            Action::SetTimeAlert { name, alert_time } => {
                self.clock
                    .set_time_alert(&name, alert_time, self.time_callback())?;
                self.timers.borrow_mut().insert(name);
                Ok(())
            }
            Action::CancelTimer { name } => {
                self.clock.cancel_timer(&name);
                self.timers.borrow_mut().remove(&name);
                Ok(())
            }
        }
    }

    fn time_callback(&self) -> TimeEventCallback {
        let weak = self.weak.clone();
        Rc::new(move |event: &TimeEvent| {
            if let Some(runtime) = weak.upgrade() {
                runtime.handle_time_event(event);
            }
        })
    }

    fn subscribe(&self, data_type: DataType) -> anyhow::Result<()> {
        if self.subscriptions.borrow().contains(&data_type) {
            log::debug!(
                "Already subscribed: strategy_id={}, data_type={data_type:?}",
                self.strategy_id
            );
            return Ok(());
        }
        let topic = Topics::for_data_type(&data_type);
        self.msgbus.subscribe(&topic, self.bus_handler("data"), 0);
        self.msgbus.send(
            Endpoints::DATA_ENGINE_EXECUTE,
            &Message::DataCommand(DataCommand::Subscribe(self.data_command(&data_type))),
        )?;
        log::info!(
            "Subscribed strategy: strategy_id={}, topic={topic}",
            self.strategy_id
        );
        self.subscriptions.borrow_mut().insert(data_type);
        Ok(())
    }

    fn unsubscribe(&self, data_type: DataType) -> anyhow::Result<()> {
        if !self.subscriptions.borrow_mut().remove(&data_type) {
            log::debug!(
                "Not subscribed: strategy_id={}, data_type={data_type:?}",
                self.strategy_id
            );
            return Ok(());
        }
        let topic = Topics::for_data_type(&data_type);
        self.msgbus.unsubscribe(&topic, &self.handler_id("data"));
        self.msgbus.send(
            Endpoints::DATA_ENGINE_EXECUTE,
            &Message::DataCommand(DataCommand::Unsubscribe(self.data_command(&data_type))),
        )?;
        Ok(())
    }

    fn data_command(&self, data_type: &DataType) -> SubscribeData {
        SubscribeData {
            client_id: None,
            venue: None,
            data_type: data_type.clone(),
            command_id: Uuid::new_v4(),
            ts_init: self.clock.now(),
        }
    }

    fn request(
        &self,
        data_type: DataType,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        limit: Option<usize>,
    ) -> anyhow::Result<()> {
        let request_id = Uuid::new_v4();
        let request = RequestData {
            client_id: None,
            venue: None,
            data_type,
            start,
            end,
            limit,
            request_id,
            ts_init: self.clock.now(),
        };
        let weak = self.weak.clone();
        self.msgbus.request(
            Endpoints::DATA_ENGINE_EXECUTE,
            &Message::DataCommand(DataCommand::Request(request)),
            request_id,
            Box::new(move |msg| {
                if let Some(runtime) = weak.upgrade() {
                    runtime.handle_message(msg);
                }
                Ok(())
            }),
        )?;
        Ok(())
    }

    fn submit_order(&self, order: Order, position_id: Option<PositionId>) -> anyhow::Result<()> {
        if order.strategy_id != self.strategy_id {
            return Err(anyhow!(
                "order {} belongs to strategy {}",
                order.client_order_id,
                order.strategy_id
            ));
        }
        log::info!(
            "Submitting order: strategy_id={}, client_order_id={}, side={:?}, type={:?}, qty={}",
            self.strategy_id,
            order.client_order_id,
            order.side,
            order.order_type,
            order.quantity
        );
        self.send_command(TradingCommand::SubmitOrder(SubmitOrder {
            trader_id: self.msgbus.trader_id().clone(),
            strategy_id: self.strategy_id.clone(),
            client_id: None,
            order,
            position_id,
            command_id: Uuid::new_v4(),
            ts_init: self.clock.now(),
        }))
    }

    fn cancel_all(&self, instrument_id: InstrumentId, side: Option<Side>) -> anyhow::Result<()> {
        self.send_command(TradingCommand::CancelAllOrders(CancelAllOrders {
            trader_id: self.msgbus.trader_id().clone(),
            strategy_id: self.strategy_id.clone(),
            client_id: None,
            instrument_id,
            side,
            command_id: Uuid::new_v4(),
            ts_init: self.clock.now(),
        }))
    }

    fn close_position(&self, instrument_id: InstrumentId) -> anyhow::Result<()> {
        let net = self.context().net_position(&instrument_id);
        if net.is_zero() {
            log::debug!(
                "Nothing to close: strategy_id={}, instrument_id={instrument_id}",
                self.strategy_id
            );
            return Ok(());
        }
        let side = if net.is_sign_positive() { Side::Sell } else { Side::Buy };
        let order = self
            .order_factory
            .create(OrderSpec::market(instrument_id, side, net.abs()).reduce_only())?;
        self.submit_order(order, None)
    }

    fn order_ids(
        &self,
        client_order_id: &ClientOrderId,
    ) -> anyhow::Result<(InstrumentId, Option<VenueOrderId>)> {
        let cache = self.cache.borrow();
        let order = cache
            .order(client_order_id)
            .with_context(|| format!("order {client_order_id} not found"))?;
        Ok((order.instrument_id.clone(), order.venue_order_id.clone()))
    }

    fn send_command(&self, command: TradingCommand) -> anyhow::Result<()> {
        self.msgbus
            .send(Endpoints::RISK_ENGINE_EXECUTE, &Message::TradingCommand(command))?;
        Ok(())
    }

    fn cancel_open_orders(&self) {
        let instruments: BTreeSet<InstrumentId> = self
            .cache
            .borrow()
            .orders_open(None, None, Some(&self.strategy_id), None)
            .into_iter()
            .map(|o| o.instrument_id.clone())
            .collect();
        for instrument_id in instruments {
            if let Err(e) = self.cancel_all(instrument_id.clone(), None) {
                log::error!(
                    "Failed to cancel orders on stop: strategy_id={}, instrument_id={instrument_id}, error={e:#}",
                    self.strategy_id
                );
            }
        }
    }
}

impl Component for StrategyRuntime {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn on_start(&self) -> anyhow::Result<()> {
        let sid = &self.strategy_id;
        self.msgbus
            .subscribe(&Topics::order_events(sid), self.bus_handler("orders"), 0);
        self.msgbus
            .subscribe(&Topics::position_events(sid), self.bus_handler("positions"), 0);

        // Resume numbering after orders the cache already holds for this strategy
        let existing = self
            .cache
            .borrow()
            .orders(None, None, Some(sid), None)
            .len() as u64;
        if existing > self.order_factory.count() {
            self.order_factory.set_count(existing);
        }

        self.dispatch("on_start", |s, ctx| s.on_start(ctx));
        Ok(())
    }

    fn on_stop(&self) -> anyhow::Result<()> {
        self.dispatch("on_stop", |s, ctx| s.on_stop(ctx));
        if self.config.cancel_orders_on_stop {
            self.cancel_open_orders();
        }
        let timers = std::mem::take(&mut *self.timers.borrow_mut());
        for name in timers {
            self.clock.cancel_timer(&name);
        }
        Ok(())
    }

    fn on_resume(&self) -> anyhow::Result<()> {
        self.dispatch("on_resume", |s, ctx| s.on_resume(ctx));
        Ok(())
    }

    fn on_reset(&self) -> anyhow::Result<()> {
        self.strategy
            .try_borrow_mut()
            .map_err(|_| anyhow!("strategy {} is busy", self.strategy_id))?
            .on_reset();
        self.order_factory.reset();
        // The data engine drops its own subscriptions on reset
        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for data_type in subscriptions {
            self.msgbus
                .unsubscribe(&Topics::for_data_type(&data_type), &self.handler_id("data"));
        }
        Ok(())
    }

    fn on_dispose(&self) -> anyhow::Result<()> {
        let sid = &self.strategy_id;
        self.msgbus
            .unsubscribe(&Topics::order_events(sid), &self.handler_id("orders"));
        self.msgbus
            .unsubscribe(&Topics::position_events(sid), &self.handler_id("positions"));
        for data_type in self.subscriptions() {
            if let Err(e) = self.unsubscribe(data_type) {
                log::warn!("Failed to unsubscribe on dispose: strategy_id={sid}, error={e:#}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use rust_decimal_macros::dec;
    use tessera_clock::TestClock;
    use tessera_core::data::QuoteTick;
    use tessera_core::stubs;

    struct Recorder {
        config: StrategyConfig,
        quotes: Rc<Cell<usize>>,
    }

    impl Strategy for Recorder {
        fn config(&self) -> &StrategyConfig {
            &self.config
        }

        fn on_start(&mut self, _ctx: &StrategyContext<'_>) -> Vec<Action> {
            vec![Action::Subscribe(DataType::QuoteTicks(stubs::btcusdt_id()))]
        }

        fn on_quote(&mut self, _quote: &QuoteTick, _ctx: &StrategyContext<'_>) -> Vec<Action> {
            self.quotes.set(self.quotes.get() + 1);
            vec![]
        }
    }

    struct Setup {
        runtime: Rc<StrategyRuntime>,
        msgbus: Rc<MessageBus>,
        commands: Rc<RefCell<Vec<Message>>>,
        quotes: Rc<Cell<usize>>,
    }

    fn setup() -> Setup {
        let clock = Rc::new(TestClock::new(stubs::ts(0)));
        let cache = Rc::new(RefCell::new(Cache::default()));
        let msgbus = Rc::new(MessageBus::new(stubs::trader_id(), None));
        let commands = Rc::new(RefCell::new(Vec::new()));
        let sink = commands.clone();
        msgbus
            .register(
                Endpoints::DATA_ENGINE_EXECUTE,
                MessageHandler::new("data-sink", move |msg| {
                    sink.borrow_mut().push(msg.clone());
                    Ok(())
                }),
            )
            .unwrap();
        let quotes = Rc::new(Cell::new(0));
        let strategy = Recorder {
            config: StrategyConfig::new("Recorder-001"),
            quotes: quotes.clone(),
        };
        let runtime = StrategyRuntime::new(Box::new(strategy), clock, cache, msgbus.clone());
        runtime.initialize().unwrap();
        Setup {
            runtime,
            msgbus,
            commands,
            quotes,
        }
    }

    #[test]
    fn test_start_subscribes_once() {
        let t = setup();
        t.runtime.start().unwrap();
        t.runtime
            .apply(vec![Action::Subscribe(DataType::QuoteTicks(stubs::btcusdt_id()))]);

        assert!(t.runtime.is_running());
        assert_eq!(t.commands.borrow().len(), 1);
        assert_eq!(
            t.runtime.subscriptions(),
            vec![DataType::QuoteTicks(stubs::btcusdt_id())]
        );
    }

    #[test]
    fn test_quotes_reach_strategy_only_while_running() {
        let t = setup();
        let quote = Message::Data(Data::Quote(stubs::quote(dec!(100), dec!(101), 1)));
        let topic = Topics::quotes(&stubs::btcusdt_id());

        t.runtime.start().unwrap();
        assert_eq!(t.msgbus.publish(&topic, &quote), 1);
        assert_eq!(t.quotes.get(), 1);

        t.runtime.stop().unwrap();
        t.msgbus.publish(&topic, &quote);
        assert_eq!(t.quotes.get(), 1);
    }

    #[test]
    fn test_cancel_unknown_order_is_not_sent() {
        let t = setup();
        t.runtime.start().unwrap();
        let sent = t.msgbus.sent_count();
        t.runtime
            .apply(vec![Action::cancel(ClientOrderId::new("O-404"))]);
        assert_eq!(t.msgbus.sent_count(), sent);
    }

    #[test]
    fn test_dispose_unsubscribes_everything() {
        let t = setup();
        t.runtime.start().unwrap();
        t.runtime.stop().unwrap();
        t.runtime.dispose().unwrap();

        assert!(t.runtime.subscriptions().is_empty());
        assert!(!t.msgbus.has_subscribers(&Topics::quotes(&stubs::btcusdt_id())));
        assert!(
            !t.msgbus
                .has_subscribers(&Topics::order_events(&StrategyId::new("Recorder-001")))
        );
        let unsubscribes = t
            .commands
            .borrow()
            .iter()
            .filter(|m| matches!(m, Message::DataCommand(DataCommand::Unsubscribe(_))))
            .count();
        assert_eq!(unsubscribes, 1);
    }
}
