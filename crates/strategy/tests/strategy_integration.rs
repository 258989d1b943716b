//! Strategies wired to the full kernel: data, risk and execution engines
//! plus a simulated venue

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tessera_cache::Cache;
use tessera_clock::TestClock;
use tessera_common::{Component, MessageBus};
use tessera_core::data::{Data, DataType, QuoteTick};
use tessera_core::events::{OrderEventAny, PositionEvent};
use tessera_core::{OrderStatus, Side, Venue, stubs};
use tessera_data::{DataEngine, DataEngineConfig};
use tessera_exchange_sim::{
    BacktestDataClient, BacktestExecutionClient, SimulatedExchange, SimulatedVenueConfig,
};
use tessera_execution::{ExecEngineConfig, ExecutionEngine};
use tessera_ports::TimeEvent;
use tessera_risk::{RiskEngine, RiskEngineConfig};
use tessera_strategy::{Action, Strategy, StrategyConfig, StrategyContext, Trader};

#[derive(Default)]
struct Journal {
    quotes: usize,
    order_events: Vec<&'static str>,
    positions: Vec<Decimal>,
    timers: Vec<String>,
}

/// Buys once on the first quote, then flattens when asked by a time alert
struct BuyThenClose {
    config: StrategyConfig,
    journal: Rc<RefCell<Journal>>,
    bought: bool,
}

impl Strategy for BuyThenClose {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn on_start(&mut self, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        vec![
            Action::Subscribe(DataType::QuoteTicks(stubs::btcusdt_id())),
            // Duplicate on purpose: must not reach the data engine twice
            Action::Subscribe(DataType::QuoteTicks(stubs::btcusdt_id())),
            Action::SetTimer {
                name: "heartbeat".to_string(),
                interval: Duration::seconds(10),
                start: None,
                stop: None,
            },
            Action::SetTimeAlert {
                name: "flatten".to_string(),
                alert_time: stubs::ts(25),
            },
        ]
    }

    fn on_quote(&mut self, quote: &QuoteTick, ctx: &StrategyContext<'_>) -> Vec<Action> {
        self.journal.borrow_mut().quotes += 1;
        if self.bought {
            return vec![];
        }
        self.bought = true;
        match ctx.orders().market(quote.instrument_id.clone(), Side::Buy, dec!(1)) {
            Ok(order) => vec![Action::submit(order)],
            Err(_) => vec![],
        }
    }

    fn on_order_event(&mut self, event: &OrderEventAny, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        self.journal.borrow_mut().order_events.push(event.kind());
        vec![]
    }

    fn on_position_event(&mut self, event: &PositionEvent, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        self.journal.borrow_mut().positions.push(event.signed_qty);
        vec![]
    }

    fn on_time_event(&mut self, event: &TimeEvent, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        self.journal.borrow_mut().timers.push(event.name.clone());
        if event.name == "flatten" {
            return vec![Action::ClosePosition {
                instrument_id: stubs::btcusdt_id(),
            }];
        }
        vec![]
    }

    fn on_reset(&mut self) {
        self.bought = false;
    }
}

struct Kernel {
    clock: Rc<TestClock>,
    cache: Rc<RefCell<Cache>>,
    data_engine: Rc<DataEngine>,
    exchange: Rc<SimulatedExchange>,
    trader: Trader,
    _risk: Rc<RiskEngine>,
    _exec: Rc<ExecutionEngine>,
}

fn kernel() -> Kernel {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Rc::new(TestClock::new(stubs::ts(0)));
    let msgbus = Rc::new(MessageBus::new(stubs::trader_id(), None));
    let cache = Rc::new(RefCell::new(Cache::default()));
    cache.borrow_mut().add_instrument(stubs::btcusdt()).unwrap();

    let exchange = Rc::new(
        SimulatedExchange::new(SimulatedVenueConfig::default(), clock.clone(), msgbus.clone()).unwrap(),
    );
    exchange.add_instrument(stubs::btcusdt()).unwrap();

    let data_engine = DataEngine::new(clock.clone(), cache.clone(), msgbus.clone(), DataEngineConfig::default());
    data_engine.register_endpoints().unwrap();
    data_engine
        .register_default_client(Rc::new(BacktestDataClient::new(
            Venue::new("SIM"),
            clock.clone(),
            msgbus.clone(),
        )))
        .unwrap();

    let risk = RiskEngine::new(clock.clone(), cache.clone(), msgbus.clone(), RiskEngineConfig::default());
    risk.register_endpoints().unwrap();

    let exec = ExecutionEngine::new(clock.clone(), cache.clone(), msgbus.clone(), ExecEngineConfig::default());
    exec.register_endpoints().unwrap();
    exec.register_client(Rc::new(BacktestExecutionClient::new(
        exchange.clone(),
        clock.clone(),
        msgbus.clone(),
    )))
    .unwrap();

    for component in [
        data_engine.clone() as Rc<dyn Component>,
        risk.clone(),
        exec.clone(),
    ] {
        component.initialize().unwrap();
        component.start().unwrap();
    }

    let trader = Trader::new(clock.clone(), cache.clone(), msgbus);
    trader.initialize().unwrap();

    Kernel {
        clock,
        cache,
        data_engine,
        exchange,
        trader,
        _risk: risk,
        _exec: exec,
    }
}

impl Kernel {
    /// Feed one quote the way the backtest loop does
    fn quote(&self, bid: Decimal, ask: Decimal, secs: i64) {
        self.advance(secs);
        let data = Data::Quote(stubs::quote(bid, ask, secs));
        self.data_engine.process(data.clone());
        self.exchange.process_data(&data);
        self.exchange.settle();
    }

    fn advance(&self, secs: i64) {
        for handler in self.clock.advance_time(stubs::ts(secs), false) {
            self.clock.set_time(handler.event.ts_event);
            handler.run();
            self.exchange.settle();
        }
        self.clock.set_time(stubs::ts(secs));
    }
}

fn buy_then_close(journal: &Rc<RefCell<Journal>>) -> Box<dyn Strategy> {
    Box::new(BuyThenClose {
        config: StrategyConfig::new("BuyThenClose-001"),
        journal: journal.clone(),
        bought: false,
    })
}

#[test]
fn test_first_quote_triggers_market_buy() {
    let k = kernel();
    let journal = Rc::new(RefCell::new(Journal::default()));
    let runtime = k.trader.add_strategy(buy_then_close(&journal)).unwrap();
    k.trader.start().unwrap();
    assert!(runtime.is_running());

    k.quote(dec!(100), dec!(101), 1);

    let j = journal.borrow();
    assert_eq!(j.quotes, 1);
    assert_eq!(j.order_events, vec!["OrderSubmitted", "OrderAccepted", "OrderFilled"]);
    assert_eq!(j.positions, vec![dec!(1)]);

    let cache = k.cache.borrow();
    let orders = cache.orders(None, None, Some(runtime.strategy_id()), None);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Filled);
    assert_eq!(orders[0].client_order_id.as_str(), "O-20240101-000001-001-001-1");
}

#[test]
fn test_duplicate_subscription_reaches_engine_once() {
    let k = kernel();
    let journal = Rc::new(RefCell::new(Journal::default()));
    let runtime = k.trader.add_strategy(buy_then_close(&journal)).unwrap();
    k.trader.start().unwrap();

    assert_eq!(k.data_engine.subscriptions(), vec![DataType::QuoteTicks(stubs::btcusdt_id())]);
    assert_eq!(runtime.subscriptions().len(), 1);

    k.quote(dec!(100), dec!(101), 1);
    k.quote(dec!(100), dec!(101), 2);
    // One handler, so each quote arrives exactly once
    assert_eq!(journal.borrow().quotes, 2);
}

#[test]
fn test_timers_fire_and_alert_flattens_position() {
    let k = kernel();
    let journal = Rc::new(RefCell::new(Journal::default()));
    let runtime = k.trader.add_strategy(buy_then_close(&journal)).unwrap();
    k.trader.start().unwrap();

    k.quote(dec!(100), dec!(101), 1);
    k.quote(dec!(102), dec!(103), 30);

    let j = journal.borrow();
    assert_eq!(j.timers, vec!["heartbeat", "heartbeat", "flatten", "heartbeat"]);
    // Opened long 1, then the reduce-only close sold it at the bid
    assert_eq!(j.positions, vec![dec!(1), dec!(0)]);
    drop(j);

    let cache = k.cache.borrow();
    let open = cache.positions_open(None, Some(&stubs::btcusdt_id()), Some(runtime.strategy_id()));
    assert!(open.is_empty());
    let orders = cache.orders(None, None, Some(runtime.strategy_id()), None);
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.status == OrderStatus::Filled));
}

#[test]
fn test_stop_cancels_timers() {
    let k = kernel();
    let journal = Rc::new(RefCell::new(Journal::default()));
    let runtime = k.trader.add_strategy(buy_then_close(&journal)).unwrap();
    k.trader.start().unwrap();
    assert_eq!(runtime.timer_names(), vec!["flatten".to_string(), "heartbeat".to_string()]);

    k.trader.stop().unwrap();
    assert!(runtime.timer_names().is_empty());
    k.advance(60);
    assert!(journal.borrow().timers.is_empty());
}
