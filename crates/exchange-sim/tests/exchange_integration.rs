//! Simulated venue wired to the execution and data engines through the bus

use std::cell::RefCell;
use std::rc::Rc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tessera_cache::Cache;
use tessera_clock::TestClock;
use tessera_common::{Component, Endpoints, Message, MessageBus, MessageHandler};
use tessera_core::commands::{
    CancelOrder, DataCommand, DataPayload, RequestData, SubmitOrder, TradingCommand,
};
use tessera_core::data::{Data, DataType};
use tessera_core::events::OrderEventAny;
use tessera_core::{
    AccountId, Currency, LiquiditySide, Order, OrderStatus, Side, stubs,
};
use tessera_data::{DataEngine, DataEngineConfig};
use tessera_exchange_sim::{
    BacktestDataClient, BacktestExecutionClient, SimulatedExchange, SimulatedVenueConfig,
};
use tessera_execution::{ExecEngineConfig, ExecutionEngine};
use uuid::Uuid;

struct Harness {
    clock: Rc<TestClock>,
    cache: Rc<RefCell<Cache>>,
    msgbus: Rc<MessageBus>,
    engine: Rc<ExecutionEngine>,
    exchange: Rc<SimulatedExchange>,
    events: Rc<RefCell<Vec<OrderEventAny>>>,
}

fn venue() -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Rc::new(TestClock::new(stubs::ts(0)));
    let msgbus = Rc::new(MessageBus::new(stubs::trader_id(), None));
    let exchange = Rc::new(
        SimulatedExchange::new(SimulatedVenueConfig::default(), clock.clone(), msgbus.clone()).unwrap(),
    );
    exchange.add_instrument(stubs::btcusdt()).unwrap();
    connect(clock, msgbus, exchange)
}

/// Fresh cache and execution engine attached to an existing exchange
fn connect(clock: Rc<TestClock>, msgbus: Rc<MessageBus>, exchange: Rc<SimulatedExchange>) -> Harness {
    let cache = Rc::new(RefCell::new(Cache::default()));
    cache.borrow_mut().add_instrument(stubs::btcusdt()).unwrap();
    let engine = ExecutionEngine::new(clock.clone(), cache.clone(), msgbus.clone(), ExecEngineConfig::default());
    engine.register_endpoints().unwrap();
    let client = Rc::new(BacktestExecutionClient::new(exchange.clone(), clock.clone(), msgbus.clone()));
    engine.register_client(client).unwrap();
    engine.initialize().unwrap();
    engine.start().unwrap();

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    msgbus.subscribe(
        "events.order.*",
        MessageHandler::new("recorder", move |msg: &Message| {
            if let Message::OrderEvent(e) = msg {
                sink.borrow_mut().push(e.clone());
            }
            Ok(())
        }),
        0,
    );

    Harness {
        clock,
        cache,
        msgbus,
        engine,
        exchange,
        events,
    }
}

fn submit(order: &Order) -> TradingCommand {
    TradingCommand::SubmitOrder(SubmitOrder {
        trader_id: stubs::trader_id(),
        strategy_id: stubs::strategy_id(),
        client_id: None,
        order: order.clone(),
        position_id: None,
        command_id: Uuid::default(),
        ts_init: stubs::ts(1),
    })
}

fn quote(v: &Harness, bid: Decimal, ask: Decimal, secs: i64) {
    v.clock.set_time(stubs::ts(secs));
    v.exchange
        .process_data(&Data::Quote(stubs::quote(bid, ask, secs)));
}

fn kinds(v: &Harness) -> Vec<&'static str> {
    v.events.borrow().iter().map(|e| e.kind()).collect()
}

#[test]
fn test_market_buy_fills_and_opens_position() {
    let v = venue();
    quote(&v, dec!(100), dec!(101), 1);

    let order = stubs::market_order("O-1", Side::Buy, dec!(1));
    v.engine.execute(&submit(&order)).unwrap();
    assert_eq!(kinds(&v), vec!["OrderSubmitted"]);

    v.exchange.settle();
    assert_eq!(kinds(&v), vec!["OrderSubmitted", "OrderAccepted", "OrderFilled"]);

    let events = v.events.borrow();
    let OrderEventAny::Filled(fill) = &events[2] else {
        panic!("expected a fill");
    };
    assert_eq!(fill.last_qty, dec!(1));
    assert_eq!(fill.last_px, dec!(101));
    assert_eq!(fill.liquidity_side, LiquiditySide::Taker);
    // 5 bps taker on a 101 notional
    assert_eq!(fill.commission.amount, dec!(0.0505));

    let cache = v.cache.borrow();
    assert_eq!(cache.order(&order.client_order_id).unwrap().status, OrderStatus::Filled);
    let positions = cache.positions_open(None, Some(&stubs::btcusdt_id()), None);
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].signed_qty, dec!(1));

    let account = cache.account(&AccountId::new("SIM-001")).unwrap();
    assert_eq!(account.balance_total(&Currency::usdt()), dec!(999898.9495));
    assert_eq!(account.balance_total(&Currency::btc()), dec!(1));
}

#[test]
fn test_limit_rests_until_market_crosses() {
    let v = venue();
    quote(&v, dec!(100), dec!(101), 1);

    let order = stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(99));
    v.engine.execute(&submit(&order)).unwrap();
    v.exchange.settle();
    assert_eq!(kinds(&v), vec!["OrderSubmitted", "OrderAccepted", "OrderWorking"]);

    quote(&v, dec!(99.5), dec!(100.5), 2);
    assert_eq!(v.events.borrow().len(), 3);

    quote(&v, dec!(97.5), dec!(98), 3);
    assert_eq!(
        kinds(&v),
        vec!["OrderSubmitted", "OrderAccepted", "OrderWorking", "OrderFilled"]
    );
    let events = v.events.borrow();
    let OrderEventAny::Filled(fill) = &events[3] else {
        panic!("expected a fill");
    };
    assert_eq!(fill.last_px, dec!(99));
    assert_eq!(fill.liquidity_side, LiquiditySide::Maker);
}

#[test]
fn test_cancel_through_engine_reaches_venue() {
    let v = venue();
    quote(&v, dec!(100), dec!(101), 1);
    let order = stubs::limit_order("O-1", Side::Buy, dec!(1), dec!(99));
    v.engine.execute(&submit(&order)).unwrap();
    v.exchange.settle();

    v.engine
        .execute(&TradingCommand::CancelOrder(CancelOrder {
            trader_id: stubs::trader_id(),
            strategy_id: stubs::strategy_id(),
            client_id: None,
            instrument_id: stubs::btcusdt_id(),
            client_order_id: order.client_order_id.clone(),
            venue_order_id: None,
            command_id: Uuid::default(),
            ts_init: stubs::ts(2),
        }))
        .unwrap();
    v.exchange.settle();

    assert_eq!(kinds(&v).last(), Some(&"OrderCanceled"));
    assert_eq!(v.exchange.open_order_count(), 0);
    assert_eq!(
        v.cache.borrow().order(&order.client_order_id).unwrap().status,
        OrderStatus::Canceled
    );
}

#[test]
fn test_restarted_engine_reconciles_venue_position() {
    let v = venue();
    quote(&v, dec!(100), dec!(101), 1);
    let order = stubs::market_order("O-1", Side::Buy, dec!(1));
    v.engine.execute(&submit(&order)).unwrap();
    v.exchange.settle();

    // A new cache knows nothing; starting the engine pulls the venue's mass status
    v.msgbus.deregister(Endpoints::EXEC_ENGINE_EXECUTE);
    v.msgbus.deregister(Endpoints::EXEC_ENGINE_PROCESS);
    let restarted = connect(v.clock.clone(), v.msgbus.clone(), v.exchange.clone());

    let cache = restarted.cache.borrow();
    let positions = cache.positions_open(None, Some(&stubs::btcusdt_id()), None);
    let net: Decimal = positions.iter().map(|p| p.signed_qty).sum();
    assert_eq!(net, dec!(1));
    assert_eq!(positions[0].avg_px_open, dec!(101));
}

#[test]
fn test_data_client_answers_requests_from_history() {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Rc::new(TestClock::new(stubs::ts(100)));
    let msgbus = Rc::new(MessageBus::new(stubs::trader_id(), None));
    let cache = Rc::new(RefCell::new(Cache::default()));
    let engine = DataEngine::new(clock.clone(), cache.clone(), msgbus.clone(), DataEngineConfig::default());
    engine.register_endpoints().unwrap();

    let client = Rc::new(BacktestDataClient::new(
        tessera_core::Venue::new("SIM"),
        clock.clone(),
        msgbus.clone(),
    ));
    client.add_data((1..=5).map(|s| Data::Quote(stubs::quote(dec!(100), dec!(101), s))));
    engine.register_client(client.clone(), None).unwrap();
    engine.initialize().unwrap();
    engine.start().unwrap();

    let received = Rc::new(RefCell::new(None));
    let sink = received.clone();
    let request_id = Uuid::new_v4();
    let request = RequestData {
        client_id: None,
        venue: None,
        data_type: DataType::QuoteTicks(stubs::btcusdt_id()),
        start: Some(stubs::ts(2)),
        end: Some(stubs::ts(5)),
        limit: Some(2),
        request_id,
        ts_init: stubs::ts(100),
    };
    msgbus
        .request(
            Endpoints::DATA_ENGINE_EXECUTE,
            &Message::DataCommand(DataCommand::Request(request)),
            request_id,
            Box::new(move |msg| {
                if let Message::DataResponse(resp) = msg {
                    *sink.borrow_mut() = Some(resp.payload.clone());
                }
                Ok(())
            }),
        )
        .unwrap();

    let payload = received.borrow().clone().expect("response delivered");
    let DataPayload::Quotes(quotes) = payload else {
        panic!("expected quotes");
    };
    let secs: Vec<_> = quotes.iter().map(|q| q.ts_event).collect();
    assert_eq!(secs, vec![stubs::ts(4), stubs::ts(5)]);
    assert_eq!(cache.borrow().quote_count(&stubs::btcusdt_id()), 2);
}
