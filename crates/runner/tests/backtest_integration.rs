//! Full backtests: venues, data, strategies and the replay loop

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tessera_common::Message;
use tessera_core::data::{Data, DataType, QuoteTick};
use tessera_core::events::OrderEventAny;
use tessera_core::{Currency, InstrumentId, Side, Venue, stubs};
use tessera_exchange_sim::SimulatedVenueConfig;
use tessera_matching::FillModelConfig;
use tessera_ports::TimeEvent;
use tessera_risk::RiskEngineConfig;
use tessera_runner::{BacktestEngine, BacktestEngineConfig, BacktestError};
use tessera_strategy::{Action, Strategy, StrategyConfig, StrategyContext};

#[derive(Default)]
struct Journal {
    quotes: usize,
    net_on_quote: Vec<Decimal>,
    order_events: Vec<&'static str>,
    timers: Vec<String>,
}

#[derive(Clone, Copy)]
enum Entry {
    Market(Decimal),
    Limit(Decimal, Decimal),
}

/// Enters once on the first quote, optionally flattens at `close_at`
struct Scripted {
    config: StrategyConfig,
    entry: Entry,
    close_at: Option<i64>,
    journal: Rc<RefCell<Journal>>,
    entered: bool,
}

impl Strategy for Scripted {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn on_start(&mut self, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        let mut actions = vec![
            Action::Subscribe(DataType::QuoteTicks(stubs::btcusdt_id())),
            Action::SetTimer {
                name: "heartbeat".to_string(),
                interval: Duration::seconds(10),
                start: None,
                stop: None,
            },
        ];
        if let Some(secs) = self.close_at {
            actions.push(Action::SetTimeAlert {
                name: "close".to_string(),
                alert_time: stubs::ts(secs),
            });
        }
        actions
    }

    fn on_quote(&mut self, quote: &QuoteTick, ctx: &StrategyContext<'_>) -> Vec<Action> {
        {
            let mut journal = self.journal.borrow_mut();
            journal.quotes += 1;
            journal.net_on_quote.push(ctx.net_position(&quote.instrument_id));
        }
        if self.entered {
            return vec![];
        }
        self.entered = true;
        let id = quote.instrument_id.clone();
        let order = match self.entry {
            Entry::Market(qty) => ctx.orders().market(id, Side::Buy, qty),
            Entry::Limit(qty, px) => ctx.orders().limit(id, Side::Buy, qty, px),
        };
        order.map(|o| vec![Action::submit(o)]).unwrap_or_default()
    }

    fn on_order_event(&mut self, event: &OrderEventAny, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        self.journal.borrow_mut().order_events.push(event.kind());
        vec![]
    }

    fn on_time_event(&mut self, event: &TimeEvent, _ctx: &StrategyContext<'_>) -> Vec<Action> {
        self.journal.borrow_mut().timers.push(event.name.clone());
        if event.name == "close" {
            return vec![Action::ClosePosition {
                instrument_id: stubs::btcusdt_id(),
            }];
        }
        vec![]
    }

    fn on_reset(&mut self) {
        self.entered = false;
    }
}

fn scripted(entry: Entry, close_at: Option<i64>, journal: &Rc<RefCell<Journal>>) -> Box<dyn Strategy> {
    Box::new(Scripted {
        config: StrategyConfig::new("Scripted-001"),
        entry,
        close_at,
        journal: journal.clone(),
        entered: false,
    })
}

fn quote(bid: Decimal, ask: Decimal, secs: i64) -> Data {
    Data::Quote(stubs::quote(bid, ask, secs))
}

fn sim() -> Venue {
    Venue::new("SIM")
}

fn engine_with(config: BacktestEngineConfig) -> BacktestEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut engine = BacktestEngine::new(BacktestEngineConfig {
        venues: vec![SimulatedVenueConfig::default()],
        ..config
    })
    .unwrap();
    engine.add_instrument(stubs::btcusdt()).unwrap();
    engine
}

fn engine() -> BacktestEngine {
    engine_with(BacktestEngineConfig::default())
}

fn round_trip_data() -> Vec<Data> {
    vec![
        // Out of order on purpose: the engine sorts by ts_init
        quote(dec!(110), dec!(111), 20),
        quote(dec!(100), dec!(101), 1),
        quote(dec!(112), dec!(113), 30),
    ]
}

fn order_event_kinds(events: &[Message]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|m| match m {
            Message::OrderEvent(e) => Some(e.kind()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_market_round_trip_realizes_profit() {
    let mut engine = engine();
    let journal = Rc::new(RefCell::new(Journal::default()));
    engine.add_data(round_trip_data()).unwrap();
    engine
        .add_strategy(scripted(Entry::Market(dec!(1)), Some(25), &journal))
        .unwrap();

    let result = engine.run().unwrap();

    assert_eq!(result.iterations, 3);
    assert_eq!(result.start, Some(stubs::ts(1)));
    assert_eq!(result.end, Some(stubs::ts(30)));
    assert_eq!(result.total_orders, 2);
    assert_eq!(result.total_positions, 1);
    // Bought at the ask of 101, sold at the bid of 110
    assert!(result.realized_pnl[&Currency::usdt()] > dec!(8));

    let j = journal.borrow();
    assert_eq!(j.quotes, 3);
    assert_eq!(j.net_on_quote, vec![dec!(0), dec!(1), dec!(0)]);
    assert_eq!(j.timers, vec!["heartbeat", "heartbeat", "close"]);
    assert_eq!(
        j.order_events,
        vec![
            "OrderSubmitted",
            "OrderAccepted",
            "OrderFilled",
            "OrderSubmitted",
            "OrderAccepted",
            "OrderFilled"
        ]
    );
    assert_eq!(order_event_kinds(&result.events), j.order_events);
    assert!(
        result
            .events
            .iter()
            .any(|m| matches!(m, Message::AccountState(_)))
    );
    assert!(
        result
            .events
            .iter()
            .any(|m| matches!(m, Message::PositionEvent(_)))
    );
    assert_eq!(result.total_events, result.events.len());
}

#[test]
fn test_resting_limit_fills_when_market_crosses() {
    let mut engine = engine();
    let journal = Rc::new(RefCell::new(Journal::default()));
    engine
        .add_data([
            quote(dec!(100), dec!(101), 1),
            quote(dec!(96), dec!(97), 2),
            quote(dec!(94), dec!(94.5), 3),
        ])
        .unwrap();
    engine
        .add_strategy(scripted(Entry::Limit(dec!(1), dec!(95)), None, &journal))
        .unwrap();

    let result = engine.run().unwrap();

    let fills: Vec<_> = result
        .events
        .iter()
        .filter_map(|m| match m {
            Message::OrderEvent(OrderEventAny::Filled(fill)) => Some(fill),
            _ => None,
        })
        .collect();
    assert_eq!(fills.len(), 1);
    // Resting order fills at its own price, not the crossing ask
    assert_eq!(fills[0].last_px, dec!(95));
    assert_eq!(fills[0].ts_event, stubs::ts(3));

    assert_eq!(
        journal.borrow().order_events,
        vec!["OrderSubmitted", "OrderAccepted", "OrderWorking", "OrderFilled"]
    );
    // The crossing quote fills the resting order before the strategy sees it
    assert_eq!(journal.borrow().net_on_quote, vec![dec!(0), dec!(0), dec!(1)]);
}

#[test]
fn test_order_above_max_qty_is_denied_before_the_venue() {
    let mut engine = engine_with(BacktestEngineConfig {
        risk: RiskEngineConfig {
            max_order_qty: Some(dec!(0.5)),
            ..RiskEngineConfig::default()
        },
        ..BacktestEngineConfig::default()
    });
    let journal = Rc::new(RefCell::new(Journal::default()));
    engine
        .add_data([quote(dec!(100), dec!(101), 1), quote(dec!(100), dec!(101), 2)])
        .unwrap();
    engine
        .add_strategy(scripted(Entry::Market(dec!(1)), None, &journal))
        .unwrap();

    let result = engine.run().unwrap();

    assert_eq!(order_event_kinds(&result.events), vec!["OrderDenied"]);
    assert_eq!(journal.borrow().order_events, vec!["OrderDenied"]);
    assert_eq!(result.total_orders, 1);
    assert_eq!(result.total_positions, 0);
    assert_eq!(engine.exchange(&sim()).unwrap().command_count(), 0);
}

#[test]
fn test_identical_setups_emit_identical_events() {
    let noisy_fills = BacktestEngineConfig {
        seed: 7,
        fill_model: Some(FillModelConfig {
            prob_fill_on_limit: 0.5,
            prob_fill_on_stop: 1.0,
            prob_slippage: 0.5,
            random_seed: None,
        }),
        ..BacktestEngineConfig::default()
    };

    let run = || {
        let mut engine = engine_with(noisy_fills.clone());
        let journal = Rc::new(RefCell::new(Journal::default()));
        engine.add_data(round_trip_data()).unwrap();
        engine
            .add_strategy(scripted(Entry::Market(dec!(1)), Some(25), &journal))
            .unwrap();
        engine.run().unwrap().events_json().unwrap()
    };

    let first = run();
    let second = run();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_reset_allows_an_identical_rerun() {
    let mut engine = engine();
    let journal = Rc::new(RefCell::new(Journal::default()));
    engine.add_data(round_trip_data()).unwrap();
    engine
        .add_strategy(scripted(Entry::Market(dec!(1)), Some(25), &journal))
        .unwrap();

    let first = engine.run().unwrap();
    assert!(matches!(engine.run(), Err(BacktestError::AlreadyRun)));

    engine.reset().unwrap();
    let second = engine.run().unwrap();

    assert_eq!(first.events_json().unwrap(), second.events_json().unwrap());
    assert_eq!(first.realized_pnl, second.realized_pnl);
    assert_eq!(second.total_orders, 2);
    assert_eq!(second.iterations, 3);
}

#[test]
fn test_setup_errors() {
    let mut engine = engine();
    assert!(matches!(
        engine.add_venue(SimulatedVenueConfig::default()),
        Err(BacktestError::DuplicateVenue(_))
    ));

    let unknown = InstrumentId::new("ETHUSDT", "SIM");
    let stray = Data::Quote(QuoteTick::new(
        unknown.clone(),
        dec!(1),
        dec!(2),
        dec!(1),
        dec!(1),
        stubs::ts(1),
    ));
    match engine.add_data([stray]) {
        Err(BacktestError::InstrumentNotFound(id)) => assert_eq!(id, unknown),
        other => panic!("expected InstrumentNotFound, got {other:?}"),
    }

    let mut perp = stubs::ethusdt_perp();
    perp.id = InstrumentId::new("ETHUSDT-PERP", "OTHER");
    assert!(matches!(
        engine.add_instrument(perp),
        Err(BacktestError::VenueNotFound(_))
    ));
}
