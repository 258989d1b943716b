//! Deterministic fixtures shared by unit and integration tests across the
//! workspace.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::data::QuoteTick;
use crate::entities::{FeeSchedule, LiquiditySide, Order, OrderType, Side, TimeInForce};
use crate::events::{OrderFilled, OrderInitialized};
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, StrategyId, TradeId, TraderId, VenueOrderId,
};
use crate::instruments::Instrument;
use crate::values::{Currency, Money, Price, Quantity, Timestamp};

/// 2024-01-01T00:00:00Z plus `secs`
pub fn ts(secs: i64) -> Timestamp {
    let base: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    base + chrono::Duration::seconds(secs)
}

pub fn btcusdt_id() -> InstrumentId {
    InstrumentId::new("BTCUSDT", "SIM")
}

/// BTCUSDT spot on venue SIM: 2dp prices, 3dp sizes, 2/5 bps maker/taker
pub fn btcusdt() -> Instrument {
    Instrument::spot(btcusdt_id(), Currency::btc(), Currency::usdt(), 2, 3, ts(0))
        .with_fees(FeeSchedule::new(dec!(0.0002), dec!(0.0005)))
}

/// ETHUSDT-PERP on venue SIM with 10% initial / 5% maintenance margin
pub fn ethusdt_perp() -> Instrument {
    Instrument::perpetual(
        InstrumentId::new("ETHUSDT-PERP", "SIM"),
        Currency::usdt(),
        2,
        3,
        dec!(0.1),
        dec!(0.05),
        ts(0),
    )
}

pub fn trader_id() -> TraderId {
    TraderId::new("TESTER-001")
}

pub fn strategy_id() -> StrategyId {
    StrategyId::new("S-001")
}

pub fn account_id() -> AccountId {
    AccountId::new("SIM-001")
}

/// Initialization event for an order on BTCUSDT.SIM
pub fn order_init(
    id: &str,
    side: Side,
    order_type: OrderType,
    quantity: Quantity,
    price: Option<Price>,
) -> OrderInitialized {
    OrderInitialized {
        trader_id: trader_id(),
        strategy_id: strategy_id(),
        instrument_id: btcusdt_id(),
        client_order_id: ClientOrderId::new(id),
        side,
        order_type,
        quantity,
        price,
        trigger_price: None,
        time_in_force: TimeInForce::GTC,
        post_only: false,
        reduce_only: false,
        ts_event: ts(0),
        ts_init: ts(0),
    }
}

pub fn market_order(id: &str, side: Side, quantity: Quantity) -> Order {
    Order::new(order_init(id, side, OrderType::Market, quantity, None))
        .expect("valid market order")
}

pub fn limit_order(id: &str, side: Side, quantity: Quantity, price: Price) -> Order {
    Order::new(order_init(id, side, OrderType::Limit, quantity, Some(price)))
        .expect("valid limit order")
}

/// A taker fill for order "O-1" with zero commission
pub fn order_filled(side: Side, quantity: Quantity, price: Price, trade_id: &str) -> OrderFilled {
    OrderFilled {
        trader_id: trader_id(),
        strategy_id: strategy_id(),
        instrument_id: btcusdt_id(),
        client_order_id: ClientOrderId::new("O-1"),
        venue_order_id: VenueOrderId::new("V-1"),
        account_id: account_id(),
        trade_id: TradeId::new(trade_id),
        position_id: None,
        side,
        order_type: OrderType::Market,
        last_qty: quantity,
        last_px: price,
        currency: Currency::usdt(),
        commission: Money::new(Decimal::ZERO, Currency::usdt()),
        liquidity_side: LiquiditySide::Taker,
        reconciliation: false,
        ts_event: ts(1),
        ts_init: ts(1),
    }
}

pub fn quote(bid: Price, ask: Price, secs: i64) -> QuoteTick {
    QuoteTick::new(btcusdt_id(), bid, ask, dec!(10), dec!(10), ts(secs))
}
