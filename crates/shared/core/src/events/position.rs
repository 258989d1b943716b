use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{Position, PositionSide, Side};
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, TraderId,
};
use crate::values::{Currency, Price, Quantity, Timestamp};

/// Which position transition produced the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionEventKind {
    Opened,
    Changed,
    Closed,
}

/// Snapshot of a position published after each fill application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEvent {
    pub kind: PositionEventKind,
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub position_id: PositionId,
    pub account_id: AccountId,
    pub opening_order_id: ClientOrderId,
    pub closing_order_id: Option<ClientOrderId>,
    pub entry: Side,
    pub side: PositionSide,
    pub signed_qty: Decimal,
    pub quantity: Quantity,
    pub peak_qty: Quantity,
    pub last_qty: Quantity,
    pub last_px: Price,
    pub currency: Currency,
    pub avg_px_open: Price,
    pub avg_px_close: Option<Price>,
    pub realized_pnl: Decimal,
    pub ts_opened: Timestamp,
    pub ts_closed: Option<Timestamp>,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

impl PositionEvent {
    /// Build the event from the position state after its last fill
    pub fn from_position(
        kind: PositionEventKind,
        position: &Position,
        last_qty: Quantity,
        last_px: Price,
        ts_init: Timestamp,
    ) -> Self {
        Self {
            kind,
            trader_id: position.trader_id.clone(),
            strategy_id: position.strategy_id.clone(),
            instrument_id: position.instrument_id.clone(),
            position_id: position.id.clone(),
            account_id: position.account_id.clone(),
            opening_order_id: position.opening_order_id.clone(),
            closing_order_id: position.closing_order_id.clone(),
            entry: position.entry,
            side: position.side,
            signed_qty: position.signed_qty,
            quantity: position.quantity,
            peak_qty: position.peak_qty,
            last_qty,
            last_px,
            currency: position.settlement_currency.clone(),
            avg_px_open: position.avg_px_open,
            avg_px_close: position.avg_px_close,
            realized_pnl: position.realized_pnl,
            ts_opened: position.ts_opened,
            ts_closed: position.ts_closed,
            ts_event: position.ts_last,
            ts_init,
        }
    }
}
