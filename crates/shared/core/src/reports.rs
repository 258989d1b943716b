//! Venue state reports used for reconciliation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{LiquiditySide, OrderStatus, OrderType, Side, TimeInForce};
use crate::identifiers::{
    AccountId, ClientId, ClientOrderId, InstrumentId, PositionId, TradeId, Venue, VenueOrderId,
};
use crate::values::{Money, Price, Quantity, Timestamp};

/// Venue's view of one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub client_order_id: Option<ClientOrderId>,
    pub venue_order_id: VenueOrderId,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    pub quantity: Quantity,
    pub filled_qty: Quantity,
    pub avg_px: Option<Price>,
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
    pub ts_last: Timestamp,
    pub ts_init: Timestamp,
}

/// Venue's view of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub venue_order_id: VenueOrderId,
    pub client_order_id: Option<ClientOrderId>,
    pub trade_id: TradeId,
    pub side: Side,
    pub last_qty: Quantity,
    pub last_px: Price,
    pub commission: Money,
    pub liquidity_side: LiquiditySide,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

/// Venue's view of the net position in one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStatusReport {
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub position_id: Option<PositionId>,
    pub signed_qty: Decimal,
    pub avg_px_open: Option<Price>,
    pub ts_last: Timestamp,
    pub ts_init: Timestamp,
}

/// Everything a client knows about an account, generated on (re)connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMassStatus {
    pub client_id: ClientId,
    pub account_id: AccountId,
    pub venue: Venue,
    pub order_reports: Vec<OrderStatusReport>,
    pub fill_reports: Vec<FillReport>,
    pub position_reports: Vec<PositionStatusReport>,
    pub ts_init: Timestamp,
}

impl ExecutionMassStatus {
    pub fn new(client_id: ClientId, account_id: AccountId, venue: Venue, ts_init: Timestamp) -> Self {
        Self {
            client_id,
            account_id,
            venue,
            order_reports: Vec::new(),
            fill_reports: Vec::new(),
            position_reports: Vec::new(),
            ts_init,
        }
    }

    /// Fill reports belonging to a venue order, oldest first
    pub fn fills_for(&self, venue_order_id: &VenueOrderId) -> Vec<&FillReport> {
        let mut fills: Vec<&FillReport> = self
            .fill_reports
            .iter()
            .filter(|f| &f.venue_order_id == venue_order_id)
            .collect();
        fills.sort_by_key(|f| f.ts_event);
        fills
    }
}
