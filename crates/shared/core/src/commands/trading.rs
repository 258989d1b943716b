use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Order, Side};
use crate::identifiers::{
    ClientId, ClientOrderId, InstrumentId, PositionId, StrategyId, TraderId, VenueOrderId,
};
use crate::values::{Price, Quantity, Timestamp};

/// Send a new order to its venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOrder {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub client_id: Option<ClientId>,
    /// Order snapshot in `Initialized` state
    pub order: Order,
    pub position_id: Option<PositionId>,
    pub command_id: Uuid,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub client_id: Option<ClientId>,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub command_id: Uuid,
    pub ts_init: Timestamp,
}

/// Amend quantity and/or prices of an open order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyOrder {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub client_id: Option<ClientId>,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub quantity: Option<Quantity>,
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
    pub command_id: Uuid,
    pub ts_init: Timestamp,
}

/// Cancel every open order of a strategy for an instrument (optionally one side)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelAllOrders {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub client_id: Option<ClientId>,
    pub instrument_id: InstrumentId,
    pub side: Option<Side>,
    pub command_id: Uuid,
    pub ts_init: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradingCommand {
    SubmitOrder(SubmitOrder),
    CancelOrder(CancelOrder),
    ModifyOrder(ModifyOrder),
    CancelAllOrders(CancelAllOrders),
}

impl TradingCommand {
    pub fn instrument_id(&self) -> &InstrumentId {
        match self {
            TradingCommand::SubmitOrder(c) => &c.order.instrument_id,
            TradingCommand::CancelOrder(c) => &c.instrument_id,
            TradingCommand::ModifyOrder(c) => &c.instrument_id,
            TradingCommand::CancelAllOrders(c) => &c.instrument_id,
        }
    }

    pub fn client_id(&self) -> Option<&ClientId> {
        match self {
            TradingCommand::SubmitOrder(c) => c.client_id.as_ref(),
            TradingCommand::CancelOrder(c) => c.client_id.as_ref(),
            TradingCommand::ModifyOrder(c) => c.client_id.as_ref(),
            TradingCommand::CancelAllOrders(c) => c.client_id.as_ref(),
        }
    }

    pub fn strategy_id(&self) -> &StrategyId {
        match self {
            TradingCommand::SubmitOrder(c) => &c.strategy_id,
            TradingCommand::CancelOrder(c) => &c.strategy_id,
            TradingCommand::ModifyOrder(c) => &c.strategy_id,
            TradingCommand::CancelAllOrders(c) => &c.strategy_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TradingCommand::SubmitOrder(_) => "SubmitOrder",
            TradingCommand::CancelOrder(_) => "CancelOrder",
            TradingCommand::ModifyOrder(_) => "ModifyOrder",
            TradingCommand::CancelAllOrders(_) => "CancelAllOrders",
        }
    }
}
