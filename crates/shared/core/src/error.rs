use rust_decimal::Decimal;
use thiserror::Error;

use crate::entities::OrderStatus;
use crate::identifiers::{AccountId, ClientOrderId, PositionId, TradeId};

/// Errors parsing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Invalid instrument id '{0}', expected SYMBOL.VENUE")]
    InvalidInstrumentId(String),

    #[error("Invalid bar type '{0}'")]
    InvalidBarType(String),
}

/// Errors raised by the order state machine and order construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Invalid state transition: {status:?} cannot apply {event}")]
    InvalidStateTransition {
        status: OrderStatus,
        event: &'static str,
    },

    #[error("Order {0} already initialized")]
    AlreadyInitialized(ClientOrderId),

    #[error("Event for {event} applied to order {order}")]
    MismatchedOrder {
        order: ClientOrderId,
        event: ClientOrderId,
    },

    #[error("Invalid quantity {0}: must be positive")]
    InvalidQuantity(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Duplicate fill {trade_id} for order {client_order_id}")]
    DuplicateFill {
        client_order_id: ClientOrderId,
        trade_id: TradeId,
    },

    #[error("Fill of {last_qty} would overfill order {client_order_id}: filled {filled_qty} of {quantity}")]
    Overfill {
        client_order_id: ClientOrderId,
        quantity: Decimal,
        filled_qty: Decimal,
        last_qty: Decimal,
    },
}

/// Errors applying fills to positions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("Duplicate fill {trade_id} for position {position_id}")]
    DuplicateFill {
        position_id: PositionId,
        trade_id: TradeId,
    },

    #[error("Fill for {fill} applied to position for {position}")]
    InstrumentMismatch { position: String, fill: String },
}

/// Errors applying account states
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account state for {event} applied to account {account}")]
    MismatchedAccount { account: AccountId, event: AccountId },

    #[error("Balance for {0} would become negative")]
    NegativeBalance(String),
}
