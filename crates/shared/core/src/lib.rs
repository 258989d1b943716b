//! Tessera Core Domain
//!
//! Pure domain types for the Tessera trading kernel.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! ## Layout
//!
//! - [`identifiers`]: newtype ids (`ClientOrderId`, `InstrumentId`, ...)
//! - [`instruments`]: immutable contract definitions
//! - [`entities`]: orders (with their state machine), positions, accounts
//! - [`events`]: order, position and account events
//! - [`commands`]: trading and data commands, data responses
//! - [`data`]: quotes, trades, bars, book depth
//! - [`reports`]: venue state reports for reconciliation

pub mod commands;
pub mod data;
pub mod entities;
pub mod error;
pub mod events;
pub mod identifiers;
pub mod instruments;
pub mod reports;
#[cfg(any(test, feature = "stubs"))]
pub mod stubs;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    Account, AccountBalance, AccountType, AggressorSide, FeeSchedule, LiquiditySide,
    MarginBalance, OmsType, Order, OrderStatus, OrderType, Position, PositionSide, Side,
    TimeInForce,
};
pub use error::{AccountError, IdentifierError, OrderError, PositionError};
pub use identifiers::{
    AccountId, ClientId, ClientOrderId, InstrumentId, PositionId, StrategyId, TradeId, TraderId,
    Venue, VenueOrderId,
};
pub use instruments::{Instrument, InstrumentKind, InstrumentSpec};
pub use values::{Currency, Money, Price, Quantity, Timestamp};
