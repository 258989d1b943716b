//! Tessera Execution Engine
//!
//! Owns the order lifecycle between strategies and venues.
//!
//! ## Architecture
//!
//! ```text
//!   RiskEngine ──TradingCommand──► ExecEngine.execute ──► ExecutionClient (routed)
//!                                                             │
//!                                             OrderEvent / AccountState
//!                                                             ▼
//!   ┌───────────┐ orders/positions/accounts ┌─────────────────────────────┐
//!   │   Cache   │◄──────────────────────────│ ExecEngine.process          │
//!   └───────────┘                           │   └─► Order state machine   │
//!                                           │   └─► Position (OMS id)     │
//!                                           └──────────────┬──────────────┘
//!                                                          │ publish("events.*")
//!                                                          ▼
//!                                                     MessageBus
//! ```
//!
//! ## Position ids
//!
//! | OMS type  | Position id                                                |
//! |-----------|------------------------------------------------------------|
//! | Netting   | `{instrument}-{strategy}`, one per instrument and strategy |
//! | Hedging   | fill's, then order's, then cached, else `{instrument}-{client_order_id}` |
//!
//! A strategy may override its venue's OMS type with
//! [`ExecutionEngine::register_oms_type`].
//!
//! ## Reconciliation
//!
//! On start every client is asked for an [`ExecutionMassStatus`] which is
//! reconciled into the cache before strategies run. See [`reconciliation`].
//!
//! [`ExecutionMassStatus`]: tessera_core::reports::ExecutionMassStatus

pub mod config;
pub mod engine;
pub mod error;
pub mod reconciliation;

pub use config::ExecEngineConfig;
pub use engine::ExecutionEngine;
pub use error::{ExecutionError, Result};
pub use reconciliation::{
    EXTERNAL_STRATEGY, ReconciliationOutcome, ReconciliationReport, calculate_reconciliation_price,
};
