//! Tessera Exchange Simulator
//!
//! A simulated venue for backtests, plus the data and execution clients that
//! plug it into the engines exactly like a live adapter would.
//!
//! ## Architecture
//!
//! ```text
//!   ExecEngine ──submit/cancel/modify──► BacktestExecutionClient
//!       ▲                                   │ OrderSubmitted (immediate)
//!       │                                   ▼
//!       │                         SimulatedExchange.send ──► command queue
//!       │                                                        │ settle()
//!       │                                                        ▼
//!       │  ExecEngine.process                     OrderMatchingEngine (per instrument)
//!       └────────────────────────────────────────────────────────┘
//!                                                        ▲
//!   market data ──────────── process_data() ─────────────┘
//! ```
//!
//! ## Layers
//!
//! | Layer            | Types                                              |
//! |------------------|----------------------------------------------------|
//! | application      | [`SimulatedExchange`]                              |
//! | infrastructure   | [`BacktestExecutionClient`], [`BacktestDataClient`] |
//! | configuration    | [`SimulatedVenueConfig`]                           |

// Application layer
pub mod application;

// Infrastructure layer
pub mod infrastructure;

// Cross-cutting concerns
pub mod config;
pub mod error;

pub use application::SimulatedExchange;
pub use config::SimulatedVenueConfig;
pub use error::{ExchangeError, Result};
pub use infrastructure::{BacktestDataClient, BacktestExecutionClient};
