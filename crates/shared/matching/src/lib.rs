//! Tessera Matching
//!
//! Simulated venue matching for backtests: one [`OrderMatchingEngine`] per
//! instrument, matching working orders against an L1 view of the market.
//!
//! ## Per-update sequence
//!
//! ```text
//!   quote / trade / bar / depth
//!            │
//!            ▼
//!   update L1 (bid, ask, last, sizes)
//!            │
//!            ▼
//!   1. expire GTD / DAY orders
//!   2. trigger stops ──────────────► is_stop_filled()   (stop-market)
//!   3. fill marketable limits ─────► is_limit_filled()  (only at the touch)
//!            │
//!            ▼
//!   taker fills ───────────────────► is_slipped()       (one increment worse)
//!            │
//!            ▼
//!   FeeModel commission, OrderFilled
//! ```
//!
//! ## Fill prices
//!
//! | Fill                        | Price                        | Liquidity |
//! |-----------------------------|------------------------------|-----------|
//! | Market / marketable limit   | opposite touch (± slippage)  | Taker     |
//! | Triggered stop-market       | opposite touch (± slippage)  | Taker     |
//! | Resting limit crossed       | the order's limit price      | Maker     |
//!
//! The [`FillModel`] owns an explicitly seeded generator, so identical
//! seeds and input produce identical event streams.

mod config;
mod engine;
mod error;
mod fee_model;
mod fill_model;

pub use config::MatchingEngineConfig;
pub use engine::OrderMatchingEngine;
pub use error::{MatchingError, Result};
pub use fee_model::FeeModel;
pub use fill_model::{FillModel, FillModelConfig};
