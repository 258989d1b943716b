//! Tessera Risk Engine
//!
//! Pre-trade checks on every order command before it reaches the
//! execution engine.
//!
//! ```text
//!   Strategy ──TradingCommand──► RiskEngine.execute
//!                                  │ pass              │ fail
//!                                  ▼                   ▼
//!                         ExecEngine.execute   OrderDenied / OrderModifyRejected
//!                                              ──► ExecEngine.process
//! ```
//!
//! ## Checks (submit)
//!
//! | Check              | Denied when                                            |
//! |--------------------|--------------------------------------------------------|
//! | trading state      | `Halted`, or `Reducing` and the order grows the position |
//! | instrument         | not in the cache                                       |
//! | precision          | quantity, price or trigger finer than the instrument   |
//! | quantity           | outside instrument bounds or above `max_order_qty`      |
//! | price band         | price or trigger beyond `price_band_pct` of reference  |
//! | notional           | above `max_notional_per_order` for the instrument      |
//! | reduce-only        | the order would not strictly reduce the position       |
//! | position size      | resulting net position above `max_position_size`       |
//! | rate               | submit throttler exhausted                             |
//!
//! Modifies run the state, quantity and price checks and their own
//! throttler. Cancels are never checked. With `bypass` every command is
//! forwarded unchanged.

pub mod config;
pub mod engine;
pub mod error;

pub use config::{RateLimit, RiskEngineConfig};
pub use engine::{RiskEngine, TradingState};
pub use error::{Result, RiskError};
