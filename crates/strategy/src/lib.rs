//! Tessera Strategy Framework
//!
//! Provides the infrastructure for building trading strategies:
//! - [`Strategy`] trait: event hooks that answer with [`Action`]s
//! - [`StrategyContext`]: read access to cache, portfolio and clock
//! - [`OrderFactory`]: deterministic client order ids
//! - [`StrategyRuntime`]: binds a strategy to the bus and engines
//! - [`Trader`]: owns the runtimes and drives their lifecycles
//!
//! ## Architecture
//!
//! ```text
//!   DataEngine ──publish(data.*)──┐        ExecEngine ──publish(events.order.{sid})──┐
//!                                 ▼                                                   ▼
//!                          ┌──────────────────────────────────────────────────────────────┐
//!                          │ StrategyRuntime                                              │
//!                          │   borrow strategy ─► hook(event, ctx) ─► Vec<Action>         │
//!                          │   release borrow  ─► apply actions                           │
//!                          └──────┬───────────────────────┬───────────────────────┬───────┘
//!                                 │ DataCommand            │ TradingCommand        │ timers
//!                                 ▼                        ▼                       ▼
//!                         DataEngine.execute       RiskEngine.execute            Clock
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! struct BuyOnce { config: StrategyConfig, done: bool }
//!
//! impl Strategy for BuyOnce {
//!     fn config(&self) -> &StrategyConfig { &self.config }
//!
//!     fn on_start(&mut self, _ctx: &StrategyContext<'_>) -> Vec<Action> {
//!         vec![Action::Subscribe(DataType::QuoteTicks(instrument_id()))]
//!     }
//!
//!     fn on_quote(&mut self, quote: &QuoteTick, ctx: &StrategyContext<'_>) -> Vec<Action> {
//!         if std::mem::replace(&mut self.done, true) {
//!             return vec![];
//!         }
//!         match ctx.orders().market(quote.instrument_id.clone(), Side::Buy, dec!(1)) {
//!             Ok(order) => vec![Action::submit(order)],
//!             Err(_) => vec![],
//!         }
//!     }
//! }
//! ```

pub mod actions;
pub mod context;
pub mod error;
pub mod order_factory;
pub mod runtime;
pub mod strategy;
pub mod trader;

// Re-export main types
pub use actions::Action;
pub use context::StrategyContext;
pub use error::{Result, StrategyError};
pub use order_factory::{OrderFactory, OrderSpec};
pub use runtime::StrategyRuntime;
pub use strategy::{Strategy, StrategyConfig};
pub use trader::Trader;
