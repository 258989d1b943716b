//! Tessera Runner - Backtest Engine and Live Node
//!
//! Both runners build the same [`Kernel`]: one message bus, one cache, the
//! data, risk and execution engines, and a [`tessera_strategy::Trader`].
//! They differ only in where time and data come from.
//!
//! ## Architecture
//!
//! ```text
//!   BacktestEngine                             LiveNode
//!   ┌──────────────────────┐                   ┌──────────────────────┐
//!   │ TestClock            │                   │ LiveClock            │
//!   │ sorted Data stream   │                   │ AdapterMessage mpsc  │
//!   └──────────┬───────────┘                   └──────────┬───────────┘
//!              │                                          │
//!              ▼                                          ▼
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                            Kernel                                │
//!   │  MessageBus ─ Cache ─ DataEngine ─ RiskEngine ─ ExecutionEngine  │
//!   │                         Trader (strategies)                      │
//!   └──────────┬───────────────────────────────────────────┬───────────┘
//!              │                                           │
//!              ▼                                           ▼
//!   SimulatedExchange per venue              Channel clients → adapter tasks
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = BacktestEngine::new(BacktestEngineConfig {
//!     venues: vec![SimulatedVenueConfig::default()],
//!     ..Default::default()
//! })?;
//! engine.add_instrument(instrument)?;
//! engine.add_data(quotes)?;
//! engine.add_strategy(Box::new(MyStrategy::new()))?;
//! let result = engine.run()?;
//! println!("{}", result.events_json()?);
//! ```

pub mod backtest;
pub mod channels;
pub mod config;
pub mod error;
pub mod kernel;
pub mod live;

pub use backtest::{BacktestEngine, BacktestResult};
pub use channels::{AdapterMessage, ChannelDataClient, ChannelExecutionClient};
pub use config::{BacktestEngineConfig, LiveNodeConfig};
pub use error::{BacktestError, LiveNodeError};
pub use kernel::Kernel;
pub use live::LiveNode;
