//! Tessera Data Engine
//!
//! Sits between data clients and everything that consumes market data.
//!
//! ## Architecture
//!
//! ```text
//!   Strategy ──DataCommand──► DataEngine.execute ──► DataClient (routed)
//!                                                        │
//!                                      Data / DataResponse
//!                                                        ▼
//!   ┌───────────┐  add_*   ┌───────────────────────────────────────┐
//!   │   Cache   │◄─────────│ DataEngine.process / .response        │
//!   └───────────┘          │   └─► BarAggregator (internal bars)   │
//!                          └──────────────────┬────────────────────┘
//!                                             │ publish("data.*")
//!                                             ▼
//!                                        MessageBus
//! ```
//!
//! ## Client routing
//!
//! | Command carries      | Client used                        |
//! |----------------------|------------------------------------|
//! | `client_id`          | exactly that client, else error    |
//! | venue of data type   | client registered for that venue   |
//! | neither resolves     | default client, else error         |
//!
//! ## Internal bars
//!
//! Bar types with `AggregationSource::Internal` never reach a client. The
//! engine subscribes the underlying quotes (bid/ask/mid bars) or trades
//! (last bars) and builds bars itself. Time bars additionally run on a clock
//! timer aligned to the epoch so empty intervals still close on time.

pub mod aggregation;
pub mod config;
pub mod engine;
pub mod error;

pub use aggregation::{
    BarAggregator, BarBuilder, TickBarAggregator, TimeBarAggregator, ValueBarAggregator,
    VolumeBarAggregator, create_aggregator,
};
pub use config::DataEngineConfig;
pub use engine::DataEngine;
pub use error::{DataEngineError, Result};
