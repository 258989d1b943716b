//! Tessera Common
//!
//! Infrastructure shared by every engine in the kernel:
//! - [`msgbus`]: in-process message bus (pub/sub, point-to-point, request/response)
//! - [`component`]: lifecycle state machine implemented by every long-lived subsystem
//! - [`throttler`]: sliding-window rate limiter
//! - [`retry`]: bounded fixed-backoff retry for adapters
//! - [`logging`]: `env_logger` initialisation
//!
//! ## Architecture
//!
//! ```text
//!   Strategy ──send──► RiskEngine.execute ──► ExecEngine.execute ──► ExecutionClient
//!      ▲                                                                  │
//!      │ subscribe("events.order.*")                                     │
//!      │                                                                  ▼
//!   ┌──┴──────────────┐    publish(topic)    ┌───────────────────┐  send  (adapter)
//!   │   MessageBus    │◄─────────────────────│ ExecEngine.process│◄────────┘
//!   └─────────────────┘                      └───────────────────┘
//! ```
//!
//! Delivery is synchronous and single-threaded. Adapters living on other
//! tasks marshal their output onto the core thread before it reaches the bus.

pub mod component;
pub mod error;
pub mod logging;
pub mod msgbus;
pub mod retry;
pub mod throttler;

// Re-export commonly used types
pub use component::{Component, ComponentCore, ComponentState, ComponentTrigger};
pub use error::{BusError, ComponentError, RetryError};
pub use logging::{LoggingConfig, init_logging};
pub use msgbus::{
    Endpoints, Message, MessageBus, MessageHandler, Topics, handler::ResponseCallback,
    matching::is_matching,
};
pub use retry::{RetryConfig, RetryManager, RetryableError};
pub use throttler::Throttler;
