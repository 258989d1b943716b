//! Tessera Ports
//!
//! Port definitions (traits) for the Tessera trading kernel.
//! These define the boundaries between the engines and infrastructure:
//!
//! - [`Clock`]: current time and timers (real-time and test implementations)
//! - [`DataClient`]: market data adapters
//! - [`ExecutionClient`]: order routing adapters
//! - [`CacheBackend`]: optional write-through persistence for the cache

mod backend;
mod clock;
mod data_client;
mod error;
mod exec_client;

pub use backend::CacheBackend;
pub use clock::{Clock, TimeEvent, TimeEventCallback, TimeEventHandler};
pub use data_client::DataClient;
pub use error::{BackendError, ClientError, ClockError};
pub use exec_client::ExecutionClient;
