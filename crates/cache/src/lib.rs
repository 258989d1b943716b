//! Tessera Cache
//!
//! Single owner of domain state on the core thread: instruments, orders,
//! positions, accounts and the recent market data every engine reads from.
//!
//! ## Architecture
//!
//! ```text
//!  DataEngine ──► quotes/trades/bars ──┐
//!                                      ▼
//!  ExecutionEngine ──► orders ──► ┌──────────────────────────────┐
//!                   positions ──► │            Cache             │ ──► CacheBackend
//!                    accounts ──► │  entities + secondary index  │     (write-through)
//!                                 └──────────────┬───────────────┘
//!                                                │ Rc<RefCell<_>>
//!                         ┌──────────────────────┼───────────────────┐
//!                         ▼                      ▼                   ▼
//!                    Portfolio              accounts::*          RiskEngine
//!               (exposure, P&L, margin)  (balances, locks)    (pre-trade reads)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_cache::{Cache, CacheConfig, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! let mut cache = Cache::new(CacheConfig::default(), Some(Box::new(backend)));
//! cache.add_instrument(instrument)?;
//! cache.add_order(order, None, None)?;
//!
//! let open = cache.orders_open(Some(&venue), None, None, None);
//! ```

pub mod accounts;
pub mod backend;
pub mod cache;
pub mod error;
pub mod portfolio;

pub use accounts::{state_after_fill, state_after_order_change};
pub use backend::InMemoryBackend;
pub use cache::{Cache, CacheConfig};
pub use error::{CacheError, Result};
pub use portfolio::Portfolio;
