//! Tessera Clock Infrastructure
//!
//! Provides the two [`Clock`] implementations used by the kernel:
//!
//! ```text
//!                   ┌──────────────┐
//!                   │  TimerQueue  │  (name -> next fire time, FIFO on ties)
//!                   └──────┬───────┘
//!              ┌───────────┴───────────┐
//!        ┌─────┴─────┐           ┌─────┴─────┐
//!        │ TestClock │           │ LiveClock │
//!        └───────────┘           └───────────┘
//!   time set by the driver    time = wall clock
//!   (backtest, unit tests)    (live node)
//! ```
//!
//! Neither clock invokes callbacks on its own. The driver asks for due
//! [`TimeEventHandler`]s and runs them on the core thread, which keeps
//! timer delivery deterministic in backtests.
//!
//! ## Usage
//!
//! ```ignore
//! use tessera_clock::TestClock;
//!
//! let clock = TestClock::new(start);
//! clock.set_timer("bars", Duration::minutes(1), None, None, callback)?;
//! for handler in clock.advance_time(start + Duration::minutes(5), true) {
//!     handler.run();
//! }
//! ```

mod live;
mod test_clock;
mod timer;

pub use live::LiveClock;
pub use test_clock::TestClock;

// Re-export the Clock trait for convenience
pub use tessera_ports::{Clock, TimeEvent, TimeEventCallback, TimeEventHandler};
