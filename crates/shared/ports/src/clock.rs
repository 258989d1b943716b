use std::rc::Rc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tessera_core::Timestamp;

use crate::error::ClockError;

/// A timer or alert firing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEvent {
    /// Timer name
    pub name: String,
    pub ts_event: Timestamp,
    pub ts_init: Timestamp,
}

/// Callback invoked when a timer fires
pub type TimeEventCallback = Rc<dyn Fn(&TimeEvent)>;

/// A fired event paired with the callback it must be delivered to
#[derive(Clone)]
pub struct TimeEventHandler {
    pub event: TimeEvent,
    pub callback: TimeEventCallback,
}

impl TimeEventHandler {
    pub fn run(&self) {
        (self.callback)(&self.event)
    }
}

impl std::fmt::Debug for TimeEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeEventHandler")
            .field("event", &self.event)
            .finish()
    }
}

/// Port for time abstraction
///
/// This allows the system to use different time sources:
/// - Real system time for live trading
/// - Manually advanced time for backtests and deterministic tests
///
/// Clocks never invoke callbacks themselves; the driver (backtest engine or
/// live node) collects due [`TimeEventHandler`]s and runs them on the core
/// thread after setting the clock to each event's time.
pub trait Clock {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }

    /// Fire `callback` once at `alert_time`
    fn set_time_alert(
        &self,
        name: &str,
        alert_time: Timestamp,
        callback: TimeEventCallback,
    ) -> Result<(), ClockError>;

    /// Fire `callback` every `interval` from `start` (default now) until `stop`
    fn set_timer(
        &self,
        name: &str,
        interval: Duration,
        start: Option<Timestamp>,
        stop: Option<Timestamp>,
        callback: TimeEventCallback,
    ) -> Result<(), ClockError>;

    fn cancel_timer(&self, name: &str);

    fn cancel_timers(&self);

    /// Names of active timers, sorted
    fn timer_names(&self) -> Vec<String>;

    /// Next fire time of a timer
    fn next_time(&self, name: &str) -> Option<Timestamp>;
}
