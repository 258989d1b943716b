use std::cell::RefCell;

use chrono::{Duration, Utc};
use tessera_core::Timestamp;
use tessera_ports::{Clock, ClockError, TimeEventCallback, TimeEventHandler};

use crate::timer::TimerQueue;

/// Wall-clock time for live trading
///
/// Timers are stored here but fired by the live node's event loop, which
/// sleeps until [`LiveClock::next_deadline`] and then drains
/// [`LiveClock::pop_due`] on the core thread.
pub struct LiveClock {
    timers: RefCell<TimerQueue>,
}

impl LiveClock {
    pub fn new() -> Self {
        Self {
            timers: RefCell::new(TimerQueue::default()),
        }
    }

    /// Earliest pending fire time
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.borrow().next_deadline()
    }

    /// Firings due as of now
    pub fn pop_due(&self) -> Vec<TimeEventHandler> {
        let now = Utc::now();
        self.timers.borrow_mut().pop_due(now, now)
    }

    /// Sleep until the next timer is due, or at most `idle`
    pub async fn sleep_until_next(&self, idle: std::time::Duration) {
        let wait = match self.next_deadline() {
            Some(deadline) => (deadline - Utc::now()).to_std().unwrap_or_default().min(idle),
            None => idle,
        };
        tokio::time::sleep(wait).await;
    }
}

impl Default for LiveClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for LiveClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "LiveClock"
    }

    fn set_time_alert(
        &self,
        name: &str,
        alert_time: Timestamp,
        callback: TimeEventCallback,
    ) -> Result<(), ClockError> {
        // Past alerts fire on the next loop iteration
        self.timers.borrow_mut().add_alert(name, alert_time, callback)
    }

    fn set_timer(
        &self,
        name: &str,
        interval: Duration,
        start: Option<Timestamp>,
        stop: Option<Timestamp>,
        callback: TimeEventCallback,
    ) -> Result<(), ClockError> {
        let start = start.unwrap_or_else(Utc::now);
        self.timers
            .borrow_mut()
            .add_timer(name, interval, start, stop, callback)
    }

    fn cancel_timer(&self, name: &str) {
        self.timers.borrow_mut().cancel(name);
    }

    fn cancel_timers(&self) {
        self.timers.borrow_mut().clear();
    }

    fn timer_names(&self) -> Vec<String> {
        self.timers.borrow().names()
    }

    fn next_time(&self, name: &str) -> Option<Timestamp> {
        self.timers.borrow().next_time(name)
    }
}
