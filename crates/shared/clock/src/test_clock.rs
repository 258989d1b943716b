use std::cell::{Cell, RefCell};

use chrono::Duration;
use tessera_core::Timestamp;
use tessera_ports::{Clock, ClockError, TimeEventCallback, TimeEventHandler};

use crate::timer::TimerQueue;

/// Manually driven clock for backtests and deterministic tests
///
/// Time only moves through [`TestClock::set_time`] and
/// [`TestClock::advance_time`], never backwards.
pub struct TestClock {
    time: Cell<Timestamp>,
    timers: RefCell<TimerQueue>,
}

impl TestClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            time: Cell::new(start),
            timers: RefCell::new(TimerQueue::default()),
        }
    }

    /// Set the current time; earlier times are ignored
    pub fn set_time(&self, to: Timestamp) {
        if to < self.time.get() {
            log::warn!(
                "TestClock: ignoring attempt to move time backwards ({} -> {})",
                self.time.get(),
                to
            );
            return;
        }
        self.time.set(to);
    }

    /// Collect every timer firing due up to `to`, ordered by fire time
    ///
    /// With `set_time` the clock lands on `to`. The batch is fixed before any
    /// callback runs; drivers whose callbacks reschedule timers step through
    /// [`TestClock::pop_next`] instead.
    pub fn advance_time(&self, to: Timestamp, set_time: bool) -> Vec<TimeEventHandler> {
        let now = self.time.get();
        if to < now {
            log::warn!("TestClock: advance_time to {to} is before now {now}");
            return Vec::new();
        }
        let fired = self.timers.borrow_mut().pop_due(to, now);
        if set_time {
            self.time.set(to);
        }
        fired
    }

    /// Pop the earliest firing due at or before `to`, leaving the time as is
    ///
    /// Callbacks run between calls can schedule or cancel timers inside the
    /// same window, and the next call sees those changes.
    pub fn pop_next(&self, to: Timestamp) -> Option<TimeEventHandler> {
        let now = self.time.get();
        self.timers.borrow_mut().pop_next(to, now)
    }

    /// Rewind to `to` and drop every timer, for re-running a backtest
    pub fn reset(&self, to: Timestamp) {
        self.timers.borrow_mut().clear();
        self.time.set(to);
    }

    /// Earliest pending fire time
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.borrow().next_deadline()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Timestamp {
        self.time.get()
    }

    fn name(&self) -> &str {
        "TestClock"
    }

    fn set_time_alert(
        &self,
        name: &str,
        alert_time: Timestamp,
        callback: TimeEventCallback,
    ) -> Result<(), ClockError> {
        let now = self.time.get();
        if alert_time < now {
            return Err(ClockError::AlertInPast {
                name: name.to_string(),
                alert_time: alert_time.to_string(),
                now: now.to_string(),
            });
        }
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
        let start = start.unwrap_or_else(|| self.time.get());
        self.timers
            .borrow_mut()
            .add_timer(name, interval, start, stop, callback)
    }

    fn cancel_timer(&self, name: &str) {
        if !self.timers.borrow_mut().cancel(name) {
            log::debug!("TestClock: no timer named '{name}' to cancel");
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use tessera_core::stubs::ts;

    fn recorder() -> (Rc<RefCell<Vec<(String, Timestamp)>>>, TimeEventCallback) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let callback: TimeEventCallback = Rc::new(move |event: &tessera_ports::TimeEvent| {
            sink.borrow_mut().push((event.name.clone(), event.ts_event));
        });
        (log, callback)
    }

    #[test]
    fn test_repeating_timer_fires_each_interval() {
        let clock = TestClock::new(ts(0));
        let (log, callback) = recorder();
        clock
            .set_timer("t", Duration::seconds(1), None, None, callback)
            .unwrap();

        for handler in clock.advance_time(ts(3), true) {
            handler.run();
        }

        let fired: Vec<Timestamp> = log.borrow().iter().map(|(_, at)| *at).collect();
        assert_eq!(fired, vec![ts(1), ts(2), ts(3)]);
        assert_eq!(clock.now(), ts(3));
        assert_eq!(clock.next_time("t"), Some(ts(4)));
    }

    #[test]
    fn test_timer_stops_after_stop_time() {
        let clock = TestClock::new(ts(0));
        let (_, callback) = recorder();
        clock
            .set_timer("t", Duration::seconds(2), None, Some(ts(4)), callback)
            .unwrap();

        let fired = clock.advance_time(ts(10), true);
        assert_eq!(fired.len(), 2);
        assert!(clock.timer_names().is_empty());
    }

    #[test]
    fn test_events_interleave_by_time_then_schedule_order() {
        let clock = TestClock::new(ts(0));
        let (log, callback) = recorder();
        clock.set_time_alert("b", ts(2), callback.clone()).unwrap();
        clock.set_time_alert("a", ts(2), callback.clone()).unwrap();
        clock.set_time_alert("c", ts(1), callback).unwrap();

        for handler in clock.advance_time(ts(5), true) {
            handler.run();
        }

        let names: Vec<String> = log.borrow().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_duplicate_and_invalid_timers_rejected() {
        let clock = TestClock::new(ts(10));
        let (_, callback) = recorder();
        clock.set_time_alert("x", ts(11), callback.clone()).unwrap();
        assert_eq!(
            clock.set_time_alert("x", ts(12), callback.clone()),
            Err(ClockError::TimerExists("x".to_string()))
        );
        assert!(matches!(
            clock.set_time_alert("y", ts(5), callback.clone()),
            Err(ClockError::AlertInPast { .. })
        ));
        assert_eq!(
            clock.set_timer("z", Duration::zero(), None, None, callback),
            Err(ClockError::InvalidInterval("z".to_string()))
        );
    }

    #[test]
    fn test_cancel_timer_and_time_never_goes_back() {
        let clock = TestClock::new(ts(0));
        let (_, callback) = recorder();
        clock
            .set_timer("t", Duration::seconds(1), None, None, callback)
            .unwrap();
        clock.cancel_timer("t");
        assert!(clock.advance_time(ts(5), true).is_empty());

        clock.set_time(ts(2));
        assert_eq!(clock.now(), ts(5));
    }

    #[test]
    fn test_reset_rewinds_and_drops_timers() {
        let clock = TestClock::new(ts(0));
        let (_, callback) = recorder();
        clock
            .set_timer("t", Duration::seconds(1), None, None, callback)
            .unwrap();
        clock.set_time(ts(50));

        clock.reset(ts(0));
        assert_eq!(clock.now(), ts(0));
        assert!(clock.timer_names().is_empty());
        assert!(clock.advance_time(ts(10), true).is_empty());
    }

    #[test]
    fn test_pop_next_sees_timers_changed_by_callbacks() {
        let clock = Rc::new(TestClock::new(ts(0)));
        let (log, record) = recorder();
        clock.set_time_alert("doomed", ts(4), record.clone()).unwrap();

        let weak = Rc::downgrade(&clock);
        let inner = record.clone();
        let scheduler: TimeEventCallback = Rc::new(move |event: &tessera_ports::TimeEvent| {
            inner(event);
            if let Some(clock) = weak.upgrade() {
                clock.set_time_alert("follow-up", ts(3), inner.clone()).unwrap();
                clock.cancel_timer("doomed");
            }
        });
        clock.set_time_alert("first", ts(1), scheduler).unwrap();

        while let Some(handler) = clock.pop_next(ts(5)) {
            clock.set_time(handler.event.ts_event);
            handler.run();
        }

        assert_eq!(
            *log.borrow(),
            vec![("first".to_string(), ts(1)), ("follow-up".to_string(), ts(3))]
        );
        assert!(clock.timer_names().is_empty());
    }
}
