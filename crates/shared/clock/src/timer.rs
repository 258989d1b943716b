use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::Duration;
use priority_queue::PriorityQueue;
use tessera_core::Timestamp;
use tessera_ports::{ClockError, TimeEvent, TimeEventCallback, TimeEventHandler};

struct Timer {
    interval: Option<Duration>,
    next_time: Timestamp,
    stop_time: Option<Timestamp>,
    callback: TimeEventCallback,
}

/// Timers and alerts ordered by next fire time
///
/// Ties are broken by scheduling order so that two timers due at the same
/// instant always fire in the same sequence.
#[derive(Default)]
pub(crate) struct TimerQueue {
    timers: HashMap<String, Timer>,
    queue: PriorityQueue<String, Reverse<(Timestamp, u64)>>,
    seq: u64,
}

impl TimerQueue {
    pub fn add_alert(
        &mut self,
        name: &str,
        alert_time: Timestamp,
        callback: TimeEventCallback,
    ) -> Result<(), ClockError> {
        self.insert(
            name,
            Timer {
                interval: None,
                next_time: alert_time,
                stop_time: None,
                callback,
            },
        )
    }

    pub fn add_timer(
        &mut self,
        name: &str,
        interval: Duration,
        start: Timestamp,
        stop: Option<Timestamp>,
        callback: TimeEventCallback,
    ) -> Result<(), ClockError> {
        if interval <= Duration::zero() {
            return Err(ClockError::InvalidInterval(name.to_string()));
        }
        self.insert(
            name,
            Timer {
                interval: Some(interval),
                next_time: start + interval,
                stop_time: stop,
                callback,
            },
        )
    }

    fn insert(&mut self, name: &str, timer: Timer) -> Result<(), ClockError> {
        if self.timers.contains_key(name) {
            return Err(ClockError::TimerExists(name.to_string()));
        }
        self.schedule(name.to_string(), timer.next_time);
        self.timers.insert(name.to_string(), timer);
        Ok(())
    }

    fn schedule(&mut self, name: String, at: Timestamp) {
        self.seq += 1;
        self.queue.push(name, Reverse((at, self.seq)));
    }

    pub fn cancel(&mut self, name: &str) -> bool {
        self.queue.remove(name);
        self.timers.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.timers.clear();
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.timers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn next_time(&self, name: &str) -> Option<Timestamp> {
        self.timers.get(name).map(|t| t.next_time)
    }

    /// Earliest fire time across all timers
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.queue.peek().map(|(_, Reverse((at, _)))| *at)
    }

    /// Pop every firing due at or before `to`, rescheduling repeating timers
    pub fn pop_due(&mut self, to: Timestamp, ts_init: Timestamp) -> Vec<TimeEventHandler> {
        let mut fired = Vec::new();
        while let Some(handler) = self.pop_next(to, ts_init) {
            fired.push(handler);
        }
        fired
    }

    /// Pop the earliest firing due at or before `to`
    pub fn pop_next(&mut self, to: Timestamp, ts_init: Timestamp) -> Option<TimeEventHandler> {
        loop {
            let (_, Reverse((at, _))) = self.queue.peek()?;
            if *at > to {
                return None;
            }
            let (name, Reverse((at, _))) = self.queue.pop()?;
            let Some(timer) = self.timers.get_mut(&name) else {
                continue;
            };

            let handler = TimeEventHandler {
                event: TimeEvent {
                    name: name.clone(),
                    ts_event: at,
                    ts_init: ts_init.max(at),
                },
                callback: timer.callback.clone(),
            };

            let next = timer.interval.map(|interval| at + interval);
            match next {
                Some(next) if timer.stop_time.is_none_or(|stop| next <= stop) => {
                    timer.next_time = next;
                    self.schedule(name, next);
                }
                _ => {
                    self.timers.remove(&name);
                }
            }
            return Some(handler);
        }
    }
}
