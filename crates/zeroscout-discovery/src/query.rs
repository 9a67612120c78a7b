//! Re-query pacing for browsed service types.
//!
//! Each registered type carries an exponential backoff: the first query
//! goes out at registration, the next after the initial interval, doubling
//! up to the cap. An answer that changes the cache resets the backoff so
//! freshly-changed services stay responsive without query storms.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BackoffState {
    /// Display-form type name used when sending.
    name: String,
    interval: Duration,
    next_due: Instant,
    /// Browsers/enumerations sharing this entry.
    subscribers: usize,
}

#[derive(Debug)]
pub struct QuerySchedule {
    initial: Duration,
    max: Duration,
    entries: HashMap<String, BackoffState>,
}

impl QuerySchedule {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            entries: HashMap::new(),
        }
    }

    /// Registers interest in a service type. Returns true when this is the
    /// first subscriber, in which case the caller sends an immediate query.
    pub fn register(&mut self, service_type: &str, now: Instant) -> bool {
        let key = service_type.to_ascii_lowercase();
        if let Some(state) = self.entries.get_mut(&key) {
            state.subscribers += 1;
            return false;
        }
        self.entries.insert(
            key,
            BackoffState {
                name: service_type.to_string(),
                interval: self.initial,
                next_due: now + self.initial,
                subscribers: 1,
            },
        );
        true
    }

    /// Drops one subscription; the entry disappears with its last
    /// subscriber.
    pub fn deregister(&mut self, service_type: &str) {
        let key = service_type.to_ascii_lowercase();
        if let Some(state) = self.entries.get_mut(&key) {
            state.subscribers -= 1;
            if state.subscribers == 0 {
                self.entries.remove(&key);
            }
        }
    }

    /// Returns the types whose re-query is due and advances their backoff.
    pub fn due(&mut self, now: Instant) -> Vec<String> {
        let mut due = Vec::new();
        for state in self.entries.values_mut() {
            if now >= state.next_due {
                due.push(state.name.clone());
                state.interval = (state.interval * 2).min(self.max);
                state.next_due = now + state.interval;
            }
        }
        due
    }

    /// Resets the backoff of a type after a cache-changing answer.
    pub fn reset(&mut self, service_type: &str, now: Instant) {
        let key = service_type.to_ascii_lowercase();
        if let Some(state) = self.entries.get_mut(&key) {
            state.interval = self.initial;
            state.next_due = state.next_due.min(now + self.initial);
        }
    }

    pub fn is_registered(&self, service_type: &str) -> bool {
        self.entries
            .contains_key(&service_type.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPE: &str = "_http._tcp.local.";

    fn schedule() -> QuerySchedule {
        QuerySchedule::new(Duration::from_secs(1), Duration::from_secs(60))
    }

    #[test]
    fn first_registration_requests_immediate_query() {
        let mut sched = schedule();
        let now = Instant::now();
        assert!(sched.register(TYPE, now));
        assert!(!sched.register(TYPE, now));
        assert!(!sched.register(&TYPE.to_ascii_uppercase(), now));
    }

    #[test]
    fn interval_doubles_up_to_the_cap() {
        let mut sched = schedule();
        let start = Instant::now();
        sched.register(TYPE, start);

        let mut now = start;
        let mut intervals = Vec::new();
        for _ in 0..8 {
            // Jump exactly to the next due point.
            now += Duration::from_secs(3600);
            let due = sched.due(now);
            assert_eq!(due, vec![TYPE.to_string()]);
            intervals.push(sched.entries[TYPE].interval);
        }

        let secs: Vec<u64> = intervals.iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![2, 4, 8, 16, 32, 60, 60, 60]);
    }

    #[test]
    fn not_due_before_interval_elapses() {
        let mut sched = schedule();
        let start = Instant::now();
        sched.register(TYPE, start);
        assert!(sched.due(start + Duration::from_millis(500)).is_empty());
        assert_eq!(sched.due(start + Duration::from_secs(1)).len(), 1);
    }

    #[test]
    fn reset_restores_initial_interval() {
        let mut sched = schedule();
        let start = Instant::now();
        sched.register(TYPE, start);

        let mut now = start;
        for _ in 0..5 {
            now += Duration::from_secs(3600);
            sched.due(now);
        }
        assert_eq!(sched.entries[TYPE].interval, Duration::from_secs(32));

        sched.reset(TYPE, now);
        assert_eq!(sched.entries[TYPE].interval, Duration::from_secs(1));
        assert_eq!(sched.due(now + Duration::from_secs(1)).len(), 1);
    }

    #[test]
    fn entry_survives_until_last_subscriber_leaves() {
        let mut sched = schedule();
        let now = Instant::now();
        sched.register(TYPE, now);
        sched.register(TYPE, now);

        sched.deregister(TYPE);
        assert!(sched.is_registered(TYPE));
        sched.deregister(TYPE);
        assert!(!sched.is_registered(TYPE));
    }
}
