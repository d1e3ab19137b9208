//! Staggered nightly start times.

use chrono::{NaiveTime, TimeDelta};

/// Yields successive start times, `stagger_secs` apart, wrapping at midnight.
#[derive(Debug, Clone)]
pub struct StaggeredClock {
    next: NaiveTime,
    stagger: TimeDelta,
}

impl StaggeredClock {
    pub fn new(start: NaiveTime, stagger_secs: u64) -> Self {
        // Anything beyond a day wraps around anyway.
        let secs = (stagger_secs % 86_400) as i64;
        Self {
            next: start,
            stagger: TimeDelta::seconds(secs),
        }
    }
}

impl Iterator for StaggeredClock {
    type Item = NaiveTime;

    fn next(&mut self) -> Option<NaiveTime> {
        let current = self.next;
        self.next = current + self.stagger;
        Some(current)
    }
}
