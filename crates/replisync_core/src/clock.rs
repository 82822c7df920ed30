//! Clocks that stamp record mutations and pull cursors.

use crate::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Source of server timestamps.
///
/// Implementations must be strictly monotonic: every call returns a value
/// greater than any value returned before it. The delta reader relies on this
/// to hand out cursors that no committed mutation can share.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Wall clock with millisecond resolution, nudged forward when two calls land
/// in the same millisecond or the system clock steps backwards.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    /// Creates a new system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn wall_millis() -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = Self::wall_millis();
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Timestamp::from_millis(next),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Deterministic clock for tests.
///
/// Each call to [`Clock::now`] returns the current value and then advances it
/// by one millisecond. [`ManualClock::advance`] skips ahead.
#[derive(Debug)]
pub struct ManualClock {
    current: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at the given timestamp.
    #[must_use]
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            current: AtomicU64::new(start.as_millis()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, millis: u64) {
        self.current.fetch_add(millis, Ordering::SeqCst);
    }

    /// Returns the value the next call to `now` will produce.
    #[must_use]
    pub fn peek(&self) -> Timestamp {
        Timestamp::from_millis(self.current.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Timestamp::from_millis(1_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.current.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn system_clock_is_strictly_monotonic() {
        let clock = SystemClock::new();
        let mut last = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn system_clock_monotonic_across_threads() {
        let clock = Arc::new(SystemClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..250).map(|_| clock.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn system_clock_tracks_wall_time() {
        let before = SystemClock::wall_millis();
        let now = SystemClock::new().now().as_millis();
        assert!(now >= before);
        assert!(now < u64::MAX);
    }

    #[test]
    fn manual_clock_ticks() {
        let clock = ManualClock::starting_at(Timestamp::from_millis(10));
        assert_eq!(clock.now(), Timestamp::from_millis(10));
        assert_eq!(clock.now(), Timestamp::from_millis(11));
        clock.advance(100);
        assert_eq!(clock.peek(), Timestamp::from_millis(112));
    }
}
