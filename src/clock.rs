//! Time source used for `last-modified` bookkeeping.
//!
//! Kept separate from the storage engine so tests can substitute a [`MockClock`] instead of
//! reading the wall clock.

use time::OffsetDateTime;

pub struct Instant(pub u64);

pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Reads the system wall clock via the `time` crate.
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        let now = OffsetDateTime::now_utc();
        (now.unix_timestamp_nanos() / 1_000_000) as u64
    }
}

#[derive(Default)]
pub struct MockClock {
    now: u64,
}

impl Clock for MockClock {
    fn now_millis(&self) -> u64 {
        self.now
    }
}

impl MockClock {
    pub fn new() -> Self {
        Self { now: 0 }
    }

    pub fn set(&mut self, now: u64) {
        self.now = now;
    }
}
