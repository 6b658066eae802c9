//! Fixed-rate pacing on top of `std::time`.

use std::thread;
use std::time::{Duration, Instant};

use pico_core::schedule::FixedRateSchedule;

/// Sleeps a thread on a [`FixedRateSchedule`] anchored at creation time.
pub struct FixedRate {
    origin: Instant,
    schedule: FixedRateSchedule,
}

impl FixedRate {
    pub fn from_millis(period_ms: u32) -> Self {
        Self {
            origin: Instant::now(),
            schedule: FixedRateSchedule::from_millis(period_ms, 0),
        }
    }

    /// Microseconds since the schedule was created.
    pub fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    /// Blocks until the next slot and returns how many slots were skipped.
    pub fn wait(&mut self) -> u32 {
        let wake = self.schedule.advance(self.now_us());
        let now = self.now_us();
        if wake.deadline_us > now {
            thread::sleep(Duration::from_micros(wake.deadline_us - now));
        }
        wake.missed
    }
}
