//! Drift-free fixed-rate scheduling.
//!
//! Deadlines are always derived from the previous *scheduled* deadline, never
//! from the moment the work finished, so jitter in one iteration does not shift
//! the phase of the next. When the caller falls a whole period (or more)
//! behind, the missed slots are skipped instead of being replayed back to back.

/// Next wake-up computed by [`FixedRateSchedule::advance`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Wake {
    /// Absolute time (µs) the caller should sleep until.
    pub deadline_us: u64,
    /// Whole periods skipped because the caller was late.
    pub missed: u32,
}

/// Grid of deadlines at `start + k * period`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FixedRateSchedule {
    period_us: u64,
    next_us: u64,
}

impl FixedRateSchedule {
    /// Creates a schedule whose first deadline is `start_us + period_us`.
    ///
    /// A zero period is bumped to 1 µs so the grid always advances.
    #[must_use]
    pub const fn new(period_us: u64, start_us: u64) -> Self {
        let period_us = if period_us == 0 { 1 } else { period_us };
        Self {
            period_us,
            next_us: start_us.saturating_add(period_us),
        }
    }

    /// Convenience constructor for millisecond periods.
    #[must_use]
    pub fn from_millis(period_ms: u32, start_us: u64) -> Self {
        Self::new(u64::from(period_ms) * 1_000, start_us)
    }

    #[must_use]
    pub const fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Deadline the next call to [`advance`](Self::advance) is measured against.
    #[must_use]
    pub const fn next_deadline_us(&self) -> u64 {
        self.next_us
    }

    /// Returns the deadline to sleep until and moves the grid forward.
    ///
    /// `now_us` is the current time after the iteration's work has run. If it
    /// is already at or past one full period beyond the pending deadline, every
    /// slot that lies entirely in the past is dropped and reported in `missed`.
    pub fn advance(&mut self, now_us: u64) -> Wake {
        let mut deadline = self.next_us;
        let mut missed = 0;

        if now_us >= deadline.saturating_add(self.period_us) {
            let behind = (now_us - deadline) / self.period_us;
            missed = u32::try_from(behind).unwrap_or(u32::MAX);
            deadline = deadline.saturating_add(behind.saturating_mul(self.period_us));
        }

        self.next_us = deadline.saturating_add(self.period_us);
        Wake {
            deadline_us: deadline,
            missed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_time_iterations_stay_on_the_grid() {
        let mut schedule = FixedRateSchedule::new(1_000, 500);
        let mut now = 500;
        for k in 1..=100u64 {
            // Work takes a variable amount of time but always finishes in slot.
            now += 137 + (k % 7) * 50;
            let wake = schedule.advance(now);
            assert_eq!(wake.deadline_us, 500 + k * 1_000);
            assert_eq!(wake.missed, 0);
            now = wake.deadline_us;
        }
    }

    #[test]
    fn late_by_less_than_a_period_keeps_pending_deadline() {
        let mut schedule = FixedRateSchedule::from_millis(1, 0);
        let wake = schedule.advance(1_900);
        assert_eq!(
            wake,
            Wake {
                deadline_us: 1_000,
                missed: 0
            }
        );
        assert_eq!(schedule.next_deadline_us(), 2_000);
    }

    #[test]
    fn overrun_skips_missed_slots_without_drift() {
        let mut schedule = FixedRateSchedule::new(1_000, 0);
        assert_eq!(schedule.advance(10).deadline_us, 1_000);

        // The iteration that started at 1000 ran until 4300.
        let wake = schedule.advance(4_300);
        assert_eq!(wake.missed, 2);
        assert_eq!(wake.deadline_us, 4_000);

        let wake = schedule.advance(4_010);
        assert_eq!(wake.deadline_us, 5_000);
        assert_eq!(wake.missed, 0);
    }

    #[test]
    fn zero_period_is_clamped() {
        let mut schedule = FixedRateSchedule::new(0, 0);
        assert_eq!(schedule.period_us(), 1);
        assert_eq!(schedule.advance(0).deadline_us, 1);
    }
}
