//! Time-based button debouncing.
//!
//! The debouncer is fed one logical "pressed" sample per control tick; pin
//! polarity is resolved by the caller. A change only becomes the new stable
//! state after it has persisted for the press threshold (released to pressed)
//! or the release threshold (pressed to released). Anything shorter is treated
//! as contact bounce and produces no event.

use crate::Tick;
use crate::config::Config;

/// Thresholds the debouncer works with, all in milliseconds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebounceTiming {
    /// Duration of one tick.
    pub period_ms: u32,
    /// How long a press must persist before it is accepted.
    pub press_ms: u32,
    /// How long a release must persist before it is accepted.
    pub release_ms: u32,
}

impl DebounceTiming {
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            period_ms: config.control_period_ms(),
            press_ms: config.button_debounce_ms(),
            release_ms: config.button_release_delay_ms(),
        }
    }

    /// Threshold that applies to a transition towards `level`.
    const fn threshold_ms(&self, level: bool) -> u32 {
        if level { self.press_ms } else { self.release_ms }
    }
}

/// Debouncer state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebounceState {
    /// Raw input agrees with the stable level.
    Idle { level: bool },
    /// Raw input has read `level` since tick `since`, awaiting confirmation.
    Candidate { level: bool, since: Tick },
}

/// Accepted change of the stable button level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    Pressed,
    Released,
}

#[derive(Clone, Debug)]
pub struct Debouncer {
    timing: DebounceTiming,
    state: DebounceState,
    raw_level: bool,
    stable_level: bool,
    pressed_since: Option<Tick>,
    held_ms: Option<u64>,
}

impl Debouncer {
    /// Starts released and idle.
    #[must_use]
    pub const fn new(timing: DebounceTiming) -> Self {
        Self {
            timing,
            state: DebounceState::Idle { level: false },
            raw_level: false,
            stable_level: false,
            pressed_since: None,
            held_ms: None,
        }
    }

    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(DebounceTiming::from_config(config))
    }

    /// Feeds one raw sample taken at `now`.
    ///
    /// Returns an event only on the tick the stable level actually changes.
    pub fn sample(&mut self, raw_level: bool, now: Tick) -> Option<ButtonEvent> {
        self.raw_level = raw_level;

        if raw_level == self.stable_level {
            self.state = DebounceState::Idle {
                level: self.stable_level,
            };
            return None;
        }

        let since = match self.state {
            DebounceState::Candidate { level, since } if level == raw_level => since,
            _ => {
                self.state = DebounceState::Candidate {
                    level: raw_level,
                    since: now,
                };
                return None;
            }
        };

        if self.elapsed_ms(since, now) < u64::from(self.timing.threshold_ms(raw_level)) {
            return None;
        }

        self.stable_level = raw_level;
        self.state = DebounceState::Idle { level: raw_level };
        if raw_level {
            self.pressed_since = Some(now);
            Some(ButtonEvent::Pressed)
        } else {
            let pressed_at = self.pressed_since.take();
            self.held_ms = pressed_at.map(|start| self.elapsed_ms(start, now));
            Some(ButtonEvent::Released)
        }
    }

    fn elapsed_ms(&self, since: Tick, now: Tick) -> u64 {
        u64::from(now.wrapping_sub(since)) * u64::from(self.timing.period_ms)
    }

    #[must_use]
    pub const fn stable_level(&self) -> bool {
        self.stable_level
    }

    /// Last raw sample, before filtering.
    #[must_use]
    pub const fn raw_level(&self) -> bool {
        self.raw_level
    }

    #[must_use]
    pub const fn state(&self) -> DebounceState {
        self.state
    }

    /// Tick at which the current stable press was accepted.
    #[must_use]
    pub const fn pressed_since(&self) -> Option<Tick> {
        self.pressed_since
    }

    /// Length of the most recently completed press, measured between the
    /// accepted press and the accepted release.
    #[must_use]
    pub const fn held_ms(&self) -> Option<u64> {
        self.held_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMING: DebounceTiming = DebounceTiming {
        period_ms: 1,
        press_ms: 10,
        release_ms: 50,
    };

    fn feed(
        debouncer: &mut Debouncer,
        level: bool,
        from: Tick,
        count: u32,
    ) -> Option<(Tick, ButtonEvent)> {
        let mut found = None;
        for offset in 0..count {
            let tick = from.wrapping_add(offset);
            if let Some(event) = debouncer.sample(level, tick) {
                assert!(found.is_none(), "more than one event in a single run");
                found = Some((tick, event));
            }
        }
        found
    }

    #[test]
    fn starts_idle_released() {
        let debouncer = Debouncer::new(TIMING);
        assert_eq!(debouncer.state(), DebounceState::Idle { level: false });
        assert!(!debouncer.stable_level());
        assert_eq!(debouncer.pressed_since(), None);
    }

    #[test]
    fn first_differing_sample_opens_a_candidate() {
        let mut debouncer = Debouncer::new(TIMING);
        assert_eq!(debouncer.sample(true, 3), None);
        assert_eq!(
            debouncer.state(),
            DebounceState::Candidate {
                level: true,
                since: 3
            }
        );
        assert!(debouncer.raw_level());
        assert!(!debouncer.stable_level());
    }

    #[test]
    fn press_commits_exactly_at_threshold() {
        let mut debouncer = Debouncer::new(TIMING);
        assert_eq!(feed(&mut debouncer, true, 0, 10), None);
        assert_eq!(debouncer.sample(true, 10), Some(ButtonEvent::Pressed));
        assert_eq!(debouncer.pressed_since(), Some(10));
        assert_eq!(feed(&mut debouncer, true, 11, 500), None);
    }

    #[test]
    fn bounce_resets_candidate() {
        let mut debouncer = Debouncer::new(TIMING);
        assert_eq!(feed(&mut debouncer, true, 0, 9), None);
        assert_eq!(debouncer.sample(false, 9), None);
        assert_eq!(debouncer.state(), DebounceState::Idle { level: false });
        // A fresh press has to last the full threshold again.
        assert_eq!(
            feed(&mut debouncer, true, 10, 20),
            Some((20, ButtonEvent::Pressed))
        );
    }

    #[test]
    fn release_uses_its_own_threshold_and_reports_hold_time() {
        let mut debouncer = Debouncer::new(TIMING);
        assert_eq!(
            feed(&mut debouncer, true, 0, 15),
            Some((10, ButtonEvent::Pressed))
        );
        assert_eq!(
            feed(&mut debouncer, false, 15, 60),
            Some((65, ButtonEvent::Released))
        );
        assert_eq!(debouncer.held_ms(), Some(55));
        assert_eq!(debouncer.pressed_since(), None);
    }

    #[test]
    fn longer_period_rounds_commit_up_to_next_tick() {
        let mut debouncer = Debouncer::new(DebounceTiming {
            period_ms: 4,
            press_ms: 10,
            release_ms: 50,
        });
        // ceil(10 / 4) = 3 ticks after the candidate opened.
        assert_eq!(
            feed(&mut debouncer, true, 100, 10),
            Some((103, ButtonEvent::Pressed))
        );
    }

    #[test]
    fn debounces_across_tick_wrap() {
        let mut debouncer = Debouncer::new(TIMING);
        let start = u32::MAX - 4;
        assert_eq!(
            feed(&mut debouncer, true, start, 20),
            Some((start.wrapping_add(10), ButtonEvent::Pressed))
        );
        assert_eq!(debouncer.pressed_since(), Some(5));
    }
}
