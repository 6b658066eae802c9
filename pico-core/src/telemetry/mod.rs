//! Recent control-loop history.
//!
//! The control loop keeps the last [`EVENT_LOG_CAPACITY`] notable events in a
//! fixed ring so a fatal diagnostic (or the emulator on exit) can show what led
//! up to it. Nothing here allocates; old entries are overwritten silently.

use core::fmt;

use heapless::HistoryBuf;

use crate::Tick;
use crate::sink::{LineSink, SinkError, emit};

/// Number of events retained by [`EventLog`].
pub const EVENT_LOG_CAPACITY: usize = 32;

/// What happened at a given tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    /// The debounced button went down.
    Pressed,
    /// The debounced button went up after being held for `held_ms`.
    Released { held_ms: u64 },
    /// The output pin was driven to the given level.
    OutputChanged(bool),
    /// The scheduler skipped `missed` whole periods.
    Overrun(u32),
    /// Core B reported its health.
    MaintenanceReport { system_ok: bool },
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Pressed => f.write_str("pressed"),
            EventKind::Released { held_ms } => write!(f, "released held={held_ms}ms"),
            EventKind::OutputChanged(on) => write!(f, "led {}", on_off(*on)),
            EventKind::Overrun(missed) => write!(f, "overrun missed={missed}"),
            EventKind::MaintenanceReport { system_ok } => {
                write!(f, "core1 {}", if *system_ok { "ok" } else { "stalled" })
            }
        }
    }
}

/// Single entry in the [`EventLog`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlEvent {
    pub tick: Tick,
    pub kind: EventKind,
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}: {}", self.tick, self.kind)
    }
}

/// Fixed-size ring of recent [`ControlEvent`]s.
pub struct EventLog {
    ring: HistoryBuf<ControlEvent, EVENT_LOG_CAPACITY>,
}

impl EventLog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
        }
    }

    /// Appends an event, evicting the oldest once the ring is full.
    pub fn record(&mut self, tick: Tick, kind: EventKind) {
        self.ring.write(ControlEvent { tick, kind });
    }

    /// Iterates retained events in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &ControlEvent> + '_ {
        self.ring.oldest_ordered()
    }

    /// Most recent event, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&ControlEvent> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Writes one `  <event>` line per retained event, oldest first.
    ///
    /// # Errors
    ///
    /// Stops at the first [`SinkError`] and returns it.
    pub fn dump<L>(&self, sink: &mut L) -> Result<(), SinkError>
    where
        L: LineSink + ?Sized,
    {
        for event in self.oldest_first() {
            emit(sink, format_args!("  {event}"))?;
        }
        Ok(())
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) const fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Line;
    use heapless::Vec;

    struct Lines(Vec<Line, 40>);

    impl LineSink for Lines {
        fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
            let mut copy = Line::new();
            copy.push_str(line).map_err(|_| SinkError::Write)?;
            self.0.push(copy).map_err(|_| SinkError::Write)
        }
    }

    #[test]
    fn ring_keeps_only_the_most_recent_events() {
        let mut log = EventLog::new();
        for tick in 0..40 {
            log.record(tick, EventKind::Overrun(1));
        }

        assert_eq!(log.len(), EVENT_LOG_CAPACITY);
        assert_eq!(log.oldest_first().next().map(|e| e.tick), Some(8));
        assert_eq!(log.latest().map(|e| e.tick), Some(39));
    }

    #[test]
    fn dump_renders_events_oldest_first() {
        let mut log = EventLog::new();
        log.record(10, EventKind::Pressed);
        log.record(10, EventKind::OutputChanged(true));
        log.record(65, EventKind::Released { held_ms: 55 });

        let mut lines = Lines(Vec::new());
        log.dump(&mut lines).unwrap();

        let rendered: Vec<&str, 4> = lines.0.iter().map(Line::as_str).collect();
        assert_eq!(
            rendered.as_slice(),
            [
                "  tick 10: pressed",
                "  tick 10: led on",
                "  tick 65: released held=55ms",
            ]
        );
    }

    #[test]
    fn empty_log_dumps_nothing() {
        let log = EventLog::default();
        let mut lines = Lines(Vec::new());
        log.dump(&mut lines).unwrap();
        assert!(log.is_empty());
        assert!(lines.0.is_empty());
    }
}
