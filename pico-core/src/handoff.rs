//! Cross-core plumbing: launching the second core and the two one-way
//! channels between the loops.
//!
//! Core A publishes its status through a [`StatusBoard`] (a single-writer
//! seqlock, so the reader never blocks the control loop) and core B sends
//! [`MaintenanceReport`]s back over a small bounded channel.

use core::convert::Infallible;
use core::hint::spin_loop;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use portable_atomic::{AtomicBool, AtomicU32, Ordering, fence};

use crate::Tick;
use crate::error::LaunchError;
use crate::maintenance::MaintenanceReport;

/// Capacity of the maintenance report queue.
pub const REPORT_QUEUE_DEPTH: usize = 2;

/// Maintenance reports travelling from core B to core A.
pub type ReportChannel<M> = Channel<M, MaintenanceReport, REPORT_QUEUE_DEPTH>;

/// Starts the second execution context.
///
/// `launch` consumes the launcher, so a context can be started at most once.
/// Entry points return [`Infallible`]: they can only end by diverging.
pub trait CoreLauncher {
    /// Runs `entry` on the other core (or thread).
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Spawn`] when the context could not be started.
    fn launch<F>(self, entry: F) -> Result<(), LaunchError>
    where
        F: FnOnce() -> Infallible + Send + 'static;
}

/// Snapshot of the control loop, published once per tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlStatus {
    pub tick: Tick,
    pub output_on: bool,
    pub pressed: bool,
    pub presses: u32,
    pub overruns: u32,
}

const FLAG_OUTPUT_ON: u32 = 1 << 0;
const FLAG_PRESSED: u32 = 1 << 1;

/// Latest [`ControlStatus`] plus the halt flag.
///
/// Exactly one context may call [`publish`](Self::publish). Any number may read.
/// A sequence of `0` means nothing was published yet; odd values mark a write
/// in progress.
pub struct StatusBoard {
    seq: AtomicU32,
    tick: AtomicU32,
    flags: AtomicU32,
    presses: AtomicU32,
    overruns: AtomicU32,
    halt: AtomicBool,
}

impl StatusBoard {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            tick: AtomicU32::new(0),
            flags: AtomicU32::new(0),
            presses: AtomicU32::new(0),
            overruns: AtomicU32::new(0),
            halt: AtomicBool::new(false),
        }
    }

    /// Stores a new snapshot. Single writer only.
    pub fn publish(&self, status: ControlStatus) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        let mut flags = 0;
        if status.output_on {
            flags |= FLAG_OUTPUT_ON;
        }
        if status.pressed {
            flags |= FLAG_PRESSED;
        }
        self.tick.store(status.tick, Ordering::Relaxed);
        self.flags.store(flags, Ordering::Relaxed);
        self.presses.store(status.presses, Ordering::Relaxed);
        self.overruns.store(status.overruns, Ordering::Relaxed);

        // Zero is reserved for "never published".
        let next = match seq.wrapping_add(2) {
            0 => 2,
            next => next,
        };
        self.seq.store(next, Ordering::Release);
    }

    /// Returns a consistent copy of the latest snapshot, retrying while a
    /// write is in flight.
    #[must_use]
    pub fn snapshot(&self) -> Option<ControlStatus> {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before == 0 {
                return None;
            }
            if before & 1 == 1 {
                spin_loop();
                continue;
            }

            let tick = self.tick.load(Ordering::Relaxed);
            let flags = self.flags.load(Ordering::Relaxed);
            let presses = self.presses.load(Ordering::Relaxed);
            let overruns = self.overruns.load(Ordering::Relaxed);

            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return Some(ControlStatus {
                    tick,
                    output_on: flags & FLAG_OUTPUT_ON != 0,
                    pressed: flags & FLAG_PRESSED != 0,
                    presses,
                    overruns,
                });
            }
            spin_loop();
        }
    }

    /// Asks every loop to stop touching shared outputs.
    pub fn request_halt(&self) {
        self.halt.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn halt_requested(&self) -> bool {
        self.halt.load(Ordering::Acquire)
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the report queue.
pub trait ReportPublisher {
    /// Queues `report` without waiting. Returns `false` when it was dropped.
    fn try_publish(&mut self, report: MaintenanceReport) -> bool;
}

/// Consumer side of the report queue.
pub trait ReportSource {
    fn try_take(&mut self) -> Option<MaintenanceReport>;
}

impl<M: RawMutex, const N: usize> ReportPublisher for Sender<'_, M, MaintenanceReport, N> {
    fn try_publish(&mut self, report: MaintenanceReport) -> bool {
        self.try_send(report).is_ok()
    }
}

impl<M: RawMutex, const N: usize> ReportSource for Receiver<'_, M, MaintenanceReport, N> {
    fn try_take(&mut self) -> Option<MaintenanceReport> {
        self.try_receive().ok()
    }
}

/// No queue attached; reports are discarded.
impl ReportPublisher for () {
    fn try_publish(&mut self, _: MaintenanceReport) -> bool {
        true
    }
}

/// No queue attached; nothing ever arrives.
impl ReportSource for () {
    fn try_take(&mut self) -> Option<MaintenanceReport> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn empty_board_has_no_snapshot() {
        let board = StatusBoard::new();
        assert_eq!(board.snapshot(), None);
        assert!(!board.halt_requested());
    }

    #[test]
    fn snapshot_returns_last_published_status() {
        let board = StatusBoard::new();
        let status = ControlStatus {
            tick: 1_000,
            output_on: true,
            pressed: false,
            presses: 3,
            overruns: 1,
        };
        board.publish(ControlStatus::default());
        board.publish(status);
        assert_eq!(board.snapshot(), Some(status));
    }

    #[test]
    fn sequence_skips_zero_on_wrap() {
        let board = StatusBoard::new();
        board.seq.store(u32::MAX - 1, Ordering::Relaxed);
        board.publish(ControlStatus {
            tick: 7,
            ..ControlStatus::default()
        });
        assert_eq!(board.seq.load(Ordering::Relaxed), 2);
        assert_eq!(board.snapshot().map(|s| s.tick), Some(7));
    }

    #[test]
    fn halt_request_is_sticky() {
        let board = StatusBoard::new();
        board.request_halt();
        assert!(board.halt_requested());
        assert!(board.halt_requested());
    }

    #[test]
    fn report_channel_drops_when_full() {
        let channel: ReportChannel<NoopRawMutex> = Channel::new();
        let mut sender = channel.sender();
        let mut receiver = channel.receiver();
        let report = MaintenanceReport {
            system_ok: true,
            tick: 10,
            control_tick: Some(1_000),
        };

        assert!(sender.try_publish(report));
        assert!(sender.try_publish(report));
        assert!(!sender.try_publish(report));
        assert_eq!(receiver.try_take(), Some(report));
        assert_eq!(receiver.try_take(), Some(report));
        assert_eq!(receiver.try_take(), None);
    }
}
