//! Low-priority housekeeping loop for core B.
//!
//! Once a second the loop checks that the control loop is still ticking,
//! prints a heartbeat and sends a [`MaintenanceReport`] back to core A. Nothing
//! here is allowed to take the system down: sink failures are counted and the
//! line is skipped, a full report queue just drops the report.

use crate::Tick;
use crate::config::Config;
use crate::handoff::{ControlStatus, ReportPublisher, StatusBoard};
use crate::sink::{LineSink, emit};
use crate::telemetry::on_off;

/// Health summary sent from core B to core A.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MaintenanceReport {
    /// `false` when the control loop has not published or has stopped ticking.
    pub system_ok: bool,
    /// Maintenance tick the report was produced at.
    pub tick: Tick,
    /// Control tick observed on the status board.
    pub control_tick: Option<Tick>,
}

/// Result of one [`MaintenanceLoop::step`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MaintenanceStep {
    Idle,
    Heartbeat(MaintenanceReport),
    /// A halt was requested; the caller should park.
    Halted,
}

/// Milliseconds between two heartbeats.
pub const HEARTBEAT_INTERVAL_MS: u32 = 1_000;

pub struct MaintenanceLoop<'a, L, P = ()> {
    status: &'a StatusBoard,
    sink: L,
    reports: P,
    tick: Tick,
    heartbeat_every: u32,
    until_heartbeat: u32,
    last_control_tick: Option<Tick>,
    skipped_lines: u32,
    dropped_reports: u32,
    halted: bool,
}

impl<'a, L> MaintenanceLoop<'a, L, ()>
where
    L: LineSink,
{
    #[must_use]
    pub fn new(config: &Config, status: &'a StatusBoard, sink: L) -> Self {
        Self {
            status,
            sink,
            reports: (),
            tick: 0,
            heartbeat_every: iterations_per_heartbeat(config.maintenance_period_ms()),
            until_heartbeat: iterations_per_heartbeat(config.maintenance_period_ms()),
            last_control_tick: None,
            skipped_lines: 0,
            dropped_reports: 0,
            halted: false,
        }
    }
}

impl<'a, L, P> MaintenanceLoop<'a, L, P>
where
    L: LineSink,
    P: ReportPublisher,
{
    /// Sends heartbeat reports to `reports` instead of discarding them.
    #[must_use]
    pub fn with_reports<P2: ReportPublisher>(self, reports: P2) -> MaintenanceLoop<'a, L, P2> {
        MaintenanceLoop {
            status: self.status,
            sink: self.sink,
            reports,
            tick: self.tick,
            heartbeat_every: self.heartbeat_every,
            until_heartbeat: self.until_heartbeat,
            last_control_tick: self.last_control_tick,
            skipped_lines: self.skipped_lines,
            dropped_reports: self.dropped_reports,
            halted: self.halted,
        }
    }

    /// Logs the start line. Best effort like every other maintenance line.
    pub fn start(&mut self) {
        let every = self.heartbeat_every;
        self.log(format_args!(
            "core1: maintenance loop started, heartbeat every {every} iterations"
        ));
    }

    /// Runs one iteration. Call once per maintenance period.
    pub fn step(&mut self) -> MaintenanceStep {
        if self.halted || self.status.halt_requested() {
            self.halted = true;
            return MaintenanceStep::Halted;
        }

        self.tick = self.tick.wrapping_add(1);
        self.until_heartbeat -= 1;
        if self.until_heartbeat != 0 {
            return MaintenanceStep::Idle;
        }
        self.until_heartbeat = self.heartbeat_every;

        let snapshot = self.status.snapshot();
        let control_tick = snapshot.map(|status| status.tick);
        let system_ok = match (control_tick, self.last_control_tick) {
            (Some(now), Some(previous)) => now != previous,
            (Some(_), None) => true,
            (None, _) => false,
        };
        self.last_control_tick = control_tick;

        let report = MaintenanceReport {
            system_ok,
            tick: self.tick,
            control_tick,
        };
        self.log_heartbeat(&report, snapshot);

        if !self.reports.try_publish(report) {
            self.dropped_reports = self.dropped_reports.saturating_add(1);
        }

        MaintenanceStep::Heartbeat(report)
    }

    fn log_heartbeat(&mut self, report: &MaintenanceReport, snapshot: Option<ControlStatus>) {
        let skipped = self.skipped_lines;
        match snapshot {
            Some(status) if report.system_ok => self.log(format_args!(
                "core1: heartbeat tick={} core0_tick={} led={} presses={} skipped={}",
                report.tick,
                status.tick,
                on_off(status.output_on),
                status.presses,
                skipped
            )),
            Some(status) => self.log(format_args!(
                "core1: warning core0 stalled at tick {}",
                status.tick
            )),
            None => self.log(format_args!("core1: warning core0 has not started")),
        }
    }

    fn log(&mut self, args: core::fmt::Arguments<'_>) {
        if emit(&mut self.sink, args).is_err() {
            self.skipped_lines = self.skipped_lines.saturating_add(1);
        }
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Lines the sink refused so far.
    #[must_use]
    pub const fn skipped_lines(&self) -> u32 {
        self.skipped_lines
    }

    /// Reports dropped because the queue was full.
    #[must_use]
    pub const fn dropped_reports(&self) -> u32 {
        self.dropped_reports
    }
}

const fn iterations_per_heartbeat(period_ms: u32) -> u32 {
    let every = HEARTBEAT_INTERVAL_MS / period_ms;
    if every == 0 { 1 } else { every }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, BoardId, ConfigParams, PICO1};
    use crate::sink::{Line, SinkError};
    use heapless::Vec;

    #[derive(Default)]
    struct Lines {
        lines: Vec<Line, 16>,
        fail: bool,
    }

    impl LineSink for Lines {
        fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Write);
            }
            let mut copy = Line::new();
            copy.push_str(line).map_err(|_| SinkError::Write)?;
            self.lines.push(copy).map_err(|_| SinkError::Write)
        }
    }

    struct FullQueue;

    impl ReportPublisher for FullQueue {
        fn try_publish(&mut self, _: MaintenanceReport) -> bool {
            false
        }
    }

    fn pico1() -> Config {
        config::load(BoardId::Pico1).unwrap()
    }

    fn run_until_heartbeat<L: LineSink, P: ReportPublisher>(
        maintenance: &mut MaintenanceLoop<'_, L, P>,
    ) -> MaintenanceReport {
        loop {
            match maintenance.step() {
                MaintenanceStep::Idle => {}
                MaintenanceStep::Heartbeat(report) => return report,
                MaintenanceStep::Halted => panic!("unexpected halt"),
            }
        }
    }

    #[test]
    fn heartbeat_interval_follows_period() {
        assert_eq!(iterations_per_heartbeat(100), 10);
        assert_eq!(iterations_per_heartbeat(1), 1_000);
        assert_eq!(iterations_per_heartbeat(2_500), 1);
    }

    #[test]
    fn first_heartbeat_lands_after_one_second() {
        let board = StatusBoard::new();
        board.publish(ControlStatus {
            tick: 1,
            ..ControlStatus::default()
        });
        let mut maintenance = MaintenanceLoop::new(&pico1(), &board, Lines::default());

        for _ in 0..9 {
            assert_eq!(maintenance.step(), MaintenanceStep::Idle);
        }
        let report = run_until_heartbeat(&mut maintenance);
        assert_eq!(report.tick, 10);
        assert!(report.system_ok);
        assert_eq!(report.control_tick, Some(1));
    }

    #[test]
    fn heartbeat_spacing_survives_tick_wrap() {
        let board = StatusBoard::new();
        let mut maintenance = MaintenanceLoop::new(&pico1(), &board, Lines::default());
        maintenance.tick = u32::MAX - 4;

        let first = run_until_heartbeat(&mut maintenance);
        let second = run_until_heartbeat(&mut maintenance);
        assert_eq!(first.tick, 5);
        assert_eq!(second.tick, 15);
    }

    #[test]
    fn unchanged_control_tick_is_reported_as_stall() {
        let board = StatusBoard::new();
        let mut maintenance = MaintenanceLoop::new(&pico1(), &board, Lines::default());

        let report = run_until_heartbeat(&mut maintenance);
        assert!(!report.system_ok, "nothing published yet");

        board.publish(ControlStatus {
            tick: 900,
            ..ControlStatus::default()
        });
        assert!(run_until_heartbeat(&mut maintenance).system_ok);
        assert!(!run_until_heartbeat(&mut maintenance).system_ok);

        for line in &maintenance.sink.lines {
            assert!(line.starts_with("core1: "));
        }
        assert_eq!(
            maintenance.sink.lines[2].as_str(),
            "core1: warning core0 stalled at tick 900"
        );
    }

    #[test]
    fn sink_failures_are_counted_not_fatal() {
        let board = StatusBoard::new();
        let sink = Lines {
            fail: true,
            ..Lines::default()
        };
        let config = Config::new(ConfigParams {
            maintenance_period_ms: 1_000,
            ..PICO1
        })
        .unwrap();
        let mut maintenance = MaintenanceLoop::new(&config, &board, sink);
        maintenance.start();
        let _ = maintenance.step();
        let _ = maintenance.step();
        assert_eq!(maintenance.skipped_lines(), 3);
    }

    #[test]
    fn full_queue_drops_reports() {
        let board = StatusBoard::new();
        let mut maintenance =
            MaintenanceLoop::new(&pico1(), &board, Lines::default()).with_reports(FullQueue);
        run_until_heartbeat(&mut maintenance);
        assert_eq!(maintenance.dropped_reports(), 1);
    }

    #[test]
    fn halt_request_parks_without_logging() {
        let board = StatusBoard::new();
        let mut maintenance = MaintenanceLoop::new(&pico1(), &board, Lines::default());
        board.request_halt();
        for _ in 0..20 {
            assert_eq!(maintenance.step(), MaintenanceStep::Halted);
        }
        assert!(maintenance.sink.lines.is_empty());
        assert_eq!(maintenance.tick(), 0);
    }
}
