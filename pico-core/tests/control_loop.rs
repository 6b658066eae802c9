use std::cell::Cell;
use std::convert::Infallible;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use pico_core::config::{self, BoardId, Config, ConfigParams, PICO1};
use pico_core::control::{ControlLoop, OutputPolicy};
use pico_core::debounce::ButtonEvent;
use pico_core::error::{FatalError, IoError, report_fatal};
use pico_core::handoff::{ReportChannel, StatusBoard};
use pico_core::maintenance::{MaintenanceLoop, MaintenanceReport, MaintenanceStep};
use pico_core::script::{self, StimulusPin};
use pico_core::sink::{LineSink, SinkError};
use pico_core::telemetry::EventKind;

#[derive(Default)]
struct Recorder {
    lines: Vec<String>,
}

impl LineSink for Recorder {
    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        self.lines.push(line.to_owned());
        Ok(())
    }
}

struct Led<'c>(&'c Cell<bool>);

impl ErrorType for Led<'_> {
    type Error = Infallible;
}

impl OutputPin for Led<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set(true);
        Ok(())
    }
}

struct BrokenLed;

impl ErrorType for BrokenLed {
    type Error = ErrorKind;
}

impl OutputPin for BrokenLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Err(ErrorKind::Other)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Err(ErrorKind::Other)
    }
}

fn stimulus(config: &Config, source: &str) -> StimulusPin {
    StimulusPin::new(
        script::parse(source).expect("script should parse"),
        config.control_period_ms(),
    )
}

#[test]
fn scripted_press_toggles_led_and_logs_events() {
    let config = config::load(BoardId::Pico1).unwrap();
    let board = StatusBoard::new();
    let led = Cell::new(true);
    let mut recorder = Recorder::default();

    let mut control = ControlLoop::new(
        &config,
        stimulus(&config, "high 15ms, low 60ms"),
        Led(&led),
        &mut recorder,
        &board,
    );
    control.start().unwrap();
    assert!(!led.get());

    let mut events = Vec::new();
    for _ in 0..100 {
        let outcome = control.step().unwrap();
        if let Some(event) = outcome.event {
            events.push((outcome.tick, event));
        }
    }

    assert_eq!(
        events,
        vec![(10, ButtonEvent::Pressed), (65, ButtonEvent::Released)]
    );
    assert!(led.get(), "toggle policy ignores the release");
    assert_eq!(control.presses(), 1);
    let kinds: Vec<EventKind> = control.events().oldest_first().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Pressed,
            EventKind::OutputChanged(true),
            EventKind::Released { held_ms: 55 },
        ]
    );

    drop(control);
    assert_eq!(
        &recorder.lines[1..],
        [
            "core0: button pressed at tick 10 -> led on",
            "core0: button released at tick 65 after 55ms -> led on",
        ]
    );
}

#[test]
fn two_presses_toggle_back_off() {
    let config = config::load(BoardId::Pico1).unwrap();
    let board = StatusBoard::new();
    let led = Cell::new(false);
    let mut control = ControlLoop::new(
        &config,
        stimulus(&config, "high 20, low 80, high 20"),
        Led(&led),
        Recorder::default(),
        &board,
    );

    for _ in 0..200 {
        control.step().unwrap();
    }
    assert!(!led.get());
    assert_eq!(control.presses(), 2);
    assert_eq!(board.snapshot().map(|s| s.presses), Some(2));
}

#[test]
fn mirror_policy_tracks_debounced_level() {
    let config = config::load(BoardId::Pico1).unwrap();
    let board = StatusBoard::new();
    let led = Cell::new(false);
    let mut control = ControlLoop::new(
        &config,
        stimulus(&config, "high 40, low 100"),
        Led(&led),
        Recorder::default(),
        &board,
    )
    .with_policy(OutputPolicy::MirrorPressed);

    let mut samples = Vec::new();
    for _ in 0..140 {
        let outcome = control.step().unwrap();
        samples.push((outcome.tick, led.get()));
    }
    assert_eq!(samples[9], (9, false));
    assert_eq!(samples[10], (10, true));
    assert_eq!(samples[89], (89, true));
    assert_eq!(samples[90], (90, false));
}

#[test]
fn status_line_every_log_interval() {
    let config = Config::new(ConfigParams {
        control_log_interval: 250,
        ..PICO1
    })
    .unwrap();
    let board = StatusBoard::new();
    let led = Cell::new(false);
    let mut recorder = Recorder::default();
    let mut control = ControlLoop::new(
        &config,
        stimulus(&config, "low 1"),
        Led(&led),
        &mut recorder,
        &board,
    );

    let mut logged_at = Vec::new();
    for _ in 0..1_000 {
        let outcome = control.step().unwrap();
        if outcome.status_logged {
            logged_at.push(outcome.tick);
        }
    }
    assert_eq!(logged_at, vec![249, 499, 749, 999]);

    drop(control);
    assert_eq!(recorder.lines.len(), 4);
    assert_eq!(
        recorder.lines[3],
        "core0: tick=1000 led=off button=released presses=0 overruns=0 core1=unknown"
    );
}

#[test]
fn maintenance_reports_reach_the_control_loop() {
    let config = config::load(BoardId::Pico1).unwrap();
    let board = StatusBoard::new();
    let channel: ReportChannel<NoopRawMutex> = Channel::new();
    let led = Cell::new(false);

    let mut control = ControlLoop::new(
        &config,
        stimulus(&config, "low 1"),
        Led(&led),
        Recorder::default(),
        &board,
    )
    .with_reports(channel.receiver());
    let mut maintenance =
        MaintenanceLoop::new(&config, &board, Recorder::default()).with_reports(channel.sender());

    let ratio = config.maintenance_period_ms() / config.control_period_ms();
    let mut heartbeats = Vec::new();
    for tick in 1..=2_000u32 {
        control.step().unwrap();
        if tick % ratio != 0 {
            continue;
        }
        if let MaintenanceStep::Heartbeat(report) = maintenance.step() {
            heartbeats.push(report);
        }
    }

    // Pick up the report sent after the last iteration.
    control.step().unwrap();

    assert_eq!(heartbeats.len(), 2);
    assert!(heartbeats.iter().all(|report| report.system_ok));
    assert_eq!(
        control.last_report(),
        Some(MaintenanceReport {
            system_ok: true,
            tick: 20,
            control_tick: Some(1_999),
        })
    );
    // Repeated healthy reports are recorded once.
    let recorded = control
        .events()
        .oldest_first()
        .filter(|event| matches!(event.kind, EventKind::MaintenanceReport { .. }))
        .count();
    assert_eq!(recorded, 1);
}

#[test]
fn led_failure_is_fatal_and_reported_with_history() {
    let config = config::load(BoardId::Pico1).unwrap();
    let board = StatusBoard::new();
    let mut control = ControlLoop::new(
        &config,
        stimulus(&config, "low 1"),
        BrokenLed,
        Recorder::default(),
        &board,
    );

    let error = control.start().unwrap_err();
    assert_eq!(error, IoError::write(25));

    control.record_overrun(2);
    board.request_halt();
    control.force_output_off();

    let mut report = Recorder::default();
    report_fatal(&mut report, &FatalError::from(error), control.events()).unwrap();
    assert_eq!(
        report.lines,
        [
            "fatal: gpio25 write failed",
            "recent events (1):",
            "  tick 0: overrun missed=2",
        ]
    );
    assert!(board.halt_requested());
}
