//! Fixed-rate control loop for core A.
//!
//! Every tick the loop samples the button, runs the debouncer, drives the LED
//! according to the [`OutputPolicy`] and publishes a [`ControlStatus`]
//! snapshot for core B. The loop itself never sleeps; the caller paces it with
//! a [`FixedRateSchedule`](crate::schedule::FixedRateSchedule) and reports
//! skipped periods through [`ControlLoop::record_overrun`].
//!
//! Any pin or sink failure is returned as an [`IoError`] and is treated as
//! fatal by the runtime.

use core::fmt;

use embedded_hal::digital::{InputPin, OutputPin};

use crate::Tick;
use crate::config::Config;
use crate::debounce::{ButtonEvent, Debouncer};
use crate::error::IoError;
use crate::handoff::{ControlStatus, ReportSource, StatusBoard};
use crate::maintenance::MaintenanceReport;
use crate::sink::{LineSink, emit};
use crate::telemetry::{EventKind, EventLog, on_off};

/// Electrical level that means "pressed".
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonPolarity {
    /// Button pulls the pin to ground against the internal pull-up.
    #[default]
    ActiveLow,
    ActiveHigh,
}

/// How accepted button events map onto the LED.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputPolicy {
    /// Each accepted press flips the LED; releases are ignored.
    #[default]
    TogglePerPress,
    /// LED follows the debounced button level.
    MirrorPressed,
}

impl fmt::Display for OutputPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputPolicy::TogglePerPress => "toggle",
            OutputPolicy::MirrorPressed => "mirror",
        })
    }
}

/// What a single [`ControlLoop::step`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StepOutcome {
    /// Tick the sample was taken at.
    pub tick: Tick,
    pub event: Option<ButtonEvent>,
    /// Whether this step emitted the periodic status line.
    pub status_logged: bool,
}

pub struct ControlLoop<'a, I, O, L, R = ()> {
    config: Config,
    button: I,
    led: O,
    polarity: ButtonPolarity,
    policy: OutputPolicy,
    sink: L,
    reports: R,
    status: &'a StatusBoard,
    debouncer: Debouncer,
    events: EventLog,
    tick: Tick,
    /// Steps left until the next status line.
    until_status: u32,
    output_on: bool,
    presses: u32,
    overruns: u32,
    last_report: Option<MaintenanceReport>,
}

impl<'a, I, O, L> ControlLoop<'a, I, O, L, ()>
where
    I: InputPin,
    O: OutputPin,
    L: LineSink,
{
    /// Builds a loop with the default polarity and policy and no report queue.
    pub fn new(config: &Config, button: I, led: O, sink: L, status: &'a StatusBoard) -> Self {
        Self {
            config: *config,
            button,
            led,
            polarity: ButtonPolarity::default(),
            policy: OutputPolicy::default(),
            sink,
            reports: (),
            status,
            debouncer: Debouncer::from_config(config),
            events: EventLog::new(),
            tick: 0,
            until_status: config.control_log_interval(),
            output_on: false,
            presses: 0,
            overruns: 0,
            last_report: None,
        }
    }
}

impl<'a, I, O, L, R> ControlLoop<'a, I, O, L, R>
where
    I: InputPin,
    O: OutputPin,
    L: LineSink,
    R: ReportSource,
{
    #[must_use]
    pub fn with_policy(mut self, policy: OutputPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_polarity(mut self, polarity: ButtonPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Drains maintenance reports from `reports` at the start of every step.
    #[must_use]
    pub fn with_reports<R2: ReportSource>(self, reports: R2) -> ControlLoop<'a, I, O, L, R2> {
        ControlLoop {
            config: self.config,
            button: self.button,
            led: self.led,
            polarity: self.polarity,
            policy: self.policy,
            sink: self.sink,
            reports,
            status: self.status,
            debouncer: self.debouncer,
            events: self.events,
            tick: self.tick,
            until_status: self.until_status,
            output_on: self.output_on,
            presses: self.presses,
            overruns: self.overruns,
            last_report: self.last_report,
        }
    }

    /// Drives the LED off and logs the start line.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`] when the LED cannot be driven or the sink fails.
    pub fn start(&mut self) -> Result<(), IoError> {
        self.led
            .set_low()
            .map_err(|_| IoError::write(self.config.led_pin()))?;
        self.output_on = false;
        self.publish();

        emit(
            &mut self.sink,
            format_args!(
                "core0: control loop started board={} period={}ms led=gpio{} button=gpio{} policy={}",
                self.config.board(),
                self.config.control_period_ms(),
                self.config.led_pin(),
                self.config.button_pin(),
                self.policy
            ),
        )?;
        Ok(())
    }

    /// Runs one control iteration.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`] on any pin or sink failure. The loop state is left
    /// as it was at the point of failure.
    pub fn step(&mut self) -> Result<StepOutcome, IoError> {
        self.drain_reports();

        let pressed = self.read_button()?;
        let now = self.tick;
        let event = self.debouncer.sample(pressed, now);
        if let Some(event) = event {
            self.apply(event, now)?;
        }

        self.publish();
        self.tick = self.tick.wrapping_add(1);

        // Counted down rather than derived from `tick`, which wraps.
        self.until_status -= 1;
        let status_logged = self.until_status == 0;
        if status_logged {
            self.until_status = self.config.control_log_interval();
            self.log_status()?;
        }

        Ok(StepOutcome {
            tick: now,
            event,
            status_logged,
        })
    }

    /// Accounts for `missed` periods the scheduler had to skip.
    pub fn record_overrun(&mut self, missed: u32) {
        if missed == 0 {
            return;
        }
        self.overruns = self.overruns.saturating_add(missed);
        self.events.record(self.tick, EventKind::Overrun(missed));
    }

    /// Best-effort attempt to leave the LED off before halting.
    pub fn force_output_off(&mut self) {
        if self.led.set_low().is_ok() && self.output_on {
            self.output_on = false;
            self.events.record(self.tick, EventKind::OutputChanged(false));
        }
    }

    fn read_button(&mut self) -> Result<bool, IoError> {
        let level = match self.polarity {
            ButtonPolarity::ActiveLow => self.button.is_low(),
            ButtonPolarity::ActiveHigh => self.button.is_high(),
        };
        level.map_err(|_| IoError::read(self.config.button_pin()))
    }

    fn apply(&mut self, event: ButtonEvent, now: Tick) -> Result<(), IoError> {
        let target = match (event, self.policy) {
            (ButtonEvent::Pressed, OutputPolicy::TogglePerPress) => !self.output_on,
            (ButtonEvent::Pressed, OutputPolicy::MirrorPressed) => true,
            (ButtonEvent::Released, OutputPolicy::TogglePerPress) => self.output_on,
            (ButtonEvent::Released, OutputPolicy::MirrorPressed) => false,
        };

        match event {
            ButtonEvent::Pressed => {
                self.presses = self.presses.wrapping_add(1);
                self.events.record(now, EventKind::Pressed);
            }
            ButtonEvent::Released => {
                let held_ms = self.debouncer.held_ms().unwrap_or_default();
                self.events.record(now, EventKind::Released { held_ms });
            }
        }

        if target != self.output_on {
            self.drive_led(target)?;
            self.events.record(now, EventKind::OutputChanged(target));
        }

        let led = on_off(self.output_on);
        match event {
            ButtonEvent::Pressed => emit(
                &mut self.sink,
                format_args!("core0: button pressed at tick {now} -> led {led}"),
            )?,
            ButtonEvent::Released => emit(
                &mut self.sink,
                format_args!(
                    "core0: button released at tick {now} after {}ms -> led {led}",
                    self.debouncer.held_ms().unwrap_or_default()
                ),
            )?,
        }
        Ok(())
    }

    fn drive_led(&mut self, on: bool) -> Result<(), IoError> {
        let result = if on {
            self.led.set_high()
        } else {
            self.led.set_low()
        };
        result.map_err(|_| IoError::write(self.config.led_pin()))?;
        self.output_on = on;
        Ok(())
    }

    fn drain_reports(&mut self) {
        let mut latest = None;
        while let Some(report) = self.reports.try_take() {
            latest = Some(report);
        }
        let Some(report) = latest else {
            return;
        };

        let changed = self
            .last_report
            .is_none_or(|previous| previous.system_ok != report.system_ok);
        if changed {
            self.events.record(
                self.tick,
                EventKind::MaintenanceReport {
                    system_ok: report.system_ok,
                },
            );
        }
        self.last_report = Some(report);
    }

    fn publish(&self) {
        self.status.publish(self.status());
    }

    fn log_status(&mut self) -> Result<(), IoError> {
        let core1 = match self.last_report {
            Some(report) if report.system_ok => "ok",
            Some(_) => "stalled",
            None => "unknown",
        };
        let button = if self.debouncer.stable_level() {
            "pressed"
        } else {
            "released"
        };
        emit(
            &mut self.sink,
            format_args!(
                "core0: tick={} led={} button={button} presses={} overruns={} core1={core1}",
                self.tick,
                on_off(self.output_on),
                self.presses,
                self.overruns
            ),
        )?;
        Ok(())
    }

    /// Snapshot of the loop as published to the status board.
    #[must_use]
    pub fn status(&self) -> ControlStatus {
        ControlStatus {
            tick: self.tick,
            output_on: self.output_on,
            pressed: self.debouncer.stable_level(),
            presses: self.presses,
            overruns: self.overruns,
        }
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub const fn output_on(&self) -> bool {
        self.output_on
    }

    #[must_use]
    pub const fn presses(&self) -> u32 {
        self.presses
    }

    #[must_use]
    pub const fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Most recent maintenance report received from core B.
    #[must_use]
    pub const fn last_report(&self) -> Option<MaintenanceReport> {
        self.last_report
    }

    #[must_use]
    pub const fn events(&self) -> &EventLog {
        &self.events
    }
}
