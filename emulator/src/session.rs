//! One emulator run.
//!
//! Core B runs on a `core1` thread exactly as it does on hardware; core A runs
//! on the calling thread. The button is either driven from the keyboard (space
//! toggles it, `q` or Esc stops) or played from a stimulus script, in which case
//! the run stops once the script and the release delay have elapsed.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use embedded_hal::digital::InputPin;
use pico_core::config::Config;
use pico_core::control::ControlLoop;
use pico_core::error::{FatalError, IoError, LaunchError, report_fatal};
use pico_core::handoff::{CoreLauncher, REPORT_QUEUE_DEPTH, ReportChannel, StatusBoard};
use pico_core::maintenance::{MaintenanceLoop, MaintenanceReport, MaintenanceStep};
use pico_core::script::{Stimulus, StimulusPin};
use pico_core::sink::{SharedSink, emit};
use pico_core::telemetry::EventLog;

use crate::clock::FixedRate;
use crate::hw::{StdoutSink, ThreadLauncher, VirtualButton, VirtualLed};

pub type Console = SharedSink<CriticalSectionRawMutex, StdoutSink>;

pub static CONSOLE: Console = SharedSink::new(StdoutSink);
static STATUS_BOARD: StatusBoard = StatusBoard::new();
static REPORTS: ReportChannel<CriticalSectionRawMutex> = Channel::new();

type Reports = Receiver<'static, CriticalSectionRawMutex, MaintenanceReport, REPORT_QUEUE_DEPTH>;
type EmulatorControl<I> = ControlLoop<'static, I, VirtualLed, &'static Console, Reports>;

/// Where the button level comes from.
pub enum ButtonSource {
    Keyboard,
    Script(Stimulus),
}

#[derive(Debug)]
pub enum SessionError {
    /// Already reported on the console.
    Fatal(FatalError),
    Terminal(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Fatal(error) => write!(f, "{error}"),
            SessionError::Terminal(error) => write!(f, "terminal: {error}"),
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(error: io::Error) -> Self {
        SessionError::Terminal(error)
    }
}

/// Launches core B, runs core A until the input ends and prints the summary.
///
/// # Errors
///
/// Launch and control-loop failures are reported on the console and returned
/// as [`SessionError::Fatal`].
pub fn run(config: &'static Config, source: ButtonSource) -> Result<(), SessionError> {
    if let Err(error) = start_core1(config) {
        return Err(fatal(error.into(), &EventLog::new()));
    }

    let led = VirtualLed::new();
    match source {
        ButtonSource::Keyboard => run_keyboard(config, &led),
        ButtonSource::Script(stimulus) => run_script(config, stimulus, &led),
    }
}

fn run_script(
    config: &'static Config,
    stimulus: Stimulus,
    led: &VirtualLed,
) -> Result<(), SessionError> {
    let total_ticks = script_ticks(config, &stimulus) + u64::from(settle_ticks(config));
    let pin = StimulusPin::new(stimulus, config.control_period_ms());

    let mut control = control_loop(config, pin, led.clone());
    let mut stepped = 0u64;
    drive(&mut control, config, |_| {
        stepped += 1;
        stepped <= total_ticks
    })?;
    finish(&control, led);
    Ok(())
}

fn run_keyboard(config: &'static Config, led: &VirtualLed) -> Result<(), SessionError> {
    let button = VirtualButton::new();
    let quit = Arc::new(AtomicBool::new(false));

    let raw = RawMode::enable()?;
    spawn_keyboard(button.clone(), Arc::clone(&quit))?;
    let _ = emit(
        &mut &CONSOLE,
        format_args!(
            "emulator: board={} space toggles the button, q quits",
            config.board()
        ),
    );

    let mut control = control_loop(config, button, led.clone());
    let result = drive(&mut control, config, |_| !quit.load(Ordering::Relaxed));
    drop(raw);
    result?;
    finish(&control, led);
    Ok(())
}

fn control_loop<I: InputPin>(
    config: &'static Config,
    button: I,
    led: VirtualLed,
) -> EmulatorControl<I> {
    ControlLoop::new(config, button, led, &CONSOLE, &STATUS_BOARD).with_reports(REPORTS.receiver())
}

/// Steps the control loop at its fixed rate while `keep_going` holds.
fn drive<I, F>(
    control: &mut EmulatorControl<I>,
    config: &Config,
    mut keep_going: F,
) -> Result<(), SessionError>
where
    I: InputPin,
    F: FnMut(&EmulatorControl<I>) -> bool,
{
    if let Err(error) = control.start() {
        return Err(halt(control, error));
    }

    let mut rate = FixedRate::from_millis(config.control_period_ms());
    while keep_going(control) {
        if let Err(error) = control.step() {
            return Err(halt(control, error));
        }
        control.record_overrun(rate.wait());
    }

    STATUS_BOARD.request_halt();
    Ok(())
}

fn halt<I: InputPin>(control: &mut EmulatorControl<I>, error: IoError) -> SessionError {
    STATUS_BOARD.request_halt();
    control.force_output_off();
    fatal(error.into(), control.events())
}

fn fatal(error: FatalError, events: &EventLog) -> SessionError {
    let _ = report_fatal(&mut &CONSOLE, &error, events);
    SessionError::Fatal(error)
}

fn finish<I: InputPin>(control: &EmulatorControl<I>, led: &VirtualLed) {
    let mut console = &CONSOLE;
    let _ = emit(
        &mut console,
        format_args!(
            "emulator: stopped at tick {} presses={} overruns={} led={}",
            control.tick(),
            control.presses(),
            control.overruns(),
            if led.is_on() { "on" } else { "off" }
        ),
    );
    let events = control.events();
    if events.is_empty() {
        return;
    }
    let _ = emit(&mut console, format_args!("emulator: last {} events", events.len()));
    let _ = events.dump(&mut console);
}

fn start_core1(config: &'static Config) -> Result<(), LaunchError> {
    ThreadLauncher.launch(move || {
        let mut maintenance =
            MaintenanceLoop::new(config, &STATUS_BOARD, &CONSOLE).with_reports(REPORTS.sender());
        maintenance.start();

        let mut rate = FixedRate::from_millis(config.maintenance_period_ms());
        loop {
            if maintenance.step() == MaintenanceStep::Halted {
                loop {
                    thread::park();
                }
            }
            rate.wait();
        }
    })
}

/// Control ticks needed to play every segment of `stimulus`.
fn script_ticks(config: &Config, stimulus: &Stimulus) -> u64 {
    stimulus
        .total_ms()
        .div_ceil(u64::from(config.control_period_ms()))
}

/// Control ticks to keep running after a script ends so the final release
/// can commit.
fn settle_ticks(config: &Config) -> u32 {
    config
        .button_release_delay_ms()
        .div_ceil(config.control_period_ms())
        .saturating_add(1)
}

fn spawn_keyboard(button: VirtualButton, quit: Arc<AtomicBool>) -> io::Result<()> {
    thread::Builder::new()
        .name("keyboard".into())
        .spawn(move || {
            while !quit.load(Ordering::Relaxed) {
                let Ok(event) = event::read() else {
                    quit.store(true, Ordering::Relaxed);
                    break;
                };
                let Event::Key(key) = event else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char(' ') => {
                        let state = if button.toggle() { "down" } else { "up" };
                        let _ = emit(&mut &CONSOLE, format_args!("emulator: button {state}"));
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        quit.store(true, Ordering::Relaxed);
                    }
                    KeyCode::Char('q') | KeyCode::Esc => quit.store(true, Ordering::Relaxed),
                    _ => {}
                }
            }
        })
        .map(drop)
}

/// Keeps the terminal in raw mode for as long as it is alive.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
