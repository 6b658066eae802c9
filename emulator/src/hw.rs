//! Host stand-ins for the board: a virtual button and LED, a stdout sink and a
//! thread-backed second core.

use std::convert::Infallible;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use pico_core::error::LaunchError;
use pico_core::handoff::CoreLauncher;
use pico_core::sink::{LineSink, SinkError};

/// Push button wired against a pull-up: the pin reads low while pressed.
#[derive(Clone, Debug, Default)]
pub struct VirtualButton {
    pressed: Arc<AtomicBool>,
}

impl VirtualButton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the button and returns the new state.
    pub fn toggle(&self) -> bool {
        !self.pressed.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Relaxed)
    }
}

impl ErrorType for VirtualButton {
    type Error = Infallible;
}

impl InputPin for VirtualButton {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_pressed())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.is_pressed())
    }
}

/// LED whose state can be observed from other threads.
#[derive(Clone, Debug, Default)]
pub struct VirtualLed {
    on: Arc<AtomicBool>,
}

impl VirtualLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }
}

impl ErrorType for VirtualLed {
    type Error = Infallible;
}

impl OutputPin for VirtualLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.on.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.on.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Writes each line to stdout with `\r\n`, which also renders correctly while
/// the terminal is in raw mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{line}\r\n")
            .and_then(|()| stdout.flush())
            .map_err(|_| SinkError::Write)
    }
}

/// Runs the second core on a named std thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadLauncher;

impl CoreLauncher for ThreadLauncher {
    fn launch<F>(self, entry: F) -> Result<(), LaunchError>
    where
        F: FnOnce() -> Infallible + Send + 'static,
    {
        thread::Builder::new()
            .name("core1".into())
            .spawn(move || run(entry))
            .map(drop)
            .map_err(|_| LaunchError::Spawn)
    }
}

fn run<F: FnOnce() -> Infallible>(entry: F) {
    match entry() {}
}
