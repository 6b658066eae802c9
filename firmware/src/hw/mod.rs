//! RP2040/RP2350 hardware adapters.
//!
//! Pins are claimed by the numbers in the loaded [`Config`] rather than by
//! peripheral name, so a board only differs in its catalog entry.

use core::convert::Infallible;

use embassy_rp::Peri;
use embassy_rp::gpio::{AnyPin, Input, Level, Output, Pull};
use embassy_rp::multicore::{Stack, spawn_core1};
use embassy_rp::peripherals::CORE1;
use pico_core::config::Config;
use pico_core::error::LaunchError;
use pico_core::handoff::CoreLauncher;
use static_cell::ConstStaticCell;

const CORE1_STACK_SIZE: usize = 4096;

static CORE1_STACK: ConstStaticCell<Stack<CORE1_STACK_SIZE>> = ConstStaticCell::new(Stack::new());

/// Button and LED pins of the control loop.
pub struct ControlPins {
    pub button: Input<'static>,
    pub led: Output<'static>,
}

impl ControlPins {
    /// Claims the button (pulled up, active low) and the LED (driven low).
    ///
    /// Must be called at most once. `Config` guarantees both numbers are in
    /// range and distinct.
    pub fn claim(config: &Config) -> Self {
        // SAFETY: the pins are taken exactly once here and nothing else in the
        // firmware touches GPIO by number.
        let (button, led) = unsafe {
            (
                AnyPin::steal(config.button_pin()),
                AnyPin::steal(config.led_pin()),
            )
        };
        defmt::info!(
            "hw: button=gpio{} led=gpio{}",
            config.button_pin(),
            config.led_pin()
        );
        Self {
            button: Input::new(button, Pull::Up),
            led: Output::new(led, Level::Low),
        }
    }
}

/// Starts core 1 on a statically allocated stack.
pub struct Core1Launcher {
    core1: Peri<'static, CORE1>,
}

impl Core1Launcher {
    pub fn new(core1: Peri<'static, CORE1>) -> Self {
        Self { core1 }
    }
}

impl CoreLauncher for Core1Launcher {
    fn launch<F>(self, entry: F) -> Result<(), LaunchError>
    where
        F: FnOnce() -> Infallible + Send + 'static,
    {
        let stack = CORE1_STACK.try_take().ok_or(LaunchError::Spawn)?;
        spawn_core1(self.core1, stack, move || match entry() {});
        Ok(())
    }
}
