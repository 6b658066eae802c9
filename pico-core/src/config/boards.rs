//! Compile-time board catalog.
//!
//! Both boards share the Pico pinout (on-board LED on GPIO25, push button wired
//! to GPIO2 with the internal pull-up) and run the control loop at 1 kHz and the
//! maintenance loop at 10 Hz.

use super::{BoardId, ConfigParams};

/// Raspberry Pi Pico (RP2040).
pub const PICO1: ConfigParams = ConfigParams {
    board: BoardId::Pico1,
    led_pin: 25,
    button_pin: 2,
    control_period_ms: 1,
    maintenance_period_ms: 100,
    button_debounce_ms: 10,
    button_release_delay_ms: 50,
    control_log_interval: 1_000,
};

/// Raspberry Pi Pico 2 (RP2350A).
pub const PICO2: ConfigParams = ConfigParams {
    board: BoardId::Pico2,
    ..PICO1
};
