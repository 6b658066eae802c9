#![no_std]

// Portable runtime logic for the dual-core Pico template.
//
// Everything here builds for both the RP2040/RP2350 firmware and the host
// emulator, so the crate avoids the standard library and talks to hardware only
// through `embedded-hal` traits and the small seams defined in `handoff` and
// `sink`.

pub mod config;
pub mod control;
pub mod debounce;
pub mod error;
pub mod handoff;
pub mod maintenance;
pub mod schedule;
pub mod script;
pub mod sink;
pub mod telemetry;

/// Per-loop iteration counter. Wraps after `u32::MAX` iterations; every tick
/// difference in the crate uses wrapping arithmetic.
pub type Tick = u32;
