//! Compile-time board selection.
//!
//! Exactly one of the `pico1` / `pico2` features picks the [`BoardId`] whose
//! catalog entry is loaded at boot.

use pico_core::config::BoardId;

#[cfg(all(feature = "pico1", feature = "pico2"))]
compile_error!("features `pico1` and `pico2` are mutually exclusive");

#[cfg(not(any(feature = "pico1", feature = "pico2")))]
compile_error!("select a board with `--features pico1` or `--features pico2`");

/// Board this image was built for.
pub const BOARD: BoardId = if cfg!(feature = "pico2") {
    BoardId::Pico2
} else {
    BoardId::Pico1
};

/// Boot ROM image definition required by the RP2350.
#[cfg(all(target_os = "none", feature = "pico2"))]
#[unsafe(link_section = ".start_block")]
#[used]
pub static IMAGE_DEF: embassy_rp::block::ImageDef = embassy_rp::block::ImageDef::secure_exe();
