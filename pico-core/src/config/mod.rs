//! Board configuration shared by firmware and host targets.
//!
//! A [`Config`] is resolved once per process from a [`BoardId`] and then handed
//! to both loop entry points by value. Every field is validated up front so the
//! loops never have to re-check ranges at runtime.

use core::fmt;

pub mod boards;

pub use boards::{PICO1, PICO2};

/// Highest user GPIO number on the RP2040/RP2350 package.
pub const MAX_PIN: u8 = 28;

/// Board variants with a known configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardId {
    Pico1,
    Pico2,
}

impl BoardId {
    /// Every supported board, in catalog order.
    pub const ALL: [BoardId; 2] = [BoardId::Pico1, BoardId::Pico2];

    /// Short name used on the command line and in log lines.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            BoardId::Pico1 => "pico1",
            BoardId::Pico2 => "pico2",
        }
    }

    /// Resolves a board from its short name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`UnknownBoard`] when no catalog entry carries that name.
    pub fn from_name(name: &str) -> Result<Self, UnknownBoard> {
        Self::ALL
            .into_iter()
            .find(|board| board.name().eq_ignore_ascii_case(name.trim()))
            .ok_or(UnknownBoard)
    }

    /// Raw, not yet validated parameters for this board.
    #[must_use]
    pub const fn params(self) -> ConfigParams {
        match self {
            BoardId::Pico1 => PICO1,
            BoardId::Pico2 => PICO2,
        }
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raised when a board name does not match any catalog entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnknownBoard;

impl fmt::Display for UnknownBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown board (expected one of: pico1, pico2)")
    }
}

/// Unvalidated configuration record, as written in the board catalog.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConfigParams {
    pub board: BoardId,
    pub led_pin: u8,
    pub button_pin: u8,
    pub control_period_ms: u32,
    pub maintenance_period_ms: u32,
    pub button_debounce_ms: u32,
    pub button_release_delay_ms: u32,
    pub control_log_interval: u32,
}

/// Names of the validated configuration fields.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigField {
    LedPin,
    ButtonPin,
    ControlPeriodMs,
    MaintenancePeriodMs,
    ButtonDebounceMs,
    ButtonReleaseDelayMs,
    ControlLogInterval,
}

impl ConfigField {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ConfigField::LedPin => "led_pin",
            ConfigField::ButtonPin => "button_pin",
            ConfigField::ControlPeriodMs => "control_period_ms",
            ConfigField::MaintenancePeriodMs => "maintenance_period_ms",
            ConfigField::ButtonDebounceMs => "button_debounce_ms",
            ConfigField::ButtonReleaseDelayMs => "button_release_delay_ms",
            ConfigField::ControlLogInterval => "control_log_interval",
        }
    }
}

/// Constraint a field failed to satisfy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Constraint {
    /// Pin number must lie in `0..=max`.
    PinRange { max: u8 },
    /// Value must be strictly positive.
    Positive,
    /// Value must differ from the named field.
    DistinctFrom(ConfigField),
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::PinRange { max } => write!(f, "must be in 0..={max}"),
            Constraint::Positive => f.write_str("must be > 0"),
            Constraint::DistinctFrom(other) => write!(f, "must differ from {}", other.name()),
        }
    }
}

/// First validation failure found while building a [`Config`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigError {
    pub field: ConfigField,
    pub value: u32,
    pub constraint: Constraint,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config {}={} {}",
            self.field.name(),
            self.value,
            self.constraint
        )
    }
}

/// Validated, immutable per-board configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    board: BoardId,
    led_pin: u8,
    button_pin: u8,
    control_period_ms: u32,
    maintenance_period_ms: u32,
    button_debounce_ms: u32,
    button_release_delay_ms: u32,
    control_log_interval: u32,
}

impl Config {
    /// Validates `params` field by field and stops at the first violation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the offending field, its value, and the
    /// constraint it broke.
    pub fn new(params: ConfigParams) -> Result<Self, ConfigError> {
        check_pin(ConfigField::LedPin, params.led_pin)?;
        check_pin(ConfigField::ButtonPin, params.button_pin)?;
        if params.button_pin == params.led_pin {
            return Err(ConfigError {
                field: ConfigField::ButtonPin,
                value: u32::from(params.button_pin),
                constraint: Constraint::DistinctFrom(ConfigField::LedPin),
            });
        }
        check_positive(ConfigField::ControlPeriodMs, params.control_period_ms)?;
        check_positive(ConfigField::MaintenancePeriodMs, params.maintenance_period_ms)?;
        check_positive(ConfigField::ButtonDebounceMs, params.button_debounce_ms)?;
        check_positive(
            ConfigField::ButtonReleaseDelayMs,
            params.button_release_delay_ms,
        )?;
        check_positive(ConfigField::ControlLogInterval, params.control_log_interval)?;

        Ok(Self {
            board: params.board,
            led_pin: params.led_pin,
            button_pin: params.button_pin,
            control_period_ms: params.control_period_ms,
            maintenance_period_ms: params.maintenance_period_ms,
            button_debounce_ms: params.button_debounce_ms,
            button_release_delay_ms: params.button_release_delay_ms,
            control_log_interval: params.control_log_interval,
        })
    }

    #[must_use]
    pub const fn board(&self) -> BoardId {
        self.board
    }

    #[must_use]
    pub const fn led_pin(&self) -> u8 {
        self.led_pin
    }

    #[must_use]
    pub const fn button_pin(&self) -> u8 {
        self.button_pin
    }

    #[must_use]
    pub const fn control_period_ms(&self) -> u32 {
        self.control_period_ms
    }

    #[must_use]
    pub const fn maintenance_period_ms(&self) -> u32 {
        self.maintenance_period_ms
    }

    #[must_use]
    pub const fn button_debounce_ms(&self) -> u32 {
        self.button_debounce_ms
    }

    #[must_use]
    pub const fn button_release_delay_ms(&self) -> u32 {
        self.button_release_delay_ms
    }

    /// Number of control ticks between two status lines.
    #[must_use]
    pub const fn control_log_interval(&self) -> u32 {
        self.control_log_interval
    }
}

/// Resolves and validates the configuration for `board`.
///
/// # Errors
///
/// Propagates the first [`ConfigError`] found in the catalog entry.
pub fn load(board: BoardId) -> Result<Config, ConfigError> {
    Config::new(board.params())
}

fn check_pin(field: ConfigField, pin: u8) -> Result<(), ConfigError> {
    if pin > MAX_PIN {
        return Err(ConfigError {
            field,
            value: u32::from(pin),
            constraint: Constraint::PinRange { max: MAX_PIN },
        });
    }
    Ok(())
}

fn check_positive(field: ConfigField, value: u32) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError {
            field,
            value,
            constraint: Constraint::Positive,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_board_validates() {
        for board in BoardId::ALL {
            let config = load(board).expect("catalog entry should validate");
            assert_eq!(config.board(), board);
        }
    }

    #[test]
    fn board_names_round_trip_case_insensitively() {
        assert_eq!(BoardId::from_name("pico1"), Ok(BoardId::Pico1));
        assert_eq!(BoardId::from_name(" PICO2 "), Ok(BoardId::Pico2));
        assert_eq!(BoardId::from_name("pico3"), Err(UnknownBoard));
    }

    #[test]
    fn led_pin_out_of_range_is_rejected() {
        let params = ConfigParams {
            led_pin: 29,
            ..PICO1
        };
        assert_eq!(
            Config::new(params),
            Err(ConfigError {
                field: ConfigField::LedPin,
                value: 29,
                constraint: Constraint::PinRange { max: MAX_PIN },
            })
        );
    }

    #[test]
    fn led_pin_at_upper_bound_is_accepted() {
        let params = ConfigParams {
            led_pin: 28,
            ..PICO1
        };
        assert_eq!(Config::new(params).map(|c| c.led_pin()), Ok(28));
    }

    #[test]
    fn first_violation_wins() {
        let params = ConfigParams {
            button_pin: 40,
            control_period_ms: 0,
            ..PICO1
        };
        let error = Config::new(params).expect_err("two fields are invalid");
        assert_eq!(error.field, ConfigField::ButtonPin);
    }

    #[test]
    fn shared_pin_is_rejected() {
        let params = ConfigParams {
            button_pin: PICO1.led_pin,
            ..PICO1
        };
        let error = Config::new(params).expect_err("pins collide");
        assert_eq!(error.constraint, Constraint::DistinctFrom(ConfigField::LedPin));
    }

    #[test]
    fn zero_periods_are_rejected() {
        let cases = [
            (
                ConfigParams {
                    maintenance_period_ms: 0,
                    ..PICO2
                },
                ConfigField::MaintenancePeriodMs,
            ),
            (
                ConfigParams {
                    button_release_delay_ms: 0,
                    ..PICO2
                },
                ConfigField::ButtonReleaseDelayMs,
            ),
            (
                ConfigParams {
                    control_log_interval: 0,
                    ..PICO2
                },
                ConfigField::ControlLogInterval,
            ),
        ];

        for (params, field) in cases {
            let error = Config::new(params).expect_err("zero should be rejected");
            assert_eq!(error.field, field);
            assert_eq!(error.constraint, Constraint::Positive);
        }
    }
}
