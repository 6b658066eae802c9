//! Error types shared by both loops and the startup path.

use core::fmt;

use crate::config::ConfigError;
use crate::sink::{LineSink, SinkError, emit};
use crate::telemetry::EventLog;

/// Operation that failed on a digital pin or the sink.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoOp {
    Read,
    Write,
    Sink,
}

impl IoOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            IoOp::Read => "read",
            IoOp::Write => "write",
            IoOp::Sink => "sink",
        }
    }
}

/// Failure on one of the control loop's I/O paths.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IoError {
    /// GPIO involved, `None` for sink failures.
    pub pin: Option<u8>,
    pub op: IoOp,
}

impl IoError {
    #[must_use]
    pub const fn read(pin: u8) -> Self {
        Self {
            pin: Some(pin),
            op: IoOp::Read,
        }
    }

    #[must_use]
    pub const fn write(pin: u8) -> Self {
        Self {
            pin: Some(pin),
            op: IoOp::Write,
        }
    }

    #[must_use]
    pub const fn sink() -> Self {
        Self {
            pin: None,
            op: IoOp::Sink,
        }
    }
}

impl From<SinkError> for IoError {
    fn from(_: SinkError) -> Self {
        Self::sink()
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pin {
            Some(pin) => write!(f, "gpio{pin} {} failed", self.op.as_str()),
            None => write!(f, "{} failed", self.op.as_str()),
        }
    }
}

/// Second core could not be started.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LaunchError {
    Spawn,
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::Spawn => f.write_str("core1 launch failed"),
        }
    }
}

/// Anything that stops the system.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FatalError {
    Config(ConfigError),
    Io(IoError),
    Launch(LaunchError),
}

impl From<ConfigError> for FatalError {
    fn from(error: ConfigError) -> Self {
        FatalError::Config(error)
    }
}

impl From<IoError> for FatalError {
    fn from(error: IoError) -> Self {
        FatalError::Io(error)
    }
}

impl From<LaunchError> for FatalError {
    fn from(error: LaunchError) -> Self {
        FatalError::Launch(error)
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::Config(error) => write!(f, "{error}"),
            FatalError::Io(error) => write!(f, "{error}"),
            FatalError::Launch(error) => write!(f, "{error}"),
        }
    }
}

/// Writes `fatal: <error>` followed by the recent event history.
///
/// Best effort: the sink may be the thing that failed.
///
/// # Errors
///
/// Returns the first [`SinkError`] hit; nothing after it is written.
pub fn report_fatal<L>(
    sink: &mut L,
    error: &FatalError,
    events: &EventLog,
) -> Result<(), SinkError>
where
    L: LineSink + ?Sized,
{
    emit(sink, format_args!("fatal: {error}"))?;
    if events.is_empty() {
        return Ok(());
    }
    emit(sink, format_args!("recent events ({}):", events.len()))?;
    events.dump(sink)
}
