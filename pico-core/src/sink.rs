//! Line-oriented text output shared by both cores.
//!
//! Loops never format straight into a transport. They render one bounded line
//! with [`emit`] and hand it to a [`LineSink`]. [`SharedSink`] wraps any sink in
//! a blocking mutex so that two cores appending at the same time produce whole
//! lines, never a mix of both.

use core::cell::RefCell;
use core::fmt::{self, Write as _};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::String;

/// Longest rendered line (excluding any transport framing). Longer output is
/// truncated.
pub const MAX_LINE_LEN: usize = 96;

/// Bounded line buffer type used by [`emit`].
pub type Line = String<MAX_LINE_LEN>;

/// Failure reported by a sink that could not accept a line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SinkError {
    /// The transport rejected or failed to write the line.
    Write,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Write => f.write_str("sink write failed"),
        }
    }
}

/// Destination for complete log lines. Implementations add their own framing.
pub trait LineSink {
    /// Appends one line. `line` never contains a line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the underlying transport fails.
    fn append_line(&mut self, line: &str) -> Result<(), SinkError>;
}

impl<T> LineSink for &mut T
where
    T: LineSink + ?Sized,
{
    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        (**self).append_line(line)
    }
}

/// Renders `args` into a bounded line and appends it to `sink`.
///
/// # Errors
///
/// Propagates the sink's [`SinkError`].
pub fn emit<L>(sink: &mut L, args: fmt::Arguments<'_>) -> Result<(), SinkError>
where
    L: LineSink + ?Sized,
{
    let line = render(args);
    sink.append_line(line.as_str())
}

/// Formats `args` into a [`Line`], dropping whatever does not fit.
#[must_use]
pub fn render(args: fmt::Arguments<'_>) -> Line {
    let mut writer = Truncating {
        line: Line::new(),
        full: false,
    };
    let _ = writer.write_fmt(args);
    writer.line
}

struct Truncating {
    line: Line,
    full: bool,
}

impl fmt::Write for Truncating {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.full || c == '\n' || c == '\r' {
                continue;
            }
            if self.line.push(c).is_err() {
                self.full = true;
            }
        }
        Ok(())
    }
}

/// Sink that serializes every line behind a blocking mutex.
///
/// With `CriticalSectionRawMutex` on the RP2040/RP2350 the critical section is
/// backed by a hardware spinlock, so the lock holds across both cores.
pub struct SharedSink<M: RawMutex, S> {
    inner: Mutex<M, RefCell<S>>,
}

impl<M: RawMutex, S> SharedSink<M, S> {
    /// Wraps `sink`.
    pub const fn new(sink: S) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(sink)),
        }
    }

    /// Runs `f` with exclusive access to the wrapped sink.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        self.inner.lock(|cell| f(&mut *cell.borrow_mut()))
    }
}

impl<M: RawMutex, S: LineSink> SharedSink<M, S> {
    /// Appends a whole line while holding the lock.
    ///
    /// # Errors
    ///
    /// Propagates the wrapped sink's [`SinkError`].
    pub fn append_line(&self, line: &str) -> Result<(), SinkError> {
        self.with(|sink| sink.append_line(line))
    }
}

impl<M: RawMutex, S: LineSink> LineSink for &SharedSink<M, S> {
    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        SharedSink::append_line(*self, line)
    }
}
