//! Button stimulus scripts for the host emulator and scenario tests.
//!
//! A script is a comma (or semicolon) separated list of `level duration`
//! segments, for example `high 15ms, low 60ms` or `press 1s; release 250`.
//! Levels are `high`/`press`/`1` and `low`/`release`/`0` in any case;
//! durations default to milliseconds and accept an `ms` or `s` suffix.
//! After the last segment the button reads as released.

use core::convert::Infallible;
use core::fmt;

use embedded_hal::digital::{ErrorType, InputPin};
use heapless::Vec;
use winnow::ModalResult;
use winnow::ascii::{Caseless, digit1, multispace0, space0, space1};
use winnow::combinator::{alt, eof, opt};
use winnow::prelude::*;
use winnow::token::one_of;

/// Longest script accepted by [`parse`].
pub const MAX_SEGMENTS: usize = 32;

/// Button level held for a fixed duration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Segment {
    /// `true` while pressed.
    pub level: bool,
    pub duration_ms: u32,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Stimulus {
    segments: Vec<Segment, MAX_SEGMENTS>,
    total_ms: u64,
}

impl Stimulus {
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Length of the whole script.
    #[must_use]
    pub const fn total_ms(&self) -> u64 {
        self.total_ms
    }

    /// Level the script asks for `ms` milliseconds after it started.
    #[must_use]
    pub fn level_at(&self, ms: u64) -> bool {
        let mut end = 0u64;
        for segment in &self.segments {
            end += u64::from(segment.duration_ms);
            if ms < end {
                return segment.level;
            }
        }
        false
    }
}

/// Why a script was rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScriptError {
    /// Input did not match the grammar at byte `offset`.
    Syntax { offset: usize },
    TooManySegments,
    ZeroDuration,
    /// A duration does not fit in 32-bit milliseconds.
    Overflow,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Syntax { offset } => write!(f, "syntax error at byte {offset}"),
            ScriptError::TooManySegments => {
                write!(f, "script longer than {MAX_SEGMENTS} segments")
            }
            ScriptError::ZeroDuration => f.write_str("segment duration must be > 0"),
            ScriptError::Overflow => f.write_str("segment duration too large"),
        }
    }
}

/// Parses a stimulus script.
///
/// # Errors
///
/// Returns a [`ScriptError`] for malformed input, empty or oversized
/// durations, or more than [`MAX_SEGMENTS`] segments.
pub fn parse(source: &str) -> Result<Stimulus, ScriptError> {
    let offset = |rest: &str| ScriptError::Syntax {
        offset: source.len() - rest.len(),
    };

    let mut input = source;
    leader.parse_next(&mut input).map_err(|_| offset(source))?;

    let mut stimulus = Stimulus::default();
    loop {
        let start = input;
        let parsed = segment
            .parse_next(&mut input)
            .map_err(|_| offset(start))?
            .resolve()?;
        stimulus
            .segments
            .push(parsed)
            .map_err(|_| ScriptError::TooManySegments)?;
        stimulus.total_ms += u64::from(parsed.duration_ms);

        let before = input;
        if separator.parse_next(&mut input).is_err() {
            input = before;
            break;
        }
    }

    let before = input;
    trailer.parse_next(&mut input).map_err(|_| offset(before))?;
    Ok(stimulus)
}

struct RawSegment<'s> {
    level: bool,
    digits: &'s str,
    scale: u32,
}

impl RawSegment<'_> {
    fn resolve(&self) -> Result<Segment, ScriptError> {
        let value: u32 = self.digits.parse().map_err(|_| ScriptError::Overflow)?;
        let duration_ms = value.checked_mul(self.scale).ok_or(ScriptError::Overflow)?;
        if duration_ms == 0 {
            return Err(ScriptError::ZeroDuration);
        }
        Ok(Segment {
            level: self.level,
            duration_ms,
        })
    }
}

fn segment<'s>(input: &mut &'s str) -> ModalResult<RawSegment<'s>> {
    (level, space1, digit1, opt(unit))
        .map(|(level, _, digits, scale)| RawSegment {
            level,
            digits,
            scale: scale.unwrap_or(1),
        })
        .parse_next(input)
}

fn level(input: &mut &str) -> ModalResult<bool> {
    alt((
        alt((Caseless("high"), Caseless("press"), "1")).value(true),
        alt((Caseless("low"), Caseless("release"), "0")).value(false),
    ))
    .parse_next(input)
}

fn unit(input: &mut &str) -> ModalResult<u32> {
    alt((Caseless("ms").value(1), Caseless("s").value(1_000))).parse_next(input)
}

fn separator(input: &mut &str) -> ModalResult<()> {
    (space0, one_of([',', ';']), multispace0)
        .void()
        .parse_next(input)
}

fn leader(input: &mut &str) -> ModalResult<()> {
    multispace0.void().parse_next(input)
}

fn trailer(input: &mut &str) -> ModalResult<()> {
    (multispace0, eof).void().parse_next(input)
}

/// Plays a [`Stimulus`] as a button input.
///
/// Each read advances the script by one control period. The pin models the
/// board's button against its pull-up: it reads low while the script says
/// pressed, and high (released) once the script has run out.
#[derive(Clone, Debug)]
pub struct StimulusPin {
    stimulus: Stimulus,
    period_ms: u32,
    elapsed_ms: u64,
}

impl StimulusPin {
    #[must_use]
    pub const fn new(stimulus: Stimulus, period_ms: u32) -> Self {
        Self {
            stimulus,
            period_ms,
            elapsed_ms: 0,
        }
    }

    /// Whether every segment has been played.
    #[must_use]
    pub const fn finished(&self) -> bool {
        self.elapsed_ms >= self.stimulus.total_ms
    }

    fn next_pressed(&mut self) -> bool {
        let pressed = self.stimulus.level_at(self.elapsed_ms);
        self.elapsed_ms += u64::from(self.period_ms);
        pressed
    }
}

impl ErrorType for StimulusPin {
    type Error = Infallible;
}

impl InputPin for StimulusPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.next_pressed())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.next_pressed())
    }
}
