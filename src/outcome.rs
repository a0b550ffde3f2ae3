//! Pseudo-random outcome derived from the tail of a session.
//!
//! The six final values are averaged and successive decimal digits of the
//! fractional part pick the direction, the number of full turns and the speed.
//! This is a deterministic hash of sensor noise, not a source of randomness.

use std::fmt;

use crate::error::Result;
use crate::session::Session;

/// Smallest number of full turns
pub const MIN_ROTATIONS: u32 = 2;

/// Divisor turning the speed code into seconds per step
pub const DEFAULT_PERIOD_DIVISOR: f64 = 500.0;

/// Rotation sense of the wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Clockwise => Self::CounterClockwise,
            Self::CounterClockwise => Self::Clockwise,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clockwise => f.write_str("clockwise"),
            Self::CounterClockwise => f.write_str("counter-clockwise"),
        }
    }
}

/// How one session makes the wheel spin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub direction: Direction,
    /// Full turns before stopping, in [2, 11]
    pub rotation_count: u32,
    /// Speed code in [3, 7]; larger is slower
    pub speed_code: u32,
    /// Seconds each coil state is held
    pub step_period: f64,
}

impl Outcome {
    /// Wheel speed in revolutions per second
    pub fn revolutions_per_second(&self, steps_per_turn: u32) -> f64 {
        1.0 / (self.step_period * steps_per_turn as f64)
    }
}

/// Derives an [`Outcome`] from a completed session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeSelector {
    period_divisor: f64,
}

impl OutcomeSelector {
    pub fn new(period_divisor: f64) -> Self {
        Self { period_divisor }
    }

    pub fn select(&self, session: &Session) -> Result<Outcome> {
        let last = session.last_values()?;
        Ok(self.select_from_last(last))
    }

    /// Outcome from the final [linear x, y, z, angular x, y, z] values
    pub fn select_from_last(&self, last: [f64; 6]) -> Outcome {
        let mut sum = 0.0;
        for value in last {
            sum += value;
        }
        let avg = sum / 6.0;

        let frac0 = avg.abs() % 1.0;
        let direction = if (frac0 * 10.0).floor() as u32 % 2 == 0 {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        };

        let frac1 = (frac0 * 10.0).abs() % 1.0;
        let rotation_count = (frac1 * 10.0).floor() as u32 + MIN_ROTATIONS;

        let frac2 = (frac1 * 10.0).abs() % 1.0;
        let mut speed_code = (frac2 * 10.0).floor() as u32 + 3;
        if speed_code > 7 {
            speed_code -= 5;
        }

        Outcome {
            direction,
            rotation_count,
            speed_code,
            step_period: speed_code as f64 / self.period_divisor,
        }
    }
}

impl Default for OutcomeSelector {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD_DIVISOR)
    }
}

/// [`OutcomeSelector::select`] with the default period divisor
pub fn select(session: &Session) -> Result<Outcome> {
    OutcomeSelector::default().select(session)
}
