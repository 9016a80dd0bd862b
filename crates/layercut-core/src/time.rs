use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A timeline interval in seconds, start inclusive and end exclusive.
///
/// Timeline intervals must have positive length. Source intervals are built
/// with [`TimeRange::source`], which also admits empty ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || start >= end {
            return Err(CoreError::InvalidClipInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Build a range of `duration` seconds starting at `start`.
    pub fn starting_at(start: f64, duration: f64) -> Result<Self> {
        Self::new(start, start + duration)
    }

    /// Build a source interval. `start == end` is allowed.
    pub fn source(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || start > end {
            return Err(CoreError::InvalidSourceInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The same length, moved so it starts at `start`.
    pub fn moved_to(&self, start: f64) -> TimeRange {
        TimeRange {
            start,
            end: start + self.duration(),
        }
    }

    pub fn is_valid_timeline(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start < self.end
    }

    pub fn is_valid_source(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start <= self.end
    }
}

/// Clamp `t` into `[0, max]`, mapping NaN to zero.
pub fn clamp_time(t: f64, max: f64) -> f64 {
    if t.is_nan() {
        return 0.0;
    }
    t.clamp(0.0, max.max(0.0))
}
