use derive_more::derive::{Add, Display, Div, From, Into, Mul, Sub};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd, Default, From, Into, Add, Sub, Mul, Div, Display,
    Serialize, Deserialize,
)]
pub struct DeltaTime(pub f64); // in seconds

#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd, Default, From, Into, Add, Sub, Mul, Div, Display,
    Serialize, Deserialize,
)]
pub struct Time(pub f64); // in seconds

/// Relative slack used when counting steps, so `10.0 / 0.01` gives 1000 and not 999.
const STEP_COUNT_RTOL: f64 = 1e-9;

/// Upper bound on the number of points of a run's time axis.
pub const MAX_STEPS: usize = 10_000_000;

/// Number of intervals `floor(duration / dt)` before any conversion to `usize`.
pub fn interval_count(duration: f64, dt: f64) -> f64 {
    (duration / dt * (1.0 + STEP_COUNT_RTOL)).floor()
}

/// Uniform time axis `t_i = i * dt` for `i in 0..len`.
///
/// Times are computed from the index, never accumulated, so they do not drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    pub dt: DeltaTime,
    pub len: usize,
}

impl TimeAxis {
    /// Axis covering `[0, duration]` with `floor(duration / dt) + 1` points.
    ///
    /// Both values must be positive and finite, with at most
    /// [`MAX_STEPS`] points; `QssConfig::validate` checks this.
    pub fn new(duration: f64, dt: f64) -> Self {
        let steps = interval_count(duration, dt) as usize;
        Self {
            dt: DeltaTime(dt),
            len: steps.saturating_add(1),
        }
    }

    #[inline]
    pub fn at(&self, i: usize) -> Time {
        Time(i as f64 * self.dt.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Time)> + '_ {
        (0..self.len).map(|i| (i, self.at(i)))
    }

    /// Last time on the axis.
    pub fn end(&self) -> Time {
        self.at(self.len.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_axis() {
        let axis = TimeAxis::new(10.0, 0.01);
        assert_eq!(axis.len, 1001);
        assert_eq!(axis.at(0), Time(0.0));
        assert!((axis.end().0 - 10.0).abs() < 1e-12);
        assert!((axis.at(100).0 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_divisible_duration() {
        let axis = TimeAxis::new(1.0, 0.3);
        assert_eq!(axis.len, 4);
        assert!(axis.end().0 <= 1.0);
    }

    #[test]
    fn test_single_step() {
        let axis = TimeAxis::new(0.5, 0.5);
        assert_eq!(axis.len, 2);
        assert_eq!(axis.iter().count(), 2);
    }

    #[test]
    fn test_time_arithmetic() {
        let t = Time(1.0) + Time(0.5);
        assert_eq!(f64::from(t), 1.5);
        assert_eq!(DeltaTime(0.01) * 2.0, DeltaTime(0.02));
    }
}
