//! Integer-tick simulated time.
//!
//! Arithmetic is checked: overflow is an `InvalidTime` error rather than
//! a silent wrap.

use std::fmt;

use crate::error::{KernelError, KernelResult};

use super::SimTime;

/// A logical tick count in simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTimeLong(i64);

impl SimTimeLong {
    /// The zero-point of simulation time.
    pub const ZERO: SimTimeLong = SimTimeLong(0);

    /// Create a new `SimTimeLong` from a raw tick value.
    #[inline]
    pub fn new(ticks: i64) -> Self {
        SimTimeLong(ticks)
    }

    /// Return the raw tick value.
    #[inline]
    pub fn ticks(self) -> i64 {
        self.0
    }
}

impl From<i64> for SimTimeLong {
    fn from(ticks: i64) -> Self {
        SimTimeLong(ticks)
    }
}

impl fmt::Display for SimTimeLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SimTime for SimTimeLong {
    type Relative = i64;

    fn zero() -> Self {
        SimTimeLong::ZERO
    }

    fn max_value() -> Self {
        SimTimeLong(i64::MAX)
    }

    fn relative_zero() -> i64 {
        0
    }

    fn plus(self, delta: i64) -> KernelResult<Self> {
        self.0
            .checked_add(delta)
            .map(SimTimeLong)
            .ok_or_else(|| KernelError::InvalidTime(format!("{} + {} overflows", self.0, delta)))
    }

    fn minus(self, delta: i64) -> KernelResult<Self> {
        self.0
            .checked_sub(delta)
            .map(SimTimeLong)
            .ok_or_else(|| KernelError::InvalidTime(format!("{} - {} overflows", self.0, delta)))
    }

    fn diff(self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    fn from_units(value: f64) -> KernelResult<Self> {
        units_to_ticks(value).map(SimTimeLong)
    }

    fn relative_from_units(value: f64) -> KernelResult<i64> {
        units_to_ticks(value)
    }

    fn relative_as_units(delta: i64) -> f64 {
        delta as f64
    }
}

/// Truncate a unit-less number to whole ticks.
pub(super) fn units_to_ticks(value: f64) -> KernelResult<i64> {
    if !value.is_finite() {
        return Err(KernelError::InvalidTime(format!("{} is not a finite tick count", value)));
    }
    let truncated = value.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(KernelError::InvalidTime(format!("{} is out of tick range", value)));
    }
    Ok(truncated as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(SimTimeLong::zero().ticks(), 0);
    }

    #[test]
    fn test_ordering() {
        let t1 = SimTimeLong::new(10);
        let t2 = SimTimeLong::new(20);
        assert!(t1 < t2);
    }

    #[test]
    fn test_plus_overflow() {
        let t = SimTimeLong::new(i64::MAX);
        assert!(matches!(t.plus(1), Err(KernelError::InvalidTime(_))));
        assert!(SimTimeLong::new(i64::MIN).minus(1).is_err());
    }

    #[test]
    fn test_diff_antisymmetric() {
        let a = SimTimeLong::new(30);
        let b = SimTimeLong::new(10);
        assert_eq!(a.diff(b), 20);
        assert_eq!(b.diff(a), -20);
    }

    #[test]
    fn test_from_units_truncates() {
        assert_eq!(SimTimeLong::from_units(7.9).unwrap().ticks(), 7);
        assert_eq!(SimTimeLong::from_units(-7.9).unwrap().ticks(), -7);
        assert!(SimTimeLong::from_units(f64::INFINITY).is_err());
        assert!(SimTimeLong::from_units(1e30).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", SimTimeLong::new(42)), "42");
    }
}
