//! Simulated time for the scheduling kernel.
//!
//! The kernel never assumes a concrete numeric type for "now". Every
//! representation implements [`SimTime`]: a totally ordered, `Copy`
//! absolute time with an associated *relative* type used for delays.
//! Time advances only when the simulator pops an event, never from
//! wall-clock observation.
//!
//! | Type | Absolute | Relative |
//! |---|---|---|
//! | [`SimTimeDouble`] | `f64` | `f64` |
//! | [`SimTimeFloat`] | `f32` | `f32` |
//! | [`SimTimeLong`] | `i64` | `i64` |
//! | [`SimTimeCalendar<U>`] | ticks of `U` since the Unix epoch | `chrono::TimeDelta` |

mod calendar;
mod float;
mod long;

use std::fmt;
use std::hash::Hash;

use crate::error::KernelResult;

pub use calendar::{CalendarUnit, Days, Hours, Millis, Minutes, Seconds, SimTimeCalendar};
pub use float::{SimTimeDouble, SimTimeFloat};
pub use long::SimTimeLong;

/// An absolute point in simulated time.
///
/// Implementations must keep `Ord` consistent with `Eq` and must refuse
/// to construct values that would break the total order (NaN for the
/// floating representations). `copy()` is plain `Copy`: mutating a copy
/// through [`SimTime::add`] never affects the original.
pub trait SimTime: Copy + Ord + Hash + fmt::Debug + fmt::Display + 'static {
    /// Distance between two absolute times.
    type Relative: Copy + PartialEq + PartialOrd + fmt::Debug + fmt::Display + 'static;

    /// The epoch of this representation.
    fn zero() -> Self;

    /// The largest representable time, used as an unbounded end time.
    fn max_value() -> Self;

    /// A zero-length delay.
    fn relative_zero() -> Self::Relative;

    /// Returns `self + delta`.
    fn plus(self, delta: Self::Relative) -> KernelResult<Self>;

    /// Returns `self - delta`.
    fn minus(self, delta: Self::Relative) -> KernelResult<Self>;

    /// Relative distance `self - earlier`.
    ///
    /// Antisymmetric: `a.diff(b) == -(b.diff(a))` for representable results.
    fn diff(self, earlier: Self) -> Self::Relative;

    /// Build an absolute time from a unit-less number (config files, CLI).
    fn from_units(value: f64) -> KernelResult<Self>;

    /// Build a delay from a unit-less number.
    fn relative_from_units(value: f64) -> KernelResult<Self::Relative>;

    /// Express a delay as a unit-less number.
    fn relative_as_units(delta: Self::Relative) -> f64;

    /// Express a delay in wall-clock seconds, used by real-time pacing.
    ///
    /// Representations without an intrinsic unit treat one unit as one second.
    fn relative_as_secs(delta: Self::Relative) -> f64 {
        Self::relative_as_units(delta)
    }

    /// Advance this time in place.
    fn add(&mut self, delta: Self::Relative) -> KernelResult<()> {
        *self = self.plus(delta)?;
        Ok(())
    }

    /// Move this time back in place.
    fn subtract(&mut self, delta: Self::Relative) -> KernelResult<()> {
        *self = self.minus(delta)?;
        Ok(())
    }
}
