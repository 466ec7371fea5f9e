//! Calendar-based simulated time.
//!
//! A `SimTimeCalendar<U>` stores an integer number of `U` ticks since the
//! Unix epoch (UTC). Ordering is plain integer ordering on those ticks,
//! so instants closer together than one `U` compare equal. Delays are
//! `chrono::TimeDelta`, truncated toward zero to whole `U` when applied.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use crate::error::{KernelError, KernelResult};

use super::long::units_to_ticks;
use super::SimTime;

// ── Units ─────────────────────────────────────────────────────────────

/// Type-level storage unit of a calendar time.
pub trait CalendarUnit:
    Copy + Ord + Hash + Default + fmt::Debug + Send + Sync + 'static
{
    /// Milliseconds per tick.
    const MILLIS: i64;
    /// Suffix used when a value has no calendar rendering.
    const SYMBOL: &'static str;
}

macro_rules! calendar_unit {
    ($name:ident, $millis:expr, $symbol:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name;

        impl CalendarUnit for $name {
            const MILLIS: i64 = $millis;
            const SYMBOL: &'static str = $symbol;
        }
    };
}

calendar_unit!(Millis, 1, "ms");
calendar_unit!(Seconds, 1_000, "s");
calendar_unit!(Minutes, 60_000, "min");
calendar_unit!(Hours, 3_600_000, "h");
calendar_unit!(Days, 86_400_000, "d");

// ── SimTimeCalendar ───────────────────────────────────────────────────

/// Wall-calendar simulated time with a fixed storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTimeCalendar<U: CalendarUnit = Millis> {
    ticks: i64,
    unit: PhantomData<U>,
}

impl<U: CalendarUnit> SimTimeCalendar<U> {
    /// The Unix epoch.
    pub const EPOCH: Self = SimTimeCalendar {
        ticks: 0,
        unit: PhantomData,
    };

    /// Create a time from a raw tick count since the epoch.
    #[inline]
    pub fn from_ticks(ticks: i64) -> Self {
        SimTimeCalendar {
            ticks,
            unit: PhantomData,
        }
    }

    /// Truncate a UTC instant to this unit (floor, also before the epoch).
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self::from_ticks(instant.timestamp_millis().div_euclid(U::MILLIS))
    }

    /// Raw tick count since the epoch.
    #[inline]
    pub fn ticks(self) -> i64 {
        self.ticks
    }

    /// The instant as a UTC date-time, if chrono can represent it.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        self.ticks
            .checked_mul(U::MILLIS)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    fn delta_ticks(delta: TimeDelta) -> i64 {
        delta.num_milliseconds() / U::MILLIS
    }
}

impl<U: CalendarUnit> fmt::Display for SimTimeCalendar<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => write!(f, "{}{}", self.ticks, U::SYMBOL),
        }
    }
}

impl<U: CalendarUnit> SimTime for SimTimeCalendar<U> {
    type Relative = TimeDelta;

    fn zero() -> Self {
        Self::EPOCH
    }

    fn max_value() -> Self {
        Self::from_ticks(DateTime::<Utc>::MAX_UTC.timestamp_millis() / U::MILLIS)
    }

    fn relative_zero() -> TimeDelta {
        TimeDelta::zero()
    }

    fn plus(self, delta: TimeDelta) -> KernelResult<Self> {
        self.ticks
            .checked_add(Self::delta_ticks(delta))
            .map(Self::from_ticks)
            .ok_or_else(|| KernelError::InvalidTime(format!("{} + {} overflows", self, delta)))
    }

    fn minus(self, delta: TimeDelta) -> KernelResult<Self> {
        self.ticks
            .checked_sub(Self::delta_ticks(delta))
            .map(Self::from_ticks)
            .ok_or_else(|| KernelError::InvalidTime(format!("{} - {} overflows", self, delta)))
    }

    fn diff(self, earlier: Self) -> TimeDelta {
        let millis = (self.ticks as i128 - earlier.ticks as i128) * U::MILLIS as i128;
        let clamped = millis.clamp(-(i64::MAX as i128), i64::MAX as i128) as i64;
        TimeDelta::try_milliseconds(clamped).unwrap_or_else(TimeDelta::zero)
    }

    fn from_units(value: f64) -> KernelResult<Self> {
        units_to_ticks(value).map(Self::from_ticks)
    }

    fn relative_from_units(value: f64) -> KernelResult<TimeDelta> {
        let ticks = units_to_ticks(value)?;
        ticks
            .checked_mul(U::MILLIS)
            .and_then(TimeDelta::try_milliseconds)
            .ok_or_else(|| KernelError::InvalidTime(format!("delay of {} {} is out of range", value, U::SYMBOL)))
    }

    fn relative_as_units(delta: TimeDelta) -> f64 {
        delta.num_milliseconds() as f64 / U::MILLIS as f64
    }

    fn relative_as_secs(delta: TimeDelta) -> f64 {
        delta.num_milliseconds() as f64 / 1_000.0
    }
}
