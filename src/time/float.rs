//! IEEE754-backed time representations.
//!
//! NaN is rejected at construction so the derived total order is sound,
//! and `-0.0` is folded into `0.0` so `Eq` and `Hash` agree.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{KernelError, KernelResult};

use super::SimTime;

macro_rules! float_time {
    ($(#[$meta:meta])* $name:ident, $float:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        #[cfg_attr(feature = "serialize", derive(serde::Serialize))]
        pub struct $name($float);

        impl $name {
            /// The zero-point of simulation time.
            pub const ZERO: $name = $name(0.0);

            /// Create a time value, rejecting NaN.
            pub fn new(value: $float) -> KernelResult<Self> {
                if value.is_nan() {
                    return Err(KernelError::InvalidTime(format!(
                        "{} cannot be NaN",
                        stringify!($name)
                    )));
                }
                // Fold -0.0 into 0.0.
                Ok($name(if value == 0.0 { 0.0 } else { value }))
            }

            /// Return the raw value.
            #[inline]
            pub fn value(self) -> $float {
                self.0
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.0.total_cmp(&other.0)
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.to_bits().hash(state);
            }
        }

        impl TryFrom<$float> for $name {
            type Error = KernelError;

            fn try_from(value: $float) -> KernelResult<Self> {
                $name::new(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl SimTime for $name {
            type Relative = $float;

            fn zero() -> Self {
                $name::ZERO
            }

            fn max_value() -> Self {
                $name(<$float>::INFINITY)
            }

            fn relative_zero() -> $float {
                0.0
            }

            fn plus(self, delta: $float) -> KernelResult<Self> {
                if delta.is_nan() {
                    return Err(KernelError::InvalidTime("delay cannot be NaN".into()));
                }
                $name::new(self.0 + delta)
            }

            fn minus(self, delta: $float) -> KernelResult<Self> {
                self.plus(-delta)
            }

            fn diff(self, earlier: Self) -> $float {
                self.0 - earlier.0
            }

            fn from_units(value: f64) -> KernelResult<Self> {
                let narrowed = value as $float;
                if narrowed.is_infinite() && value.is_finite() {
                    return Err(KernelError::InvalidTime(format!(
                        "{} is out of range for {}",
                        value,
                        stringify!($name)
                    )));
                }
                $name::new(narrowed)
            }

            fn relative_from_units(value: f64) -> KernelResult<$float> {
                let narrowed = value as $float;
                if value.is_nan() || (narrowed.is_infinite() && value.is_finite()) {
                    return Err(KernelError::InvalidTime(format!("invalid delay {}", value)));
                }
                Ok(narrowed)
            }

            fn relative_as_units(delta: $float) -> f64 {
                delta as f64
            }
        }
    };
}

float_time!(
    /// Double-precision simulated time.
    SimTimeDouble,
    f64
);

float_time!(
    /// Single-precision simulated time.
    SimTimeFloat,
    f32
);
