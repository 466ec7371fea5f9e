//! Wall-clock pacing of the run loop.
//!
//! A plain simulator executes events as fast as it can. Attaching a
//! [`Pacing`] strategy makes the loop wait before each event so that
//! simulated time tracks wall-clock time scaled by a speed factor. Pacing
//! only ever delays; it never changes the order or the times of events.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{KernelError, KernelResult};
use crate::time::SimTime;

/// Decides how long to wait before the clock moves from `now` to `next`.
pub trait Pacing<T: SimTime> {
    fn pace(&mut self, now: T, next: T);

    /// Forget any wall-clock reference. Called when a run (re)starts.
    fn reset(&mut self) {}
}

type Sleeper = Box<dyn FnMut(Duration)>;

/// Paces simulated seconds against wall-clock seconds.
///
/// A speed factor of 1 plays the model in real time, 10 runs ten times
/// faster, and infinity disables waiting altogether.
pub struct RealTimePacing {
    speed_factor: f64,
    last_wall: Option<Instant>,
    sleeper: Sleeper,
}

impl RealTimePacing {
    pub fn new(speed_factor: f64) -> KernelResult<Self> {
        Ok(RealTimePacing {
            speed_factor: check_speed(speed_factor)?,
            last_wall: None,
            sleeper: Box::new(thread::sleep),
        })
    }

    /// Replace `thread::sleep` with another wait function.
    pub fn with_sleeper(mut self, sleeper: impl FnMut(Duration) + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    pub fn set_speed_factor(&mut self, speed_factor: f64) -> KernelResult<()> {
        self.speed_factor = check_speed(speed_factor)?;
        Ok(())
    }
}

fn check_speed(speed_factor: f64) -> KernelResult<f64> {
    if speed_factor.is_nan() || speed_factor <= 0.0 {
        return Err(KernelError::Config(format!(
            "speed factor must be positive, got {}",
            speed_factor
        )));
    }
    Ok(speed_factor)
}

impl<T: SimTime> Pacing<T> for RealTimePacing {
    fn pace(&mut self, now: T, next: T) {
        let simulated = T::relative_as_secs(next.diff(now));
        let target = simulated / self.speed_factor;
        let elapsed = self
            .last_wall
            .map_or(0.0, |at| at.elapsed().as_secs_f64());
        let wait = target - elapsed;
        if wait > 0.0 {
            if let Ok(duration) = Duration::try_from_secs_f64(wait) {
                trace!(?duration, "pacing");
                (self.sleeper)(duration);
            }
        }
        self.last_wall = Some(Instant::now());
    }

    fn reset(&mut self) {
        self.last_wall = None;
    }
}

impl fmt::Debug for RealTimePacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealTimePacing")
            .field("speed_factor", &self.speed_factor)
            .finish_non_exhaustive()
    }
}
