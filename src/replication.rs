//! Replication configuration and the model construction hook.

use crate::error::{ActionResult, KernelError, KernelResult};
use crate::simulator::Simulator;
use crate::time::SimTime;

/// One complete run of a model from start time to end time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationConfig<T: SimTime> {
    id: String,
    start_time: T,
    end_time: T,
    warmup_time: Option<T>,
    seed: u64,
}

impl<T: SimTime> ReplicationConfig<T> {
    /// A replication over `[start_time, end_time]`.
    pub fn new(id: impl Into<String>, start_time: T, end_time: T) -> KernelResult<Self> {
        if end_time < start_time {
            return Err(KernelError::InvalidReplication(format!(
                "end time {} is before start time {}",
                end_time, start_time
            )));
        }
        Ok(ReplicationConfig {
            id: id.into(),
            start_time,
            end_time,
            warmup_time: None,
            seed: 0,
        })
    }

    /// A replication of `run_length` starting at `start_time`.
    pub fn with_run_length(
        id: impl Into<String>,
        start_time: T,
        run_length: T::Relative,
    ) -> KernelResult<Self> {
        let end_time = start_time.plus(run_length)?;
        Self::new(id, start_time, end_time)
    }

    /// A replication with no end time; it ends when the event list drains.
    pub fn unbounded(id: impl Into<String>, start_time: T) -> Self {
        ReplicationConfig {
            id: id.into(),
            start_time,
            end_time: T::max_value(),
            warmup_time: None,
            seed: 0,
        }
    }

    /// Declare a warm-up period measured from the start time.
    pub fn with_warmup_period(mut self, period: T::Relative) -> KernelResult<Self> {
        let warmup = self.start_time.plus(period)?;
        if warmup < self.start_time || warmup > self.end_time {
            return Err(KernelError::InvalidReplication(format!(
                "warm-up time {} lies outside [{}, {}]",
                warmup, self.start_time, self.end_time
            )));
        }
        self.warmup_time = Some(warmup);
        Ok(self)
    }

    /// Seed for the replication's random stream.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> T {
        self.start_time
    }

    pub fn end_time(&self) -> T {
        self.end_time
    }

    pub fn warmup_time(&self) -> Option<T> {
        self.warmup_time
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// The model collaborator.
///
/// `construct_model` runs once per replication inside
/// [`Simulator::initialize`], after the event list has been cleared and
/// the clock set to the start time. It is expected to schedule the
/// model's initial events.
pub trait Model<T: SimTime> {
    fn construct_model(&mut self, sim: &mut Simulator<T>) -> ActionResult;
}

/// A model backed by a closure.
impl<T, F> Model<T> for F
where
    T: SimTime,
    F: FnMut(&mut Simulator<T>) -> ActionResult,
{
    fn construct_model(&mut self, sim: &mut Simulator<T>) -> ActionResult {
        (self)(sim)
    }
}
