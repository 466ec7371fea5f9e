//! Lifecycle notifications published by the simulator.
//!
//! This is the only channel through which animation, statistics or UI
//! collaborators observe a run. Listeners are plain values owned by the
//! simulator; there is no global registry.

use std::fmt;

use crate::event::EventId;
use crate::time::SimTime;

/// Details of an event action that failed or panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure<T: SimTime> {
    pub event: EventId,
    pub time: T,
    pub source: Option<String>,
    pub message: String,
}

/// A notification emitted by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatorEvent<T: SimTime> {
    /// `initialize` finished constructing the model.
    StartReplication { replication: String, time: T },
    /// The replication reached its end (queue drained or end time passed).
    EndReplication { replication: String, time: T },
    /// The run loop entered `RUNNING`.
    Start { time: T },
    /// The run loop left `RUNNING`.
    Stop { time: T },
    /// The simulation clock advanced.
    TimeChanged { time: T },
    /// The warm-up period of the replication ended.
    Warmup { time: T },
    /// An event action failed; the run continued.
    ActionFailed(ActionFailure<T>),
}

/// Discriminant of a [`SimulatorEvent`], used for filtered subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatorEventKind {
    StartReplication,
    EndReplication,
    Start,
    Stop,
    TimeChanged,
    Warmup,
    ActionFailed,
}

impl SimulatorEventKind {
    /// Canonical notification name.
    pub fn name(self) -> &'static str {
        match self {
            SimulatorEventKind::StartReplication => "START_REPLICATION",
            SimulatorEventKind::EndReplication => "END_REPLICATION",
            SimulatorEventKind::Start => "START_EVENT",
            SimulatorEventKind::Stop => "STOP_EVENT",
            SimulatorEventKind::TimeChanged => "TIME_CHANGED_EVENT",
            SimulatorEventKind::Warmup => "WARMUP_EVENT",
            SimulatorEventKind::ActionFailed => "ACTION_FAILED_EVENT",
        }
    }
}

impl fmt::Display for SimulatorEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<T: SimTime> SimulatorEvent<T> {
    pub fn kind(&self) -> SimulatorEventKind {
        match self {
            SimulatorEvent::StartReplication { .. } => SimulatorEventKind::StartReplication,
            SimulatorEvent::EndReplication { .. } => SimulatorEventKind::EndReplication,
            SimulatorEvent::Start { .. } => SimulatorEventKind::Start,
            SimulatorEvent::Stop { .. } => SimulatorEventKind::Stop,
            SimulatorEvent::TimeChanged { .. } => SimulatorEventKind::TimeChanged,
            SimulatorEvent::Warmup { .. } => SimulatorEventKind::Warmup,
            SimulatorEvent::ActionFailed(_) => SimulatorEventKind::ActionFailed,
        }
    }

    /// Simulation time carried by the notification.
    pub fn time(&self) -> T {
        match self {
            SimulatorEvent::StartReplication { time, .. }
            | SimulatorEvent::EndReplication { time, .. }
            | SimulatorEvent::Start { time }
            | SimulatorEvent::Stop { time }
            | SimulatorEvent::TimeChanged { time }
            | SimulatorEvent::Warmup { time } => *time,
            SimulatorEvent::ActionFailed(failure) => failure.time,
        }
    }
}

/// Receiver of simulator notifications.
pub trait SimulatorListener<T: SimTime> {
    fn notify(&mut self, event: &SimulatorEvent<T>);
}

/// A listener backed by a closure.
impl<T, F> SimulatorListener<T> for F
where
    T: SimTime,
    F: FnMut(&SimulatorEvent<T>),
{
    fn notify(&mut self, event: &SimulatorEvent<T>) {
        (self)(event);
    }
}

/// Identifies a registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration<T: SimTime> {
    id: ListenerId,
    kinds: Option<Vec<SimulatorEventKind>>,
    listener: Box<dyn SimulatorListener<T>>,
}

/// The simulator's listener registry.
pub(crate) struct Listeners<T: SimTime> {
    next_id: u64,
    registrations: Vec<Registration<T>>,
}

impl<T: SimTime> Listeners<T> {
    pub(crate) fn new() -> Self {
        Listeners {
            next_id: 0,
            registrations: Vec::new(),
        }
    }

    pub(crate) fn add(
        &mut self,
        kinds: Option<Vec<SimulatorEventKind>>,
        listener: Box<dyn SimulatorListener<T>>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration { id, kinds, listener });
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Deliver to every matching listener in registration order.
    pub(crate) fn fire(&mut self, event: &SimulatorEvent<T>) {
        let kind = event.kind();
        for registration in &mut self.registrations {
            let wanted = registration
                .kinds
                .as_ref()
                .map_or(true, |kinds| kinds.contains(&kind));
            if wanted {
                registration.listener.notify(event);
            }
        }
    }
}
