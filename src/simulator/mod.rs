//! The simulator: event list owner, clock, and run loop.
//!
//! A single thread drives the loop. Each iteration drains cross-thread
//! requests, pops the earliest live event, advances the clock to its time
//! and runs its action to completion before looking at the queue again.
//! Actions receive `&mut Simulator` and may schedule, cancel, or request a
//! stop; everything they do takes effect between pops, so the dispatch
//! order is a pure function of the initial event list and the actions.
//!
//! ```text
//!            initialize
//!   INITIAL ───────────▶ STOPPED ◀──────────────┐
//!                          │  start / run_up_to │ stop, bound reached
//!                          ├──────────▶ RUNNING ┘
//!                          │  step              │ queue drained / end time
//!                          ├──────────▶ STEPPING│
//!                          │                    ▼
//!                          └───────────────▶  ENDED
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ActionResult, KernelError, KernelResult};
use crate::event::{Action, Event, EventHandle, EventId, EventIdGen, EventKey, EventSpec, Priority};
use crate::event_list::EventList;
use crate::listener::{
    ActionFailure, ListenerId, Listeners, SimulatorEvent, SimulatorEventKind, SimulatorListener,
};
use crate::realtime::Pacing;
use crate::remote::{RemoteInbox, RemoteRequest, RemoteScheduler, RemoteWhen};
use crate::replication::{Model, ReplicationConfig};
use crate::time::SimTime;
use crate::trace::ExecutionTrace;

#[cfg(test)]
mod tests;

// ── Run state ─────────────────────────────────────────────────────────

/// Lifecycle state of a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Created, no replication initialized yet.
    Initial,
    /// Initialized and idle; may start, step, or run up to a time.
    Stopped,
    /// Inside `start` / `run_up_to`.
    Running,
    /// Inside `step`.
    Stepping,
    /// The replication is over. Only `initialize` is accepted.
    Ended,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Initial => "INITIAL",
            RunState::Stopped => "STOPPED",
            RunState::Running => "RUNNING",
            RunState::Stepping => "STEPPING",
            RunState::Ended => "ENDED",
        })
    }
}

/// Result of [`Simulator::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome<T: SimTime> {
    /// One event was executed.
    Executed { id: EventId, time: T },
    /// Nothing pending; the simulator stays `STOPPED`.
    Idle,
    /// The next event lies beyond the replication end; the replication ended.
    Ended,
}

#[derive(Debug, Clone, Copy)]
enum Bound<T> {
    /// Stop before events at exactly this time.
    Before(T),
    /// Stop after events at exactly this time.
    Through(T),
    /// Run to the end of the replication.
    End,
}

enum Halt<T> {
    Stopped,
    BoundReached(T),
    Exhausted,
}

// ── Simulator ─────────────────────────────────────────────────────────

/// Discrete-event simulator over a time representation `T`.
pub struct Simulator<T: SimTime> {
    name: String,
    now: T,
    events: EventList<T>,
    ids: EventIdGen,
    state: RunState,
    replication: Option<ReplicationConfig<T>>,
    stop_requested: bool,
    end_requested: bool,
    events_processed: u64,
    listeners: Listeners<T>,
    pacing: Option<Box<dyn Pacing<T>>>,
    remote: RemoteInbox<T>,
    rng: ChaCha8Rng,
    trace: Option<ExecutionTrace<T>>,
    span: tracing::Span,
}

impl<T: SimTime> Simulator<T> {
    /// Create a simulator. Call [`initialize`](Self::initialize) before running.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let span = tracing::info_span!("simulator", name = %name);
        Simulator {
            name,
            now: T::zero(),
            events: EventList::new(),
            ids: EventIdGen::new(),
            state: RunState::Initial,
            replication: None,
            stop_requested: false,
            end_requested: false,
            events_processed: 0,
            listeners: Listeners::new(),
            pacing: None,
            remote: RemoteInbox::new(),
            rng: ChaCha8Rng::seed_from_u64(0),
            trace: None,
            span,
        }
    }

    /// Pace the run loop with a wall-clock strategy.
    pub fn with_pacing(mut self, pacing: impl Pacing<T> + 'static) -> Self {
        self.pacing = Some(Box::new(pacing));
        self
    }

    /// Replace (or remove) the pacing strategy.
    pub fn set_pacing(&mut self, pacing: Option<Box<dyn Pacing<T>>>) {
        self.pacing = pacing;
    }

    /// Record every executed event into an [`ExecutionTrace`].
    pub fn enable_trace(&mut self) {
        self.trace = Some(ExecutionTrace::new());
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current simulation time.
    #[inline]
    pub fn simulator_time(&self) -> T {
        self.now
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running | RunState::Stepping)
    }

    /// Total events executed in the current replication.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Number of events still in the event list (cancelled ones included
    /// until they are popped).
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn event_list(&self) -> &EventList<T> {
        &self.events
    }

    pub fn replication(&self) -> Option<&ReplicationConfig<T>> {
        self.replication.as_ref()
    }

    /// Random stream of the current replication, seeded from its seed.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn trace(&self) -> Option<&ExecutionTrace<T>> {
        self.trace.as_ref()
    }

    /// Time of the next live event, if any.
    pub fn next_event_time(&self) -> Option<T> {
        self.events
            .iter()
            .find(|event| !event.is_cancelled())
            .map(Event::execution_time)
    }

    fn end_time(&self) -> T {
        self.replication
            .as_ref()
            .map_or_else(T::max_value, ReplicationConfig::end_time)
    }

    fn replication_id(&self) -> String {
        self.replication
            .as_ref()
            .map(|r| r.id().to_string())
            .unwrap_or_default()
    }

    // ── Listeners ─────────────────────────────────────────────

    /// Subscribe to every notification.
    pub fn add_listener(&mut self, listener: impl SimulatorListener<T> + 'static) -> ListenerId {
        self.listeners.add(None, Box::new(listener))
    }

    /// Subscribe to the given notification kinds only.
    pub fn add_listener_for(
        &mut self,
        kinds: &[SimulatorEventKind],
        listener: impl SimulatorListener<T> + 'static,
    ) -> ListenerId {
        self.listeners.add(Some(kinds.to_vec()), Box::new(listener))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn fire(&mut self, event: SimulatorEvent<T>) {
        trace!(kind = %event.kind(), time = %event.time(), "notify");
        self.listeners.fire(&event);
    }

    // ── Replication lifecycle ─────────────────────────────────

    /// Prepare a replication: clear the event list, set the clock to the
    /// start time, reseed the random stream and let the model schedule its
    /// initial events.
    pub fn initialize<M>(&mut self, replication: ReplicationConfig<T>, model: &mut M) -> KernelResult<()>
    where
        M: Model<T> + ?Sized,
    {
        if self.is_running() {
            return Err(KernelError::AlreadyRunning);
        }
        let span = self.span.clone();
        let _enter = span.enter();

        self.events.clear();
        self.ids.reset();
        self.now = replication.start_time();
        self.stop_requested = false;
        self.end_requested = false;
        self.events_processed = 0;
        self.rng = ChaCha8Rng::seed_from_u64(replication.seed());
        if self.trace.is_some() {
            self.trace = Some(ExecutionTrace::new());
        }
        if let Some(pacing) = self.pacing.as_mut() {
            pacing.reset();
        }
        let warmup = replication.warmup_time();
        self.replication = Some(replication);
        self.state = RunState::Stopped;

        if let Some(at) = warmup {
            let spec = EventSpec::at(at, |sim: &mut Simulator<T>| {
                let time = sim.now;
                info!(time = %time, "warm-up period ended");
                sim.fire(SimulatorEvent::Warmup { time });
                Ok(())
            })
            .with_priority(Priority::KERNEL)
            .with_source("warmup");
            self.schedule(spec)?;
        }

        if let Err(e) = model.construct_model(self) {
            error!(error = %e, "model construction failed");
            self.events.clear();
            self.replication = None;
            self.state = RunState::Initial;
            return Err(KernelError::ModelConstruction(e.to_string()));
        }

        info!(
            replication = %self.replication_id(),
            start = %self.now,
            end = %self.end_time(),
            pending = self.events.len(),
            "replication initialized"
        );
        let replication = self.replication_id();
        self.fire(SimulatorEvent::StartReplication {
            replication,
            time: self.now,
        });
        Ok(())
    }

    /// End the replication.
    ///
    /// From `STOPPED` this takes effect immediately; from inside an action
    /// it takes effect when the action returns.
    pub fn end_replication(&mut self) -> KernelResult<()> {
        match self.state {
            RunState::Running | RunState::Stepping => {
                self.end_requested = true;
                Ok(())
            }
            RunState::Stopped => {
                self.finish_replication();
                Ok(())
            }
            state => Err(KernelError::InvalidState {
                operation: "end replication",
                state: state.to_string(),
            }),
        }
    }

    fn finish_replication(&mut self) {
        self.state = RunState::Ended;
        self.end_requested = false;
        self.stop_requested = false;
        info!(
            time = %self.now,
            processed = self.events_processed,
            "replication ended"
        );
        let replication = self.replication_id();
        self.fire(SimulatorEvent::EndReplication {
            replication,
            time: self.now,
        });
    }

    // ── Scheduling API ────────────────────────────────────────

    /// Schedule an event described by `spec`.
    pub fn schedule(&mut self, spec: EventSpec<T>) -> KernelResult<EventHandle<T>> {
        if spec.time < self.now {
            return Err(KernelError::PastScheduling {
                requested: spec.time.to_string(),
                current: self.now.to_string(),
            });
        }
        let id = self.ids.next_id();
        let event = Event::from_boxed(id, spec.time, spec.priority, spec.source, spec.action);
        let handle = event.handle();
        self.events.insert(event)?;
        trace!(event = %id, time = %spec.time, priority = %spec.priority, "scheduled");
        Ok(handle)
    }

    /// Schedule `action` at absolute time `time`.
    pub fn schedule_event_abs<F>(&mut self, time: T, priority: Priority, action: F) -> KernelResult<EventHandle<T>>
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + 'static,
    {
        self.schedule(EventSpec::at(time, action).with_priority(priority))
    }

    /// Schedule `action` `delay` after the current time.
    pub fn schedule_event_rel<F>(
        &mut self,
        delay: T::Relative,
        priority: Priority,
        action: F,
    ) -> KernelResult<EventHandle<T>>
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + 'static,
    {
        let time = self.now.plus(delay)?;
        self.schedule_event_abs(time, priority, action)
    }

    /// Schedule at `time` with normal priority.
    pub fn schedule_at<F>(&mut self, time: T, action: F) -> KernelResult<EventHandle<T>>
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + 'static,
    {
        self.schedule_event_abs(time, Priority::NORMAL, action)
    }

    /// Schedule `delay` from now with normal priority.
    pub fn schedule_after<F>(&mut self, delay: T::Relative, action: F) -> KernelResult<EventHandle<T>>
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + 'static,
    {
        self.schedule_event_rel(delay, Priority::NORMAL, action)
    }

    /// Schedule at the current time, after already-pending simultaneous events.
    pub fn schedule_now<F>(&mut self, action: F) -> KernelResult<EventHandle<T>>
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + 'static,
    {
        self.schedule_event_abs(self.now, Priority::NORMAL, action)
    }

    /// Cancel a scheduled event and remove it from the event list.
    ///
    /// Returns whether the event was still pending. A handle kept from an
    /// earlier replication matches nothing.
    pub fn cancel_event(&mut self, handle: &EventHandle<T>) -> bool {
        handle.cancel();
        let removed = self.events.remove(handle).is_some();
        if removed {
            debug!(event = %handle.id(), "event cancelled");
        }
        removed
    }

    // ── Remote scheduling ─────────────────────────────────────

    /// A thread-safe handle for scheduling onto this simulator.
    pub fn remote_scheduler(&self) -> RemoteScheduler<T> {
        self.remote.scheduler()
    }

    /// Apply every queued cross-thread request. Returns how many were handled.
    pub fn process_remote_requests(&mut self) -> usize {
        let mut handled = 0;
        while let Some(request) = self.remote.try_next() {
            self.apply_remote(request);
            handled += 1;
        }
        handled
    }

    fn apply_remote(&mut self, request: RemoteRequest<T>) {
        match request {
            RemoteRequest::Schedule {
                when,
                priority,
                source,
                action,
                reply,
            } => {
                let result = match when {
                    RemoteWhen::At(time) => Ok(time),
                    RemoteWhen::After(delay) => self.now.plus(delay),
                }
                .and_then(|time| {
                    let action: Action<T> = action;
                    self.schedule(EventSpec {
                        time,
                        priority,
                        source,
                        action,
                    })
                })
                .map(|handle| handle.id());
                if let Err(e) = &result {
                    warn!(error = %e, "remote schedule rejected");
                }
                // The requester may have dropped its ticket.
                let _ = reply.send(result);
            }
            RemoteRequest::Cancel { id, reply } => {
                let removed = match self.events.remove_id(id) {
                    Some(event) => {
                        event.handle().cancel();
                        debug!(event = %id, "event cancelled remotely");
                        true
                    }
                    None => false,
                };
                let _ = reply.send(removed);
            }
            RemoteRequest::Stop => self.stop(),
        }
    }

    // ── Control ───────────────────────────────────────────────

    fn check_idle(&self, operation: &'static str) -> KernelResult<()> {
        match self.state {
            RunState::Stopped => Ok(()),
            RunState::Running | RunState::Stepping => Err(KernelError::AlreadyRunning),
            state => Err(KernelError::InvalidState {
                operation,
                state: state.to_string(),
            }),
        }
    }

    /// Run until stopped, the event list drains, or the replication end
    /// time is passed.
    pub fn start(&mut self) -> KernelResult<()> {
        self.check_idle("start")?;
        self.run(Bound::End);
        Ok(())
    }

    /// Execute every event strictly before `target`, then set the clock to
    /// `target`. Events at exactly `target` stay pending.
    pub fn run_up_to(&mut self, target: T) -> KernelResult<()> {
        self.check_target(target)?;
        self.run(Bound::Before(target));
        Ok(())
    }

    /// Like [`run_up_to`](Self::run_up_to) but also executes events at
    /// exactly `target`.
    pub fn run_up_to_inclusive(&mut self, target: T) -> KernelResult<()> {
        self.check_target(target)?;
        self.run(Bound::Through(target));
        Ok(())
    }

    fn check_target(&self, target: T) -> KernelResult<()> {
        self.check_idle("run up to")?;
        if target < self.now {
            return Err(KernelError::PastScheduling {
                requested: target.to_string(),
                current: self.now.to_string(),
            });
        }
        Ok(())
    }

    /// Ask the run loop to pause once the current action returns.
    pub fn stop(&mut self) {
        if self.is_running() {
            debug!(time = %self.now, "stop requested");
            self.stop_requested = true;
        }
    }

    /// Execute exactly one event and return to `STOPPED`.
    pub fn step(&mut self) -> KernelResult<StepOutcome<T>> {
        self.check_idle("step")?;
        let span = self.span.clone();
        let _enter = span.enter();

        self.process_remote_requests();
        let Some(next) = self.next_live_time() else {
            return Ok(StepOutcome::Idle);
        };
        if next > self.end_time() {
            self.finish_replication();
            return Ok(StepOutcome::Ended);
        }

        self.state = RunState::Stepping;
        let executed = self.execute_next();
        self.state = RunState::Stopped;
        self.stop_requested = false;
        if self.end_requested {
            self.finish_replication();
        }
        Ok(executed.map_or(StepOutcome::Idle, |(id, time)| StepOutcome::Executed { id, time }))
    }

    fn run(&mut self, bound: Bound<T>) {
        let span = self.span.clone();
        let _enter = span.enter();

        let end = self.end_time();
        let bound = match bound {
            Bound::Before(t) | Bound::Through(t) if t > end => Bound::End,
            other => other,
        };

        self.state = RunState::Running;
        self.stop_requested = false;
        if let Some(pacing) = self.pacing.as_mut() {
            pacing.reset();
        }
        info!(time = %self.now, pending = self.events.len(), "run started");
        self.fire(SimulatorEvent::Start { time: self.now });

        let halt = loop {
            self.process_remote_requests();
            if self.end_requested {
                break Halt::Exhausted;
            }
            if self.stop_requested {
                break Halt::Stopped;
            }
            let next = self.next_live_time();
            match (bound, next) {
                (Bound::Before(t), None) | (Bound::Through(t), None) => break Halt::BoundReached(t),
                (Bound::Before(t), Some(n)) if n >= t => break Halt::BoundReached(t),
                (Bound::Through(t), Some(n)) if n > t => break Halt::BoundReached(t),
                (Bound::End, None) => break Halt::Exhausted,
                (Bound::End, Some(n)) if n > end => break Halt::Exhausted,
                _ => {}
            }
            if let (Some(pacing), Some(n)) = (self.pacing.as_mut(), next) {
                pacing.pace(self.now, n);
            }
            self.execute_next();
        };

        match halt {
            Halt::Stopped => {
                self.state = RunState::Stopped;
                self.stop_requested = false;
                info!(time = %self.now, "run stopped");
                self.fire(SimulatorEvent::Stop { time: self.now });
            }
            Halt::BoundReached(target) => {
                if target > self.now {
                    self.now = target;
                    self.fire(SimulatorEvent::TimeChanged { time: target });
                }
                self.state = RunState::Stopped;
                info!(time = %self.now, "run reached target time");
                self.fire(SimulatorEvent::Stop { time: self.now });
            }
            Halt::Exhausted => {
                self.fire(SimulatorEvent::Stop { time: self.now });
                self.finish_replication();
            }
        }
    }

    /// Drop cancelled events sitting at the head of the list and return
    /// the time of the first live one.
    fn next_live_time(&mut self) -> Option<T> {
        while self.events.peek_first().is_some_and(Event::is_cancelled) {
            if let Some(event) = self.events.pop_first() {
                trace!(event = %event.id(), "skipping cancelled event");
            }
        }
        self.events.peek_first().map(Event::execution_time)
    }

    /// Pop the head event, advance the clock and run its action.
    fn execute_next(&mut self) -> Option<(EventId, T)> {
        let event = self.events.pop_first()?;
        if event.is_cancelled() {
            trace!(event = %event.id(), "skipping cancelled event");
            return None;
        }
        let (key, source, action) = event.into_parts();

        // Virtual time must never go backward.
        debug_assert!(key.time >= self.now, "time went backward");
        if key.time > self.now {
            self.now = key.time;
            self.fire(SimulatorEvent::TimeChanged { time: key.time });
        }
        self.events_processed += 1;
        if let Some(trace) = self.trace.as_mut() {
            trace.record(key, source.as_deref());
        }
        debug!(event = %key.id, time = %key.time, "executing event");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(self)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };
        if let Some(message) = failure {
            self.report_failure(key, source, message);
        }
        Some((key.id, key.time))
    }

    fn report_failure(&mut self, key: EventKey<T>, source: Option<String>, message: String) {
        let err = KernelError::ActionExecution {
            event: key.id,
            time: key.time.to_string(),
            message: message.clone(),
        };
        error!(source = ?source, error = %err, "event action failed");
        self.fire(SimulatorEvent::ActionFailed(ActionFailure {
            event: key.id,
            time: key.time,
            source,
            message,
        }));
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

impl<T: SimTime> fmt::Debug for Simulator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("name", &self.name)
            .field("now", &self.now)
            .field("state", &self.state)
            .field("pending", &self.events.len())
            .field("events_processed", &self.events_processed)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
