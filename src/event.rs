//! Events for the deterministic scheduling kernel.
//!
//! An `Event` binds a one-shot action to a point in simulated time. Its
//! ordering key `(execution_time, priority, id)` is fixed at creation and
//! never mutated while the event sits in an [`EventList`](crate::EventList);
//! cancellation is either removal or a shared flag that the simulator
//! checks when the event is popped.

use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::error::ActionResult;
use crate::simulator::Simulator;
use crate::time::SimTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// A strictly increasing event identifier.
///
/// The sequence number is the final tie-break in the event list: two
/// events with equal time and priority run in creation order. Each
/// replication numbers its events under a fresh generation, so an id
/// minted in one replication never names an event of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId {
    generation: u32,
    seq: u64,
}

impl EventId {
    /// Wrap a raw sequence number into an `EventId` of generation 0.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId { generation: 0, seq: raw }
    }

    /// Sequence number within the replication.
    #[inline]
    pub fn raw(self) -> u64 {
        self.seq
    }

    /// Replication generation the id was minted in.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "E#{}", self.seq)
        } else {
            write!(f, "E#{}.{}", self.generation, self.seq)
        }
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
///
/// Each `Simulator` owns exactly one of these and calls [`reset`] at the
/// start of every replication: sequence numbers restart at 0, so
/// identical models produce identical sequences, while the generation
/// moves on.
///
/// [`reset`]: EventIdGen::reset
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    generation: u32,
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0 in generation 0.
    pub fn new() -> Self {
        EventIdGen { generation: 0, next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId {
            generation: self.generation,
            seq: self.next,
        };
        self.next += 1;
        id
    }

    /// Start a new generation and restart numbering at 0.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.next = 0;
    }
}

// ── Event identity ───────────────────────────────────────────────────

/// Identity of one event object: the address of its shared cancel flag.
///
/// Every pending event and every handle to it hold that allocation, so
/// the address cannot be reused while either side can still ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EventRef(*const Cell<bool>);

// ── Priority ──────────────────────────────────────────────────────────

/// Scheduling priority. Lower values run first among simultaneous events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Priority(i32);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const HIGH: Priority = Priority(3);
    pub const NORMAL: Priority = Priority(5);
    pub const LOW: Priority = Priority(7);
    pub const LOWEST: Priority = Priority(10);

    /// Kernel-internal events (warm-up) run before any model event.
    pub(crate) const KERNEL: Priority = Priority(i32::MIN);

    #[inline]
    pub fn new(value: i32) -> Self {
        Priority(value)
    }

    #[inline]
    pub fn value(self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// ── Event Key ─────────────────────────────────────────────────────────

/// The ordering key of an event: time, then priority, then id.
///
/// Field order matters: the derived `Ord` is lexicographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey<T: SimTime> {
    pub time: T,
    pub priority: Priority,
    pub id: EventId,
}

// ── Action ────────────────────────────────────────────────────────────

/// The callable bound to an event.
///
/// Receives the owning simulator, so an action may read the clock,
/// schedule follow-up events, cancel events or request a stop.
pub type Action<T> = Box<dyn FnOnce(&mut Simulator<T>) -> ActionResult>;

// ── Event ─────────────────────────────────────────────────────────────

/// A single pending event.
pub struct Event<T: SimTime> {
    key: EventKey<T>,
    source: Option<String>,
    action: Action<T>,
    cancelled: Rc<Cell<bool>>,
}

impl<T: SimTime> Event<T> {
    /// Create an event with an already-minted id.
    pub fn new<F>(id: EventId, execution_time: T, priority: Priority, action: F) -> Self
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + 'static,
    {
        Self::from_boxed(id, execution_time, priority, None, Box::new(action))
    }

    pub(crate) fn from_boxed(
        id: EventId,
        time: T,
        priority: Priority,
        source: Option<String>,
        action: Action<T>,
    ) -> Self {
        Event {
            key: EventKey { time, priority, id },
            source,
            action,
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    /// Attach a source label (who scheduled this event).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[inline]
    pub fn id(&self) -> EventId {
        self.key.id
    }

    #[inline]
    pub fn execution_time(&self) -> T {
        self.key.time
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.key.priority
    }

    #[inline]
    pub fn key(&self) -> EventKey<T> {
        self.key
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Whether the event was cancelled through one of its handles.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    pub(crate) fn identity(&self) -> EventRef {
        EventRef(Rc::as_ptr(&self.cancelled))
    }

    /// A handle sharing this event's cancel flag.
    pub fn handle(&self) -> EventHandle<T> {
        EventHandle {
            key: self.key,
            cancelled: Rc::clone(&self.cancelled),
        }
    }

    /// Split into key, source and action for execution.
    pub(crate) fn into_parts(self) -> (EventKey<T>, Option<String>, Action<T>) {
        (self.key, self.source, self.action)
    }
}

impl<T: SimTime> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.key.id)
            .field("time", &self.key.time)
            .field("priority", &self.key.priority)
            .field("source", &self.source)
            .field("cancelled", &self.cancelled.get())
            .finish_non_exhaustive()
    }
}

/// Events compare by key, smallest `(time, priority, id)` first.
impl<T: SimTime> Ord for Event<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl<T: SimTime> PartialOrd for Event<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: SimTime> PartialEq for Event<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T: SimTime> Eq for Event<T> {}

// ── Event Spec ────────────────────────────────────────────────────────

/// Description of an event that has not been scheduled yet.
///
/// The id is minted by the simulator at scheduling time.
pub struct EventSpec<T: SimTime> {
    pub(crate) time: T,
    pub(crate) priority: Priority,
    pub(crate) source: Option<String>,
    pub(crate) action: Action<T>,
}

impl<T: SimTime> EventSpec<T> {
    /// An event at absolute time `time` with normal priority.
    pub fn at<F>(time: T, action: F) -> Self
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + 'static,
    {
        EventSpec {
            time,
            priority: Priority::NORMAL,
            source: None,
            action: Box::new(action),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ── Event Handle ──────────────────────────────────────────────────────

/// A reference to a scheduled event.
///
/// Cancelling through the handle only flips a flag shared with the event;
/// the simulator drops flagged events when it pops them. Use
/// [`Simulator::cancel_event`] to remove the event eagerly.
#[derive(Clone)]
pub struct EventHandle<T: SimTime> {
    key: EventKey<T>,
    cancelled: Rc<Cell<bool>>,
}

impl<T: SimTime> EventHandle<T> {
    #[inline]
    pub fn id(&self) -> EventId {
        self.key.id
    }

    #[inline]
    pub fn time(&self) -> T {
        self.key.time
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.key.priority
    }

    #[inline]
    pub fn key(&self) -> EventKey<T> {
        self.key
    }

    pub(crate) fn identity(&self) -> EventRef {
        EventRef(Rc::as_ptr(&self.cancelled))
    }

    /// Mark the event as cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl<T: SimTime> fmt::Debug for EventHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandle")
            .field("id", &self.key.id)
            .field("time", &self.key.time)
            .field("cancelled", &self.cancelled.get())
            .finish()
    }
}
