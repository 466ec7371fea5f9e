//! Ordered pending-event set.
//!
//! Backed by a `BTreeMap` ordered by `(time, priority, id)` so insert,
//! remove and peek-first are all O(log n). Two side indexes find an event
//! without its full key: one by object identity (what an
//! [`EventHandle`] points at) and one by id (what a remote caller holds).
//! Because event ids are strictly increasing, two runs with the same
//! insertion sequence always produce the same pop order.

use std::collections::{BTreeMap, HashMap};

use crate::error::{KernelError, KernelResult};
use crate::event::{Event, EventHandle, EventId, EventKey, EventRef};
use crate::time::SimTime;

/// Position in the queue. The trailing counter keeps distinct events with
/// equal keys apart, in insertion order.
type Slot<T> = (EventKey<T>, u64);

/// The simulator's event list.
///
/// The first entry (smallest `(time, priority, id)`) is always the next
/// event to execute.
pub struct EventList<T: SimTime> {
    queue: BTreeMap<Slot<T>, Event<T>>,
    by_ref: HashMap<EventRef, Slot<T>>,
    by_id: HashMap<EventId, EventRef>,
    inserted: u64,
}

impl<T: SimTime> EventList<T> {
    /// Create a new, empty event list.
    pub fn new() -> Self {
        EventList {
            queue: BTreeMap::new(),
            by_ref: HashMap::new(),
            by_id: HashMap::new(),
            inserted: 0,
        }
    }

    /// Insert an event.
    ///
    /// Fails with `DuplicateSchedule` if this very event is already
    /// pending. Distinct events with equal keys are accepted and keep
    /// their insertion order.
    pub fn insert(&mut self, event: Event<T>) -> KernelResult<()> {
        let identity = event.identity();
        let key = event.key();
        if self.by_ref.contains_key(&identity) {
            return Err(KernelError::DuplicateSchedule(key.id));
        }
        let slot = (key, self.inserted);
        self.inserted += 1;
        self.by_ref.insert(identity, slot);
        self.by_id.insert(key.id, identity);
        self.queue.insert(slot, event);
        Ok(())
    }

    /// Peek at the next event without removing it.
    pub fn peek_first(&self) -> Option<&Event<T>> {
        self.queue.first_key_value().map(|(_, event)| event)
    }

    /// Pop the next event (earliest time, most urgent priority, lowest id).
    ///
    /// Returns `None` when the list is empty.
    pub fn pop_first(&mut self) -> Option<Event<T>> {
        let (_, event) = self.queue.pop_first()?;
        self.unindex(&event);
        Some(event)
    }

    /// Remove the event `handle` refers to. Returns it if it was pending.
    ///
    /// A handle to an event that already ran, was removed, or belongs to
    /// another list never matches.
    pub fn remove(&mut self, handle: &EventHandle<T>) -> Option<Event<T>> {
        self.remove_ref(handle.identity())
    }

    /// Remove the pending event with this id. When hand-built events share
    /// an id, the most recently inserted one is removed.
    pub fn remove_id(&mut self, id: EventId) -> Option<Event<T>> {
        let identity = *self.by_id.get(&id)?;
        self.remove_ref(identity)
    }

    fn remove_ref(&mut self, identity: EventRef) -> Option<Event<T>> {
        let slot = self.by_ref.get(&identity)?;
        let event = self.queue.remove(slot)?;
        self.unindex(&event);
        Some(event)
    }

    fn unindex(&mut self, event: &Event<T>) {
        let identity = event.identity();
        self.by_ref.remove(&identity);
        if self.by_id.get(&event.id()) == Some(&identity) {
            self.by_id.remove(&event.id());
        }
    }

    /// Whether the event `handle` refers to is pending.
    pub fn contains(&self, handle: &EventHandle<T>) -> bool {
        self.by_ref.contains_key(&handle.identity())
    }

    /// Whether an event with this id is pending.
    pub fn contains_id(&self, id: EventId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Drop every pending event.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.by_ref.clear();
        self.by_id.clear();
    }

    /// Returns the number of pending events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if no events are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Iterate pending events in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Event<T>> {
        self.queue.values()
    }

    /// Drain all events in execution order into a `Vec`.
    pub fn drain_ordered(&mut self) -> Vec<Event<T>> {
        self.by_ref.clear();
        self.by_id.clear();
        std::mem::take(&mut self.queue).into_values().collect()
    }
}

impl<T: SimTime> Default for EventList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SimTime> std::fmt::Debug for EventList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.queue.values()).finish()
    }
}
