//! Cross-thread scheduling.
//!
//! The simulator itself is single-threaded. Other threads (a UI, a network
//! feed) talk to it through a [`RemoteScheduler`], which marshals requests
//! onto a channel. The simulator drains that channel on its own thread
//! before every event pop, so a remote request takes effect between two
//! events and never in the middle of an action.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::{ActionResult, KernelError, KernelResult};
use crate::event::{EventId, Priority};
use crate::simulator::Simulator;
use crate::time::SimTime;

/// An action that may be built on another thread.
pub type RemoteAction<T> = Box<dyn FnOnce(&mut Simulator<T>) -> ActionResult + Send>;

/// When a remotely scheduled event should run.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RemoteWhen<T: SimTime> {
    At(T),
    /// Relative to the simulator clock at the moment the request is applied.
    After(T::Relative),
}

pub(crate) enum RemoteRequest<T: SimTime> {
    Schedule {
        when: RemoteWhen<T>,
        priority: Priority,
        source: Option<String>,
        action: RemoteAction<T>,
        reply: Sender<KernelResult<EventId>>,
    },
    Cancel {
        id: EventId,
        reply: Sender<bool>,
    },
    Stop,
}

/// Receiving side, owned by the simulator.
pub(crate) struct RemoteInbox<T: SimTime> {
    sender: Sender<RemoteRequest<T>>,
    receiver: Receiver<RemoteRequest<T>>,
}

impl<T: SimTime> RemoteInbox<T> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        RemoteInbox { sender, receiver }
    }

    pub(crate) fn scheduler(&self) -> RemoteScheduler<T> {
        RemoteScheduler {
            sender: self.sender.clone(),
        }
    }

    pub(crate) fn try_next(&self) -> Option<RemoteRequest<T>> {
        match self.receiver.try_recv() {
            Ok(request) => Some(request),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Thread-safe handle for scheduling onto a simulator.
///
/// Every call returns immediately with a [`RemoteTicket`]; the outcome is
/// available once the simulator has drained the request.
pub struct RemoteScheduler<T: SimTime> {
    sender: Sender<RemoteRequest<T>>,
}

impl<T: SimTime> Clone for RemoteScheduler<T> {
    fn clone(&self) -> Self {
        RemoteScheduler {
            sender: self.sender.clone(),
        }
    }
}

impl<T: SimTime> std::fmt::Debug for RemoteScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteScheduler")
            .field("queued", &self.sender.len())
            .finish()
    }
}

impl<T: SimTime> RemoteScheduler<T> {
    /// Schedule at absolute time `time` with normal priority.
    pub fn schedule_at<F>(&self, time: T, action: F) -> KernelResult<RemoteTicket<KernelResult<EventId>>>
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + Send + 'static,
    {
        self.schedule_event_abs(time, Priority::NORMAL, action)
    }

    /// Schedule `delay` after whatever the clock reads when the request is applied.
    pub fn schedule_after<F>(
        &self,
        delay: T::Relative,
        action: F,
    ) -> KernelResult<RemoteTicket<KernelResult<EventId>>>
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + Send + 'static,
    {
        self.schedule_event_rel(delay, Priority::NORMAL, action)
    }

    pub fn schedule_event_abs<F>(
        &self,
        time: T,
        priority: Priority,
        action: F,
    ) -> KernelResult<RemoteTicket<KernelResult<EventId>>>
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + Send + 'static,
    {
        self.send_schedule(RemoteWhen::At(time), priority, Box::new(action))
    }

    pub fn schedule_event_rel<F>(
        &self,
        delay: T::Relative,
        priority: Priority,
        action: F,
    ) -> KernelResult<RemoteTicket<KernelResult<EventId>>>
    where
        F: FnOnce(&mut Simulator<T>) -> ActionResult + Send + 'static,
    {
        self.send_schedule(RemoteWhen::After(delay), priority, Box::new(action))
    }

    fn send_schedule(
        &self,
        when: RemoteWhen<T>,
        priority: Priority,
        action: RemoteAction<T>,
    ) -> KernelResult<RemoteTicket<KernelResult<EventId>>> {
        let (reply, receiver) = crossbeam_channel::bounded(1);
        self.send(RemoteRequest::Schedule {
            when,
            priority,
            source: Some("remote".to_string()),
            action,
            reply,
        })?;
        Ok(RemoteTicket { receiver })
    }

    /// Cancel a pending event by id. The ticket resolves to whether it was pending.
    pub fn cancel(&self, id: EventId) -> KernelResult<RemoteTicket<bool>> {
        let (reply, receiver) = crossbeam_channel::bounded(1);
        self.send(RemoteRequest::Cancel { id, reply })?;
        Ok(RemoteTicket { receiver })
    }

    /// Ask a running simulator to stop after the in-flight action.
    pub fn stop(&self) -> KernelResult<()> {
        self.send(RemoteRequest::Stop)
    }

    fn send(&self, request: RemoteRequest<T>) -> KernelResult<()> {
        self.sender
            .send(request)
            .map_err(|_| KernelError::SimulatorGone)
    }
}

/// The eventual reply to a remote request.
#[derive(Debug)]
pub struct RemoteTicket<R> {
    receiver: Receiver<R>,
}

impl<R> RemoteTicket<R> {
    /// Block until the simulator has handled the request.
    pub fn wait(self) -> KernelResult<R> {
        self.receiver.recv().map_err(|_| KernelError::SimulatorGone)
    }

    /// Block for at most `timeout`. `Ok(None)` means not handled yet.
    pub fn wait_timeout(&self, timeout: Duration) -> KernelResult<Option<R>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(reply) => Ok(Some(reply)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(KernelError::SimulatorGone),
        }
    }

    /// Non-blocking poll.
    pub fn try_get(&self) -> KernelResult<Option<R>> {
        match self.receiver.try_recv() {
            Ok(reply) => Ok(Some(reply)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(KernelError::SimulatorGone),
        }
    }
}
