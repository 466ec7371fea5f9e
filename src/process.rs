//! Process-oriented modelling on top of events.
//!
//! A process is a procedure that waits for simulated time to pass. Instead
//! of blocking a thread it is written as a state machine: each call to
//! [`Process::resume`] runs until the next wait and returns a [`Suspend`]
//! telling the kernel when to call it again. Every resumption is an
//! ordinary event on the simulator's event list, so processes interleave
//! with plain events under the same ordering rules.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::debug;

use crate::error::{ActionError, ActionResult, KernelResult};
use crate::event::{EventHandle, EventSpec};
use crate::simulator::Simulator;
use crate::time::SimTime;

/// What a process does after returning from `resume`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Suspend<T: SimTime> {
    /// Resume after this delay.
    Hold(T::Relative),
    /// Sleep until [`ProcessHandle::activate`] is called.
    Passivate,
    /// Finished.
    Terminate,
}

/// A resumable procedure.
pub trait Process<T: SimTime> {
    fn resume(&mut self, sim: &mut Simulator<T>) -> Result<Suspend<T>, ActionError>;
}

impl<T, F> Process<T> for F
where
    T: SimTime,
    F: FnMut(&mut Simulator<T>) -> Result<Suspend<T>, ActionError>,
{
    fn resume(&mut self, sim: &mut Simulator<T>) -> Result<Suspend<T>, ActionError> {
        (self)(sim)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// A resumption event is pending.
    Scheduled,
    /// Inside `resume`.
    Running,
    /// Waiting for `activate`.
    Passive,
    /// Finished, cancelled, or failed.
    Terminated,
}

struct Slot<T: SimTime> {
    name: String,
    state: ProcessState,
    process: Option<Box<dyn Process<T>>>,
    pending: Option<EventHandle<T>>,
}

/// Shared handle to a spawned process.
pub struct ProcessHandle<T: SimTime> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T: SimTime> Clone for ProcessHandle<T> {
    fn clone(&self) -> Self {
        ProcessHandle {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: SimTime> ProcessHandle<T> {
    /// Start `process` at the current time.
    pub fn spawn(
        sim: &mut Simulator<T>,
        name: impl Into<String>,
        process: impl Process<T> + 'static,
    ) -> KernelResult<Self> {
        let at = sim.simulator_time();
        Self::spawn_at(sim, name, at, process)
    }

    /// Start `process` at absolute time `at`.
    pub fn spawn_at(
        sim: &mut Simulator<T>,
        name: impl Into<String>,
        at: T,
        process: impl Process<T> + 'static,
    ) -> KernelResult<Self> {
        let handle = ProcessHandle {
            slot: Rc::new(RefCell::new(Slot {
                name: name.into(),
                state: ProcessState::Scheduled,
                process: Some(Box::new(process)),
                pending: None,
            })),
        };
        handle.schedule_resume(sim, at)?;
        Ok(handle)
    }

    pub fn name(&self) -> String {
        self.slot.borrow().name.clone()
    }

    pub fn state(&self) -> ProcessState {
        self.slot.borrow().state
    }

    /// Wake a passive process at the current time.
    ///
    /// Returns `false` if the process was not passive.
    pub fn activate(&self, sim: &mut Simulator<T>) -> KernelResult<bool> {
        if self.state() != ProcessState::Passive {
            return Ok(false);
        }
        let now = sim.simulator_time();
        self.schedule_resume(sim, now)?;
        Ok(true)
    }

    /// Cut a hold short and resume at the current time.
    ///
    /// Returns `false` unless the process was waiting on a resumption event.
    pub fn interrupt(&self, sim: &mut Simulator<T>) -> KernelResult<bool> {
        let pending = {
            let mut slot = self.slot.borrow_mut();
            if slot.state != ProcessState::Scheduled {
                return Ok(false);
            }
            slot.pending.take()
        };
        if let Some(handle) = pending {
            sim.cancel_event(&handle);
        }
        debug!(process = %self.name(), "process interrupted");
        let now = sim.simulator_time();
        self.schedule_resume(sim, now)?;
        Ok(true)
    }

    /// Terminate the process and drop its pending resumption.
    ///
    /// Returns `false` if it had already terminated.
    pub fn cancel(&self, sim: &mut Simulator<T>) -> bool {
        let pending = {
            let mut slot = self.slot.borrow_mut();
            if slot.state == ProcessState::Terminated {
                return false;
            }
            slot.state = ProcessState::Terminated;
            slot.process = None;
            slot.pending.take()
        };
        if let Some(handle) = pending {
            sim.cancel_event(&handle);
        }
        true
    }

    fn schedule_resume(&self, sim: &mut Simulator<T>, at: T) -> KernelResult<()> {
        let slot = Rc::clone(&self.slot);
        let source = self.name();
        let spec = EventSpec::at(at, move |sim: &mut Simulator<T>| run_step(&slot, sim)).with_source(source);
        let event = sim.schedule(spec)?;
        let mut slot = self.slot.borrow_mut();
        slot.pending = Some(event);
        slot.state = ProcessState::Scheduled;
        Ok(())
    }
}

fn run_step<T: SimTime>(slot: &Rc<RefCell<Slot<T>>>, sim: &mut Simulator<T>) -> ActionResult {
    let mut process = {
        let mut s = slot.borrow_mut();
        s.pending = None;
        match s.process.take() {
            Some(process) => process,
            None => return Ok(()),
        }
    };
    slot.borrow_mut().state = ProcessState::Running;

    let handle = ProcessHandle {
        slot: Rc::clone(slot),
    };
    // A panic still ends the process; the kernel reports it as a failure.
    let suspend = match panic::catch_unwind(AssertUnwindSafe(|| process.resume(sim))) {
        Ok(Ok(suspend)) => suspend,
        Ok(Err(e)) => {
            terminate(slot);
            return Err(e);
        }
        Err(payload) => {
            terminate(slot);
            panic::resume_unwind(payload);
        }
    };

    // Cancelled from inside its own resume.
    if slot.borrow().state == ProcessState::Terminated {
        return Ok(());
    }

    match suspend {
        Suspend::Hold(delay) => {
            slot.borrow_mut().process = Some(process);
            let resumed = sim
                .simulator_time()
                .plus(delay)
                .and_then(|at| handle.schedule_resume(sim, at));
            if let Err(e) = resumed {
                terminate(slot);
                return Err(e.into());
            }
        }
        Suspend::Passivate => {
            let mut s = slot.borrow_mut();
            s.process = Some(process);
            s.state = ProcessState::Passive;
        }
        Suspend::Terminate => {
            debug!(process = %handle.name(), "process terminated");
            terminate(slot);
        }
    }
    Ok(())
}

fn terminate<T: SimTime>(slot: &Rc<RefCell<Slot<T>>>) {
    let mut s = slot.borrow_mut();
    s.state = ProcessState::Terminated;
    s.process = None;
    s.pending = None;
}

impl<T: SimTime> fmt::Debug for ProcessHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("ProcessHandle")
            .field("name", &slot.name)
            .field("state", &slot.state)
            .finish()
    }
}
