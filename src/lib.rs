//! # Kairos — Discrete-Event Scheduling Kernel
//!
//! A single-threaded simulator that keeps an ordered list of timestamped
//! events, advances a virtual clock to each event in turn and runs its
//! action. Models are written as ordinary Rust closures that schedule
//! further events; the kernel guarantees that two runs with the same
//! model and seed execute exactly the same events in the same order.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               Simulator                   │ ← run loop, clock, state machine
//! │  ┌─────────────┐   ┌──────────────────┐  │
//! │  │  EventList   │   │    Listeners     │  │ ← ordered events / notifications
//! │  │ (time, prio, │   └──────────────────┘  │
//! │  │     id)      │   ┌──────────────────┐  │
//! │  └─────────────┘   │  Pacing (opt.)   │  │ ← wall-clock decorator
//! │  ┌─────────────┐   └──────────────────┘  │
//! │  │   SimTime    │   ┌──────────────────┐  │
//! │  │ (f64, i64,   │   │  RemoteInbox     │◀─┼── RemoteScheduler (other threads)
//! │  │  calendar)   │   └──────────────────┘  │
//! │  └─────────────┘                          │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use kairos::{ActionResult, ReplicationConfig, SimTimeDouble, Simulator};
//!
//! let mut sim = Simulator::new("hello");
//! let rep = ReplicationConfig::new(
//!     "r1",
//!     SimTimeDouble::ZERO,
//!     SimTimeDouble::new(10.0).unwrap(),
//! )
//! .unwrap();
//! sim.initialize(rep, &mut |sim: &mut Simulator<SimTimeDouble>| -> ActionResult {
//!     sim.schedule_after(2.5, |sim| {
//!         assert_eq!(sim.simulator_time().value(), 2.5);
//!         Ok(())
//!     })?;
//!     Ok(())
//! })
//! .unwrap();
//! sim.start().unwrap();
//! assert_eq!(sim.events_processed(), 1);
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod event_list;
pub mod listener;
pub mod process;
pub mod realtime;
pub mod remote;
pub mod replication;
pub mod simulator;
pub mod time;
pub mod trace;

// Re-exports for convenience.
pub use config::Settings;
pub use error::{ActionError, ActionResult, KernelError, KernelResult};
pub use event::{Action, Event, EventHandle, EventId, EventIdGen, EventKey, EventSpec, Priority};
pub use event_list::EventList;
pub use listener::{ActionFailure, ListenerId, SimulatorEvent, SimulatorEventKind, SimulatorListener};
pub use process::{Process, ProcessHandle, ProcessState, Suspend};
pub use realtime::{Pacing, RealTimePacing};
pub use remote::{RemoteScheduler, RemoteTicket};
pub use replication::{Model, ReplicationConfig};
pub use simulator::{RunState, Simulator, StepOutcome};
pub use time::{
    CalendarUnit, Days, Hours, Millis, Minutes, Seconds, SimTime, SimTimeCalendar, SimTimeDouble,
    SimTimeFloat, SimTimeLong,
};
pub use trace::{ExecutionTrace, TraceEntry};
