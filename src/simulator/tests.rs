use std::cell::RefCell;
use std::rc::Rc;

use chrono::TimeDelta;
use rand::Rng;
use tracing_test::traced_test;

use super::*;
use crate::error::ActionError;
use crate::time::{Minutes, SimTimeCalendar, SimTimeDouble, SimTimeLong};

type Sim = Simulator<SimTimeDouble>;
type Log<V> = Rc<RefCell<Vec<V>>>;

fn d(v: f64) -> SimTimeDouble {
    SimTimeDouble::new(v).unwrap()
}

fn log<V>() -> Log<V> {
    Rc::new(RefCell::new(Vec::new()))
}

fn replication(end: f64) -> ReplicationConfig<SimTimeDouble> {
    ReplicationConfig::new("rep-1", SimTimeDouble::ZERO, d(end)).unwrap()
}

/// Initialize `sim` with a model that schedules one event per time in
/// `times`, each appending the clock to `out`.
fn init_with_times(sim: &mut Sim, end: f64, times: &[f64], out: &Log<f64>) {
    let times = times.to_vec();
    let out = Rc::clone(out);
    sim.initialize(replication(end), &mut move |sim: &mut Sim| -> ActionResult {
        for &t in &times {
            let out = Rc::clone(&out);
            sim.schedule_at(d(t), move |s| {
                out.borrow_mut().push(s.simulator_time().value());
                Ok(())
            })?;
        }
        Ok(())
    })
    .unwrap();
}

fn record_kinds(sim: &mut Sim) -> Log<SimulatorEventKind> {
    let kinds = log();
    let sink = Rc::clone(&kinds);
    sim.add_listener(move |e: &SimulatorEvent<SimTimeDouble>| sink.borrow_mut().push(e.kind()));
    kinds
}

// ── Ordering ──────────────────────────────────────────────────────────

#[test]
fn test_events_execute_in_time_then_insertion_order() {
    let mut sim = Sim::new("order");
    let out = log();
    init_with_times(&mut sim, 100.0, &[5.0, 3.0, 3.0, 8.0], &out);
    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![3.0, 3.0, 5.0, 8.0]);
    assert_eq!(sim.events_processed(), 4);
}

#[test]
fn test_priority_breaks_ties_at_same_time() {
    let mut sim = Sim::new("priority");
    let out: Log<&'static str> = log();
    sim.initialize(replication(10.0), &mut |_: &mut Sim| -> ActionResult { Ok(()) })
        .unwrap();
    for (label, priority) in [("low", Priority::LOW), ("high", Priority::HIGH), ("normal", Priority::NORMAL)] {
        let out = Rc::clone(&out);
        sim.schedule_event_abs(d(1.0), priority, move |_| {
            out.borrow_mut().push(label);
            Ok(())
        })
        .unwrap();
    }
    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec!["high", "normal", "low"]);
}

fn chain(left: u32, count: Rc<RefCell<u32>>) -> Action<SimTimeDouble> {
    Box::new(move |sim: &mut Sim| {
        *count.borrow_mut() += 1;
        if left > 0 {
            let now = sim.simulator_time();
            sim.schedule(EventSpec::at(now, chain(left - 1, Rc::clone(&count))))?;
        }
        Ok(())
    })
}

#[test]
fn test_self_scheduling_at_same_time_terminates() {
    let mut sim = Sim::new("chain");
    let count = Rc::new(RefCell::new(0));
    let c = Rc::clone(&count);
    sim.initialize(replication(100.0), &mut move |sim: &mut Sim| -> ActionResult {
        sim.schedule(EventSpec::at(d(10.0), chain(100, Rc::clone(&c))))?;
        Ok(())
    })
    .unwrap();

    sim.start().unwrap();
    // The first event plus exactly 100 follow-ups.
    assert_eq!(*count.borrow(), 101);
    assert_eq!(sim.events_processed(), 101);
    assert_eq!(sim.simulator_time(), d(10.0));
    assert_eq!(sim.state(), RunState::Ended);
}

#[test]
fn test_schedule_now_runs_after_pending_simultaneous_events() {
    let mut sim = Sim::new("now");
    let out: Log<&'static str> = log();
    let o = Rc::clone(&out);
    sim.initialize(replication(10.0), &mut move |sim: &mut Sim| -> ActionResult {
        let first = Rc::clone(&o);
        sim.schedule_at(d(2.0), move |sim| {
            first.borrow_mut().push("first");
            let later = Rc::clone(&first);
            sim.schedule_now(move |_| {
                later.borrow_mut().push("scheduled-now");
                Ok(())
            })?;
            Ok(())
        })?;
        let second = Rc::clone(&o);
        sim.schedule_at(d(2.0), move |_| {
            second.borrow_mut().push("second");
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec!["first", "second", "scheduled-now"]);
}

// ── Run up to ─────────────────────────────────────────────────────────

#[test]
fn test_run_up_to_excludes_target() {
    let mut sim = Sim::new("open");
    let out = log();
    init_with_times(&mut sim, 100.0, &[10.0, 50.0, 90.0], &out);

    sim.run_up_to(d(50.0)).unwrap();
    assert_eq!(*out.borrow(), vec![10.0]);
    assert_eq!(sim.simulator_time(), d(50.0));
    assert_eq!(sim.pending_events(), 2);
    assert_eq!(sim.state(), RunState::Stopped);

    // The event at exactly 50 runs on the next advance.
    sim.run_up_to(d(50.5)).unwrap();
    assert_eq!(*out.borrow(), vec![10.0, 50.0]);
    assert_eq!(sim.pending_events(), 1);
}

#[test]
fn test_run_up_to_inclusive_executes_target() {
    let mut sim = Sim::new("closed");
    let out = log();
    init_with_times(&mut sim, 100.0, &[10.0, 50.0, 90.0], &out);

    sim.run_up_to_inclusive(d(50.0)).unwrap();
    assert_eq!(*out.borrow(), vec![10.0, 50.0]);
    assert_eq!(sim.simulator_time(), d(50.0));
    assert_eq!(sim.pending_events(), 1);
    assert_eq!(sim.next_event_time(), Some(d(90.0)));
}

#[test]
fn test_step_executes_event_left_at_target() {
    let mut sim = Sim::new("open-step");
    let out = log();
    init_with_times(&mut sim, 100.0, &[50.0], &out);
    sim.run_up_to(d(50.0)).unwrap();
    assert!(out.borrow().is_empty());
    let outcome = sim.step().unwrap();
    assert!(matches!(outcome, StepOutcome::Executed { time, .. } if time == d(50.0)));
    assert_eq!(*out.borrow(), vec![50.0]);
}

#[test]
fn test_run_up_to_past_target_rejected() {
    let mut sim = Sim::new("past");
    let out = log();
    init_with_times(&mut sim, 100.0, &[], &out);
    sim.run_up_to(d(20.0)).unwrap();
    let err = sim.run_up_to(d(10.0)).unwrap_err();
    assert!(matches!(err, KernelError::PastScheduling { .. }));
    assert_eq!(sim.simulator_time(), d(20.0));
}

#[test]
fn test_run_up_to_beyond_end_ends_replication() {
    let mut sim = Sim::new("beyond");
    let out = log();
    init_with_times(&mut sim, 30.0, &[10.0, 40.0], &out);
    sim.run_up_to(d(500.0)).unwrap();
    assert_eq!(*out.borrow(), vec![10.0]);
    assert_eq!(sim.state(), RunState::Ended);
}

// ── Errors raised by actions ──────────────────────────────────────────

#[test]
fn test_failing_action_does_not_stop_run() {
    let mut sim = Sim::new("failure");
    let kinds = record_kinds(&mut sim);
    let out = log();
    let o = Rc::clone(&out);
    sim.initialize(replication(100.0), &mut move |sim: &mut Sim| -> ActionResult {
        sim.schedule_at(d(20.0), |_| Err("breakdown".into()))?;
        let late = Rc::clone(&o);
        sim.schedule_at(d(25.0), move |s| {
            late.borrow_mut().push(s.simulator_time().value());
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![25.0]);
    let kinds = kinds.borrow();
    assert!(kinds.contains(&SimulatorEventKind::ActionFailed));
    assert_eq!(kinds.last(), Some(&SimulatorEventKind::EndReplication));
}

#[test]
fn test_panicking_action_is_contained() {
    let mut sim = Sim::new("panic");
    let failures: Log<ActionFailure<SimTimeDouble>> = log();
    let sink = Rc::clone(&failures);
    sim.add_listener_for(&[SimulatorEventKind::ActionFailed], move |e: &SimulatorEvent<SimTimeDouble>| {
        if let SimulatorEvent::ActionFailed(f) = e {
            sink.borrow_mut().push(f.clone());
        }
    });
    let out = log();
    init_with_times(&mut sim, 100.0, &[7.0], &out);
    sim.schedule(EventSpec::at(d(3.0), |_| panic!("gear jammed")).with_source("machine"))
        .unwrap();

    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![7.0]);
    let failures = failures.borrow();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].time, d(3.0));
    assert_eq!(failures[0].source.as_deref(), Some("machine"));
    assert!(failures[0].message.contains("gear jammed"));
}

#[traced_test]
#[test]
fn test_action_failure_is_logged() {
    let mut sim = Sim::new("logged");
    let out = log();
    init_with_times(&mut sim, 10.0, &[], &out);
    sim.schedule_at(d(1.0), |_| Err(ActionError::from("disk full")))
        .unwrap();
    sim.start().unwrap();
    assert!(logs_contain("event action failed"));
    assert!(logs_contain("disk full"));
}

#[test]
fn test_past_scheduling_rejected() {
    let mut sim = Sim::new("past-schedule");
    let out = log();
    init_with_times(&mut sim, 100.0, &[], &out);
    sim.run_up_to(d(20.0)).unwrap();

    let err = sim.schedule_at(d(5.0), |_| Ok(())).unwrap_err();
    assert_eq!(
        err,
        KernelError::PastScheduling {
            requested: "5".to_string(),
            current: "20".to_string(),
        }
    );
    assert_eq!(sim.pending_events(), 0);
    // Scheduling at exactly now is fine.
    assert!(sim.schedule_at(d(20.0), |_| Ok(())).is_ok());
}

#[test]
fn test_nested_start_rejected() {
    let mut sim = Sim::new("nested");
    let results: Log<KernelResult<()>> = log();
    let r = Rc::clone(&results);
    sim.initialize(replication(10.0), &mut move |sim: &mut Sim| -> ActionResult {
        let r = Rc::clone(&r);
        sim.schedule_at(d(1.0), move |sim| {
            r.borrow_mut().push(sim.start());
            r.borrow_mut().push(sim.step().map(|_| ()));
            r.borrow_mut().push(sim.run_up_to(d(5.0)));
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    sim.start().unwrap();
    assert_eq!(
        *results.borrow(),
        vec![
            Err(KernelError::AlreadyRunning),
            Err(KernelError::AlreadyRunning),
            Err(KernelError::AlreadyRunning),
        ]
    );
}

// ── State machine ─────────────────────────────────────────────────────

#[test]
fn test_operations_require_initialize() {
    let mut sim = Sim::new("fresh");
    assert_eq!(sim.state(), RunState::Initial);
    assert!(matches!(sim.start(), Err(KernelError::InvalidState { .. })));
    assert!(matches!(sim.step(), Err(KernelError::InvalidState { .. })));
    assert!(matches!(sim.end_replication(), Err(KernelError::InvalidState { .. })));
}

#[test]
fn test_step_semantics() {
    let mut sim = Sim::new("step");
    let out = log();
    init_with_times(&mut sim, 20.0, &[1.0, 2.0, 30.0], &out);

    assert!(matches!(sim.step().unwrap(), StepOutcome::Executed { time, .. } if time == d(1.0)));
    assert_eq!(sim.state(), RunState::Stopped);
    assert!(matches!(sim.step().unwrap(), StepOutcome::Executed { time, .. } if time == d(2.0)));
    assert_eq!(*out.borrow(), vec![1.0, 2.0]);

    // Next event lies past the end time.
    assert_eq!(sim.step().unwrap(), StepOutcome::Ended);
    assert_eq!(sim.state(), RunState::Ended);
    assert!(matches!(sim.step(), Err(KernelError::InvalidState { .. })));
}

#[test]
fn test_step_on_empty_list_is_idle() {
    let mut sim = Sim::new("idle");
    let out = log();
    init_with_times(&mut sim, 20.0, &[], &out);
    assert_eq!(sim.step().unwrap(), StepOutcome::Idle);
    assert_eq!(sim.state(), RunState::Stopped);
}

#[test]
fn test_stop_from_action_then_resume() {
    let mut sim = Sim::new("stop");
    let out = log();
    init_with_times(&mut sim, 100.0, &[1.0, 3.0], &out);
    sim.schedule_at(d(2.0), |sim| {
        sim.stop();
        Ok(())
    })
    .unwrap();

    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![1.0]);
    assert_eq!(sim.simulator_time(), d(2.0));
    assert_eq!(sim.state(), RunState::Stopped);

    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![1.0, 3.0]);
    assert_eq!(sim.state(), RunState::Ended);
}

#[test]
fn test_events_past_end_time_are_not_executed() {
    let mut sim = Sim::new("end");
    let out = log();
    init_with_times(&mut sim, 50.0, &[10.0, 50.0, 60.0], &out);
    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![10.0, 50.0]);
    assert_eq!(sim.pending_events(), 1);
    assert_eq!(sim.simulator_time(), d(50.0));
    assert_eq!(sim.state(), RunState::Ended);
}

#[test]
fn test_end_replication_from_stopped() {
    let mut sim = Sim::new("end-now");
    let kinds = record_kinds(&mut sim);
    let out = log();
    init_with_times(&mut sim, 50.0, &[10.0], &out);
    sim.end_replication().unwrap();
    assert_eq!(sim.state(), RunState::Ended);
    assert_eq!(kinds.borrow().last(), Some(&SimulatorEventKind::EndReplication));
    assert!(out.borrow().is_empty());
}

#[test]
fn test_end_replication_from_action() {
    let mut sim = Sim::new("end-inside");
    let out = log();
    init_with_times(&mut sim, 50.0, &[10.0, 20.0], &out);
    sim.schedule_at(d(15.0), |sim| {
        sim.end_replication()?;
        Ok(())
    })
    .unwrap();
    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![10.0]);
    assert_eq!(sim.state(), RunState::Ended);
}

#[test]
fn test_model_construction_failure() {
    let mut sim = Sim::new("broken-model");
    let err = sim
        .initialize(replication(10.0), &mut |sim: &mut Sim| -> ActionResult {
            sim.schedule_at(d(1.0), |_| Ok(()))?;
            Err("missing parameter".into())
        })
        .unwrap_err();
    assert_eq!(err, KernelError::ModelConstruction("missing parameter".to_string()));
    assert_eq!(sim.state(), RunState::Initial);
    assert_eq!(sim.pending_events(), 0);
}

#[test]
fn test_reinitialize_resets_replication_state() {
    let mut sim = Sim::new("again");
    let out = log();
    init_with_times(&mut sim, 50.0, &[10.0, 20.0, 99.0], &out);
    sim.start().unwrap();
    assert_eq!(sim.events_processed(), 2);

    init_with_times(&mut sim, 50.0, &[5.0], &out);
    assert_eq!(sim.state(), RunState::Stopped);
    assert_eq!(sim.simulator_time(), SimTimeDouble::ZERO);
    assert_eq!(sim.events_processed(), 0);
    assert_eq!(sim.pending_events(), 1);
    let first = sim.event_list().peek_first().unwrap();
    assert_eq!(first.id().raw(), 0);
    assert_ne!(first.id(), EventId::new(0));
}

// ── Cancellation ──────────────────────────────────────────────────────

#[test]
fn test_cancelled_events_are_skipped() {
    let mut sim = Sim::new("cancel");
    let out = log();
    init_with_times(&mut sim, 100.0, &[1.0], &out);

    let flagged = {
        let out = Rc::clone(&out);
        sim.schedule_at(d(2.0), move |_| {
            out.borrow_mut().push(-2.0);
            Ok(())
        })
        .unwrap()
    };
    let removed = {
        let out = Rc::clone(&out);
        sim.schedule_at(d(3.0), move |_| {
            out.borrow_mut().push(-3.0);
            Ok(())
        })
        .unwrap()
    };

    flagged.cancel();
    assert!(sim.cancel_event(&removed));
    assert!(!sim.cancel_event(&removed));
    assert_eq!(sim.pending_events(), 2);

    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![1.0]);
    assert_eq!(sim.events_processed(), 1);
}

#[test]
fn test_handle_from_earlier_replication_cancels_nothing() {
    let mut sim = Sim::new("stale");
    let out = log();
    init_with_times(&mut sim, 100.0, &[], &out);
    let stale = sim.schedule_at(d(5.0), |_| Ok(())).unwrap();

    init_with_times(&mut sim, 100.0, &[7.0], &out);
    let fresh = sim.event_list().peek_first().unwrap().handle();
    assert_eq!(stale.id().raw(), fresh.id().raw());

    assert!(!sim.cancel_event(&stale));
    assert_eq!(sim.pending_events(), 1);
    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![7.0]);
}

#[test]
fn test_next_event_time_skips_flagged_events() {
    let mut sim = Sim::new("peek");
    let out = log();
    init_with_times(&mut sim, 100.0, &[4.0, 9.0], &out);
    sim.event_list().peek_first().unwrap().handle().cancel();

    assert_eq!(sim.next_event_time(), Some(d(9.0)));
    assert_eq!(sim.pending_events(), 2);
    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![9.0]);
}

#[test]
fn test_action_cancels_later_event() {
    let mut sim = Sim::new("cancel-inside");
    let out = log();
    init_with_times(&mut sim, 100.0, &[], &out);
    let victim = {
        let out = Rc::clone(&out);
        sim.schedule_at(d(8.0), move |_| {
            out.borrow_mut().push(8.0);
            Ok(())
        })
        .unwrap()
    };
    sim.schedule_at(d(4.0), move |sim| {
        sim.cancel_event(&victim);
        Ok(())
    })
    .unwrap();
    sim.start().unwrap();
    assert!(out.borrow().is_empty());
    assert_eq!(sim.simulator_time(), d(4.0));
}

// ── Notifications ─────────────────────────────────────────────────────

#[test]
fn test_notification_sequence() {
    let mut sim = Sim::new("notify");
    let kinds = record_kinds(&mut sim);
    let out = log();
    init_with_times(&mut sim, 100.0, &[5.0], &out);
    sim.start().unwrap();

    use SimulatorEventKind::*;
    assert_eq!(
        *kinds.borrow(),
        vec![StartReplication, Start, TimeChanged, Stop, EndReplication]
    );
}

#[test]
fn test_time_changed_only_when_clock_advances() {
    let mut sim = Sim::new("time-changed");
    let times: Log<SimTimeDouble> = log();
    let sink = Rc::clone(&times);
    sim.add_listener_for(&[SimulatorEventKind::TimeChanged], move |e: &SimulatorEvent<SimTimeDouble>| {
        sink.borrow_mut().push(e.time())
    });
    let out = log();
    init_with_times(&mut sim, 100.0, &[0.0, 3.0, 3.0, 8.0], &out);
    sim.start().unwrap();
    assert_eq!(*times.borrow(), vec![d(3.0), d(8.0)]);
}

#[test]
fn test_run_up_to_reports_target_time() {
    let mut sim = Sim::new("target");
    let times: Log<SimTimeDouble> = log();
    let sink = Rc::clone(&times);
    sim.add_listener_for(&[SimulatorEventKind::TimeChanged], move |e: &SimulatorEvent<SimTimeDouble>| {
        sink.borrow_mut().push(e.time())
    });
    let out = log();
    init_with_times(&mut sim, 100.0, &[10.0], &out);
    sim.run_up_to(d(40.0)).unwrap();
    assert_eq!(*times.borrow(), vec![d(10.0), d(40.0)]);
}

#[test]
fn test_remove_listener_stops_delivery() {
    let mut sim = Sim::new("unsubscribe");
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let id = sim.add_listener(move |_: &SimulatorEvent<SimTimeDouble>| *sink.borrow_mut() += 1);
    let out = log();
    init_with_times(&mut sim, 100.0, &[1.0], &out);
    assert_eq!(*count.borrow(), 1);
    assert!(sim.remove_listener(id));
    sim.start().unwrap();
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn test_warmup_fires_before_model_events_at_same_time() {
    let mut sim = Sim::new("warmup");
    let order: Log<String> = log();
    let sink = Rc::clone(&order);
    sim.add_listener_for(&[SimulatorEventKind::Warmup], move |e: &SimulatorEvent<SimTimeDouble>| {
        sink.borrow_mut().push(format!("warmup@{}", e.time()))
    });
    let rep = replication(100.0).with_warmup_period(20.0).unwrap();
    let o = Rc::clone(&order);
    sim.initialize(rep, &mut move |sim: &mut Sim| -> ActionResult {
        let o = Rc::clone(&o);
        sim.schedule_event_abs(d(20.0), Priority::HIGHEST, move |_| {
            o.borrow_mut().push("model@20".to_string());
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();
    sim.start().unwrap();
    assert_eq!(*order.borrow(), vec!["warmup@20".to_string(), "model@20".to_string()]);
}

// ── Determinism ───────────────────────────────────────────────────────

/// Random arrivals that each schedule a departure.
fn random_model(sim: &mut Sim) -> ActionResult {
    fn arrival(sim: &mut Sim) -> ActionResult {
        let gap: f64 = sim.rng().gen_range(0.1..2.0);
        let service: f64 = sim.rng().gen_range(0.1..1.5);
        sim.schedule_after(service, |_| Ok(()))?;
        sim.schedule(EventSpec::at(sim.simulator_time().plus(gap)?, arrival).with_source("arrival"))?;
        Ok(())
    }
    sim.schedule_at(SimTimeDouble::ZERO, arrival)?;
    Ok(())
}

fn run_traced(seed: u64) -> ExecutionTrace<SimTimeDouble> {
    let mut sim = Sim::new("random");
    sim.enable_trace();
    sim.initialize(replication(50.0).with_seed(seed), &mut random_model)
        .unwrap();
    sim.start().unwrap();
    sim.trace().cloned().unwrap()
}

#[test]
fn test_same_seed_same_trace() {
    let a = run_traced(7);
    let b = run_traced(7);
    assert!(a.len() > 10);
    assert_eq!(a.trace_hash(), b.trace_hash());
    assert_eq!(a.first_divergence(&b), None);
}

#[test]
fn test_different_seed_different_trace() {
    let a = run_traced(7);
    let c = run_traced(8);
    assert_ne!(a.trace_hash(), c.trace_hash());
}

#[test]
fn test_trace_records_execution_order() {
    let mut sim = Sim::new("traced");
    sim.enable_trace();
    let out = log();
    init_with_times(&mut sim, 100.0, &[4.0, 2.0], &out);
    sim.start().unwrap();
    let trace = sim.trace().unwrap();
    let times: Vec<SimTimeDouble> = trace.entries().iter().map(|e| e.time).collect();
    assert_eq!(times, vec![d(2.0), d(4.0)]);
    assert_eq!(trace.entries()[0].id, EventId::new(1));
}

// ── Other time representations ────────────────────────────────────────

#[test]
fn test_long_time_relative_scheduling() {
    let mut sim: Simulator<SimTimeLong> = Simulator::new("long");
    let rep = ReplicationConfig::with_run_length("r", SimTimeLong::new(100), 1_000).unwrap();
    let out: Log<i64> = log();
    let o = Rc::clone(&out);
    sim.initialize(rep, &mut move |sim: &mut Simulator<SimTimeLong>| -> ActionResult {
        let o = Rc::clone(&o);
        sim.schedule_after(25, move |sim| {
            o.borrow_mut().push(sim.simulator_time().ticks());
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();
    sim.start().unwrap();
    assert_eq!(*out.borrow(), vec![125]);
}

#[test]
fn test_calendar_time_scheduling() {
    type Cal = SimTimeCalendar<Minutes>;
    let mut sim: Simulator<Cal> = Simulator::new("calendar");
    let rep = ReplicationConfig::with_run_length("day", Cal::EPOCH, TimeDelta::hours(24)).unwrap();
    sim.initialize(rep, &mut |sim: &mut Simulator<Cal>| -> ActionResult {
        sim.schedule_after(TimeDelta::minutes(90), |_| Ok(()))?;
        Ok(())
    })
    .unwrap();
    sim.start().unwrap();
    assert_eq!(sim.simulator_time(), Cal::from_ticks(90));
}

#[test]
fn test_debug_output() {
    let sim = Sim::new("debuggable");
    let text = format!("{:?}", sim);
    assert!(text.contains("debuggable"));
    assert!(text.contains("Initial"));
    assert_eq!(RunState::Stepping.to_string(), "STEPPING");
}
