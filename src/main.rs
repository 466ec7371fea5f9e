//! Kairos demo CLI
//!
//! Runs a single-server queue (Poisson arrivals, exponential service)
//! on the kernel and prints queue statistics.
//!
//! # Example
//!
//! ```bash
//! # Run the built-in defaults for 100 time units
//! kairos --until 100
//!
//! # Run a replication described by a TOML file, replayed at 50x wall-clock speed
//! kairos --config queue.toml --speed 50 --trace run.trace
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use kairos::{
    ActionResult, EventSpec, KernelError, KernelResult, Model, RealTimePacing, Settings, SimTime, SimTimeDouble,
    Simulator, SimulatorEvent, SimulatorEventKind,
};
use rand::Rng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Kairos single-server queue demo
#[derive(Parser, Debug)]
#[command(name = "kairos")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML settings file. Built-in defaults are used when omitted.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Stop at this simulation time instead of running to the end of the replication
    #[arg(short = 'u', long)]
    until: Option<f64>,

    /// Wall-clock speed factor (simulated seconds per real second)
    #[arg(short = 's', long)]
    speed: Option<f64>,

    /// Override the replication seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write the execution trace to this file
    #[arg(short = 't', long)]
    trace: Option<PathBuf>,
}

type Sim = Simulator<SimTimeDouble>;

#[derive(Debug, Default)]
struct QueueStats {
    arrivals: u64,
    served: u64,
    total_wait: f64,
    max_queue: usize,
    busy: bool,
    queue: VecDeque<SimTimeDouble>,
}

impl QueueStats {
    /// Drop statistics gathered during warm-up but keep the queue itself.
    fn reset_counters(&mut self) {
        self.arrivals = 0;
        self.served = 0;
        self.total_wait = 0.0;
        self.max_queue = self.queue.len();
    }
}

struct QueueModel {
    arrival_rate: f64,
    service_rate: f64,
    stats: Rc<RefCell<QueueStats>>,
}

fn exponential(sim: &mut Sim, rate: f64) -> f64 {
    let u: f64 = sim.rng().gen();
    -(1.0 - u).ln() / rate
}

fn arrival(sim: &mut Sim, arrival_rate: f64, service_rate: f64, stats: Rc<RefCell<QueueStats>>) -> ActionResult {
    let now = sim.simulator_time();
    let start_service = {
        let mut s = stats.borrow_mut();
        s.arrivals += 1;
        if s.busy {
            s.queue.push_back(now);
            s.max_queue = s.max_queue.max(s.queue.len());
            false
        } else {
            s.busy = true;
            true
        }
    };
    if start_service {
        schedule_departure(sim, service_rate, Rc::clone(&stats))?;
    }
    schedule_arrival(sim, arrival_rate, service_rate, stats)
}

fn schedule_arrival(sim: &mut Sim, arrival_rate: f64, service_rate: f64, stats: Rc<RefCell<QueueStats>>) -> ActionResult {
    let gap = exponential(sim, arrival_rate);
    let at = sim.simulator_time().plus(gap)?;
    let action = move |sim: &mut Sim| arrival(sim, arrival_rate, service_rate, stats);
    sim.schedule(EventSpec::at(at, action).with_source("arrival"))?;
    Ok(())
}

fn schedule_departure(sim: &mut Sim, service_rate: f64, stats: Rc<RefCell<QueueStats>>) -> ActionResult {
    let service = exponential(sim, service_rate);
    let at = sim.simulator_time().plus(service)?;
    sim.schedule(EventSpec::at(at, move |sim: &mut Sim| departure(sim, service_rate, stats)).with_source("departure"))?;
    Ok(())
}

fn departure(sim: &mut Sim, service_rate: f64, stats: Rc<RefCell<QueueStats>>) -> ActionResult {
    let now = sim.simulator_time();
    let next_customer = {
        let mut s = stats.borrow_mut();
        s.served += 1;
        let next = s.queue.pop_front();
        match next {
            Some(arrived) => s.total_wait += now.diff(arrived),
            None => s.busy = false,
        }
        next
    };
    if next_customer.is_some() {
        schedule_departure(sim, service_rate, stats)?;
    }
    Ok(())
}

impl Model<SimTimeDouble> for QueueModel {
    fn construct_model(&mut self, sim: &mut Sim) -> ActionResult {
        *self.stats.borrow_mut() = QueueStats::default();
        schedule_arrival(sim, self.arrival_rate, self.service_rate, Rc::clone(&self.stats))?;
        Ok(())
    }
}

fn run(args: &Args) -> KernelResult<()> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(seed) = args.seed {
        settings.replication.seed = seed;
    }
    if settings.replication.run_length.is_none() && args.until.is_none() {
        return Err(KernelError::Config(
            "the queue never drains: set replication.run_length or pass --until".into(),
        ));
    }

    let replication = settings.replication::<SimTimeDouble>()?;
    let mut sim = Sim::new(replication.id().to_string());
    let speed = args
        .speed
        .or_else(|| settings.realtime.as_ref().map(|r| r.speed_factor));
    if let Some(speed) = speed {
        sim.set_pacing(Some(Box::new(RealTimePacing::new(speed)?)));
    }
    if args.trace.is_some() {
        sim.enable_trace();
    }

    let stats = Rc::new(RefCell::new(QueueStats::default()));
    let warm = Rc::clone(&stats);
    sim.add_listener_for(&[SimulatorEventKind::Warmup], move |e: &SimulatorEvent<SimTimeDouble>| {
        info!(time = %e.time(), "resetting statistics after warm-up");
        warm.borrow_mut().reset_counters();
    });

    let mut model = QueueModel {
        arrival_rate: settings.model.arrival_rate,
        service_rate: settings.model.service_rate,
        stats: Rc::clone(&stats),
    };
    info!(
        replication = %replication.id(),
        seed = replication.seed(),
        arrival_rate = model.arrival_rate,
        service_rate = model.service_rate,
        "Starting queue simulation"
    );
    sim.initialize(replication, &mut model)?;

    match args.until {
        Some(until) => sim.run_up_to(SimTimeDouble::new(until)?)?,
        None => sim.start()?,
    }

    let s = stats.borrow();
    println!("═══════════════════════════════════════════════════════");
    println!("  Kairos — single-server queue");
    println!("═══════════════════════════════════════════════════════");
    println!("  Simulation time : {}", sim.simulator_time());
    println!("  Events executed : {}", sim.events_processed());
    println!("  Arrivals        : {}", s.arrivals);
    println!("  Served          : {}", s.served);
    println!("  Max queue       : {}", s.max_queue);
    if s.served > 0 {
        println!("  Mean wait       : {:.4}", s.total_wait / s.served as f64);
    }

    if let (Some(path), Some(trace)) = (&args.trace, sim.trace()) {
        trace
            .export_to_file(path)
            .map_err(|e| KernelError::Config(format!("cannot write trace {}: {}", path.display(), e)))?;
        println!("  Trace hash      : {:016x}", trace.trace_hash());
        println!("  Trace written   : {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    // The logging filter may come from the settings file, so peek at it
    // before anything else logs.
    let filter = args
        .config
        .as_ref()
        .and_then(|path| Settings::load(path).ok())
        .map(|s| s.logging.filter)
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
