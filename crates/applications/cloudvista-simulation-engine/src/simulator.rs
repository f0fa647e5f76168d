//! Tick-driven scheduling simulator
//!
//! Owns the simulation state, the clock and the active scheduler, and
//! exposes the setup / control / query surface. Each tick runs, in order:
//! clock advance, completion (and round-robin preemption), admission,
//! statistics sampling, and the stop check.

use cloudvista_core::{CloudVistaError, Result, SchedulerKind, SimulationStatus, VmSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::SimulationClock;
use crate::config::SimulationConfig;
use crate::policies::{build_scheduler, Scheduler, TickContext, TickEvents};
use crate::state::SimulationState;
use crate::stats::{timeline, Statistics, StatsCollector, TaskTimeline, UtilizationSample};
use crate::types::{Task, TaskRequest, Vm};

/// Point-in-time view of the simulation for collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: f64,
    pub status: SimulationStatus,
    pub running: bool,
    pub scheduler: Option<SchedulerKind>,
    pub vms: Vec<Vm>,
    pub pending_tasks: Vec<Task>,
    pub running_tasks: Vec<Task>,
    /// In completion order
    pub completed_tasks: Vec<Task>,
}

/// What happened during one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub time: f64,
    pub events: TickEvents,
    pub sample: UtilizationSample,
    pub status: SimulationStatus,
}

/// Result of a bounded run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub ticks: u64,
    pub time: f64,
    pub status: SimulationStatus,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == SimulationStatus::Completed
    }
}

/// Scheduling simulator over a fixed VM pool
pub struct Simulation {
    config: SimulationConfig,
    state: SimulationState,
    clock: SimulationClock,
    scheduler: Option<Box<dyn Scheduler>>,
    stats: StatsCollector,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Simulation {
            clock: SimulationClock::new(config.tick_duration)?,
            stats: StatsCollector::new(config.history_limit),
            state: SimulationState::new(),
            scheduler: None,
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn status(&self) -> SimulationStatus {
        self.clock.status()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn scheduler_kind(&self) -> Option<SchedulerKind> {
        self.scheduler.as_ref().map(|s| s.kind())
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Replace the VM set. Not allowed while a run is active.
    pub fn initialize_vms(&mut self, spec: VmSpec) -> Result<&[Vm]> {
        if self.is_running() {
            return Err(CloudVistaError::AlreadyRunning);
        }
        self.state.initialize_vms(spec)?;
        Ok(self.state.pool().vms())
    }

    /// Submit a task arriving at the current simulated time
    pub fn submit_task(&mut self, request: TaskRequest) -> Result<&Task> {
        let now = self.clock.now();
        let running = self.clock.is_running();
        let task = self.state.submit(request, now)?;

        if running {
            if let Some(scheduler) = self.scheduler.as_mut() {
                scheduler.enqueue(task);
            }
        }
        Ok(task)
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    /// Start a run with the given policy. `quantum` is required for round-robin.
    pub fn start(&mut self, kind: SchedulerKind, quantum: Option<f64>) -> Result<()> {
        if self.clock.is_running() {
            return Err(CloudVistaError::AlreadyRunning);
        }
        if self.state.pool().is_empty() {
            return Err(CloudVistaError::NoVms);
        }
        let pending = self.state.pending().count();
        if pending == 0 {
            return Err(CloudVistaError::NoPendingTasks);
        }

        let mut scheduler = build_scheduler(kind, quantum)?;
        scheduler.prepare(&self.state);
        self.scheduler = Some(scheduler);
        self.clock.start()?;

        info!(
            scheduler = %kind,
            pending,
            vms = self.state.pool().len(),
            time = self.clock.now(),
            "Simulation started"
        );
        Ok(())
    }

    /// User-initiated stop. Task and VM state are kept as they are.
    pub fn stop(&mut self) -> Result<()> {
        self.clock.stop()?;
        info!(time = self.clock.now(), "Simulation stopped");
        Ok(())
    }

    /// Discard all tasks and progress; VMs return to full availability
    pub fn reset(&mut self) {
        self.clock.reset();
        self.state.reset();
        self.stats.clear();
        self.scheduler = None;
        info!("Simulation reset");
    }

    /// Advance the simulation by one tick
    pub fn tick(&mut self) -> Result<TickReport> {
        if !self.clock.is_running() {
            return Err(CloudVistaError::NotRunning);
        }
        let scheduler = self.scheduler.as_mut().ok_or(CloudVistaError::NotRunning)?;

        let now = self.clock.advance();
        let ctx = TickContext {
            now,
            tick_duration: self.clock.tick_duration(),
            epsilon: self.clock.epsilon(),
            rates: self.config.rates,
        };

        let mut events = scheduler.advance(&mut self.state, &ctx)?;
        events.admitted = scheduler.admit(&mut self.state, &ctx)?;

        let sample = self.stats.sample(now, self.state.pool());

        if self.state.all_completed() && !scheduler.has_queued() {
            self.clock.finish();
            info!(
                time = now,
                ticks = self.clock.ticks(),
                completed = self.state.completed_count(),
                "Simulation completed"
            );
        }

        debug!(
            tick = self.clock.ticks(),
            time = now,
            completed = events.completed.len(),
            preempted = events.preempted.len(),
            admitted = events.admitted.len(),
            "Tick"
        );

        Ok(TickReport {
            tick: self.clock.ticks(),
            time: now,
            events,
            sample,
            status: self.clock.status(),
        })
    }

    /// Tick until the run stops or `max_ticks` more ticks have elapsed
    pub fn run(&mut self, max_ticks: u64) -> Result<RunOutcome> {
        let mut ticks = 0;
        while self.clock.is_running() && ticks < max_ticks {
            self.tick()?;
            ticks += 1;
        }
        Ok(RunOutcome {
            ticks,
            time: self.clock.now(),
            status: self.clock.status(),
        })
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            time: self.clock.now(),
            status: self.clock.status(),
            running: self.clock.is_running(),
            scheduler: self.scheduler_kind(),
            vms: self.state.pool().vms().to_vec(),
            pending_tasks: self.state.pending().cloned().collect(),
            running_tasks: self.state.running().cloned().collect(),
            completed_tasks: self.state.completed().cloned().collect(),
        }
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::collect(&self.state)
    }

    pub fn timeline(&self) -> Vec<TaskTimeline> {
        timeline(&self.state)
    }

    pub fn utilization_history(&self) -> Vec<UtilizationSample> {
        self.stats.history()
    }
}
