//! Async host for paced simulation runs
//!
//! Drives ticks from a tokio interval the way the front end drove them from
//! a 100ms timer. The simulation sits behind one mutex: a tick holds the lock
//! for its whole duration, so control operations (stop, reset, queries) only
//! ever see state between ticks, and a stop waits for the in-flight tick.
//!
//! At most one tick loop drives a host. Every start, stop and reset bumps a
//! generation counter under the simulation lock; a loop that wakes up to a
//! newer generation exits without ticking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cloudvista_core::{Result, SchedulerKind};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::simulator::{RunOutcome, Simulation, Snapshot};
use crate::stats::Statistics;

/// Wall-clock pacing between ticks
pub const DEFAULT_PACE: Duration = Duration::from_millis(100);

/// Shared handle to a simulation with a background tick loop
#[derive(Clone)]
pub struct SimulationHost {
    sim: Arc<Mutex<Simulation>>,
    generation: Arc<AtomicU64>,
    pace: Duration,
    max_ticks: Option<u64>,
}

impl SimulationHost {
    pub fn new(sim: Simulation) -> Self {
        Self::with_pace(sim, DEFAULT_PACE)
    }

    /// `Duration::ZERO` runs ticks back to back, yielding between them
    pub fn with_pace(sim: Simulation, pace: Duration) -> Self {
        Self {
            sim: Arc::new(Mutex::new(sim)),
            generation: Arc::new(AtomicU64::new(0)),
            pace,
            max_ticks: None,
        }
    }

    /// Let the tick loop give up after `max_ticks`, leaving the run active
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Run a closure against the simulation between ticks
    pub async fn with_simulation<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> R {
        let mut sim = self.sim.lock().await;
        f(&mut sim)
    }

    /// Start a run and spawn its tick loop.
    ///
    /// Fails with `AlreadyRunning` if a run is active. The returned handle
    /// resolves when the run completes, is stopped or is superseded by a
    /// later start, with the ticks this loop drove.
    pub async fn start(
        &self,
        kind: SchedulerKind,
        quantum: Option<f64>,
    ) -> Result<JoinHandle<Result<RunOutcome>>> {
        let generation = {
            let mut sim = self.sim.lock().await;
            if let Err(e) = sim.start(kind, quantum) {
                warn!(scheduler = %kind, error = %e, "Start rejected");
                return Err(e);
            }
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let loop_state = LoopState {
            sim: Arc::clone(&self.sim),
            generation: Arc::clone(&self.generation),
            own_generation: generation,
        };
        let (pace, max_ticks) = (self.pace, self.max_ticks);
        Ok(tokio::spawn(async move { tick_loop(loop_state, pace, max_ticks).await }))
    }

    /// Stop the active run once the in-flight tick has finished
    pub async fn stop(&self) -> Result<()> {
        let mut sim = self.sim.lock().await;
        sim.stop()?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub async fn reset(&self) {
        let mut sim = self.sim.lock().await;
        sim.reset();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.sim.lock().await.snapshot()
    }

    pub async fn statistics(&self) -> Statistics {
        self.sim.lock().await.statistics()
    }
}

struct LoopState {
    sim: Arc<Mutex<Simulation>>,
    generation: Arc<AtomicU64>,
    own_generation: u64,
}

async fn tick_loop(state: LoopState, pace: Duration, max_ticks: Option<u64>) -> Result<RunOutcome> {
    let mut ticker = (!pace.is_zero()).then(|| {
        let mut ticker = interval(pace);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut ticks = 0;

    loop {
        match ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => tokio::task::yield_now().await,
        }

        let mut guard = state.sim.lock().await;
        let superseded = state.generation.load(Ordering::SeqCst) != state.own_generation;
        let exhausted = max_ticks.is_some_and(|max| ticks >= max);
        if superseded || !guard.is_running() || exhausted {
            let outcome = RunOutcome {
                ticks,
                time: guard.now(),
                status: guard.status(),
            };
            if superseded {
                info!(ticks, "Tick loop superseded");
            } else if exhausted && guard.is_running() {
                warn!(ticks, "Tick limit reached, leaving run active");
            } else {
                info!(ticks, status = ?outcome.status, "Tick loop finished");
            }
            return Ok(outcome);
        }
        guard.tick()?;
        ticks += 1;
    }
}
