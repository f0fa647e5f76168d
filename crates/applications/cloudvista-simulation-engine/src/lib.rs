//! CloudVista Simulation Engine
//!
//! Tick-driven simulator for comparing task scheduling policies (FCFS,
//! priority, round-robin) on a fixed pool of VMs, with utilization, timing
//! and cost statistics.

pub mod clock;
pub mod config;
pub mod policies;
pub mod pool;
pub mod report;
pub mod simulator;
pub mod state;
pub mod stats;
pub mod types;
pub mod workload;

#[cfg(feature = "async")]
pub mod host;

pub use config::{ScenarioConfig, SimulationConfig};
pub use simulator::{RunOutcome, Simulation, Snapshot, TickReport};
pub use stats::Statistics;
pub use types::{Task, TaskRequest, Vm};
