//! Engine and scenario configuration

use std::path::Path;

use cloudvista_core::{CloudVistaError, CostRates, Result, SchedulerKind, VmSpec};
use serde::{Deserialize, Serialize};

use crate::clock::DEFAULT_TICK_SECONDS;
use crate::stats::DEFAULT_HISTORY_LIMIT;
use crate::types::TaskRequest;

/// Default round-robin quantum in simulated seconds
pub const DEFAULT_QUANTUM_SECONDS: f64 = 2.0;

/// Engine settings that stay fixed for the lifetime of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated seconds per tick
    pub tick_duration: f64,
    pub rates: CostRates,
    /// Utilization samples kept by the stats collector
    pub history_limit: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_duration: DEFAULT_TICK_SECONDS,
            rates: CostRates::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl SimulationConfig {
    pub fn with_tick_duration(mut self, tick_duration: f64) -> Self {
        self.tick_duration = tick_duration;
        self
    }

    pub fn with_rates(mut self, cpu_hourly: f64, ram_hourly: f64) -> Self {
        self.rates = CostRates {
            cpu_hourly,
            ram_hourly,
        };
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tick_duration.is_finite() && self.tick_duration > 0.0) {
            return Err(CloudVistaError::invalid_config(format!(
                "tick duration must be positive, got {}",
                self.tick_duration
            )));
        }
        let CostRates {
            cpu_hourly,
            ram_hourly,
        } = self.rates;
        if !(cpu_hourly.is_finite() && cpu_hourly >= 0.0 && ram_hourly.is_finite() && ram_hourly >= 0.0)
        {
            return Err(CloudVistaError::invalid_config(format!(
                "cost rates must be non-negative (cpu={cpu_hourly}, ram={ram_hourly})"
            )));
        }
        Ok(())
    }
}

/// A complete run description, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub vms: VmSpec,
    #[serde(default)]
    pub engine: SimulationConfig,
    pub scheduler: SchedulerKind,
    #[serde(default)]
    pub quantum: Option<f64>,
    #[serde(default)]
    pub tasks: Vec<TaskRequest>,
}

impl ScenarioConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Quantum to pass to `start`: the configured one, or the default for round-robin
    pub fn effective_quantum(&self) -> Option<f64> {
        match self.scheduler {
            SchedulerKind::RoundRobin => Some(self.quantum.unwrap_or(DEFAULT_QUANTUM_SECONDS)),
            _ => self.quantum,
        }
    }
}
