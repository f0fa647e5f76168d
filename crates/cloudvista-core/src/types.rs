//! Core types shared across CloudVista components

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CloudVistaError;

/// Unique identifier of a submitted task (assigned from 1, monotonically)
pub type TaskId = u64;

/// Unique identifier of a VM (assigned from 1 in creation order)
pub type VmId = u64;

/// Scheduling policy used for a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// First-come-first-served by arrival time
    Fcfs,
    /// Highest priority first, no preemption
    Priority,
    /// FIFO queue with a fixed time quantum
    RoundRobin,
}

impl SchedulerKind {
    pub const ALL: [SchedulerKind; 3] = [Self::Fcfs, Self::Priority, Self::RoundRobin];

    /// Whether this policy needs a time quantum
    pub fn is_preemptive(&self) -> bool {
        matches!(self, Self::RoundRobin)
    }
}

impl std::fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerKind::Fcfs => write!(f, "fcfs"),
            SchedulerKind::Priority => write!(f, "priority"),
            SchedulerKind::RoundRobin => write!(f, "roundrobin"),
        }
    }
}

impl FromStr for SchedulerKind {
    type Err = CloudVistaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fcfs" => Ok(Self::Fcfs),
            "priority" => Ok(Self::Priority),
            "roundrobin" | "round-robin" | "rr" => Ok(Self::RoundRobin),
            other => Err(CloudVistaError::invalid_config(format!(
                "unknown scheduler: {other}"
            ))),
        }
    }
}

/// Lifecycle of the simulation clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    #[default]
    Idle,
    Running,
    Completed,
}

/// Task state machine: pending -> running -> [pending] -> completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
}

/// Uniform specification for a batch of VMs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSpec {
    pub count: u32,
    pub cores: u32,
    /// RAM per VM in GB
    pub ram: u32,
    /// Storage per VM in GB (informational, never scheduled against)
    pub storage: u32,
}

impl VmSpec {
    pub fn new(count: u32, cores: u32, ram: u32, storage: u32) -> Self {
        Self {
            count,
            cores,
            ram,
            storage,
        }
    }
}

/// Hourly resource prices used for task cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    /// Price per core-hour
    pub cpu_hourly: f64,
    /// Price per GB-hour of RAM
    pub ram_hourly: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            cpu_hourly: 1.0,
            ram_hourly: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_kind_round_trip() {
        for kind in SchedulerKind::ALL {
            assert_eq!(kind.to_string().parse::<SchedulerKind>().unwrap(), kind);
        }
        assert_eq!("RR".parse::<SchedulerKind>().unwrap(), SchedulerKind::RoundRobin);
        assert!("lottery".parse::<SchedulerKind>().is_err());
    }

    #[test]
    fn test_scheduler_kind_serde() {
        let json = serde_json::to_string(&SchedulerKind::RoundRobin).unwrap();
        assert_eq!(json, "\"roundrobin\"");
        let kind: SchedulerKind = serde_json::from_str("\"priority\"").unwrap();
        assert_eq!(kind, SchedulerKind::Priority);
    }

    #[test]
    fn test_only_round_robin_is_preemptive() {
        assert!(SchedulerKind::RoundRobin.is_preemptive());
        assert!(!SchedulerKind::Fcfs.is_preemptive());
        assert!(!SchedulerKind::Priority.is_preemptive());
    }
}
