//! Core types for the simulation engine

use cloudvista_core::{CloudVistaError, Result, TaskId, TaskStatus, VmId};
use serde::{Deserialize, Serialize};

/// A virtual machine with exclusive single-task occupancy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    pub id: VmId,
    pub total_cores: u32,
    pub total_ram: u32,
    pub storage: u32,
    pub available_cores: u32,
    pub available_ram: u32,
    pub current_task: Option<TaskId>,
}

impl Vm {
    pub fn new(id: VmId, cores: u32, ram: u32, storage: u32) -> Self {
        Vm {
            id,
            total_cores: cores,
            total_ram: ram,
            storage,
            available_cores: cores,
            available_ram: ram,
            current_task: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current_task.is_none()
    }

    /// Check if this VM is free and has room for the task's demand
    pub fn can_fit(&self, task: &Task) -> bool {
        self.is_idle()
            && self.available_cores >= task.cpu_required
            && self.available_ram >= task.ram_required
    }

    pub fn used_cores(&self) -> u32 {
        self.total_cores - self.available_cores
    }

    pub fn used_ram(&self) -> u32 {
        self.total_ram - self.available_ram
    }

    /// Return to full availability with no task
    pub fn reset(&mut self) {
        self.available_cores = self.total_cores;
        self.available_ram = self.total_ram;
        self.current_task = None;
    }
}

/// Parameters of a task submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Display name; `Task-<id>` when empty
    #[serde(default)]
    pub name: String,
    pub cpu: u32,
    pub ram: u32,
    /// Simulated seconds of work
    pub execution_time: f64,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    5
}

impl TaskRequest {
    pub fn new(name: impl Into<String>, cpu: u32, ram: u32, execution_time: f64) -> Self {
        TaskRequest {
            name: name.into(),
            cpu,
            ram,
            execution_time,
            priority: default_priority(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cpu == 0 {
            return Err(CloudVistaError::invalid_config("task cpu must be positive"));
        }
        if self.ram == 0 {
            return Err(CloudVistaError::invalid_config("task ram must be positive"));
        }
        if !(self.execution_time.is_finite() && self.execution_time > 0.0) {
            return Err(CloudVistaError::invalid_config(format!(
                "task execution time must be positive, got {}",
                self.execution_time
            )));
        }
        Ok(())
    }
}

/// A task to be scheduled onto the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub cpu_required: u32,
    pub ram_required: u32,
    pub execution_time: f64,
    pub priority: i32,
    pub arrival_time: f64,
    pub remaining_time: f64, // Only decremented under round-robin
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub status: TaskStatus,
    pub quantum_used: f64,
    pub cost: f64,
    pub assigned_vm: Option<VmId>,
}

impl Task {
    /// Build a pending task from a validated request
    pub fn from_request(id: TaskId, request: TaskRequest, arrival_time: f64) -> Self {
        let name = if request.name.trim().is_empty() {
            format!("Task-{id}")
        } else {
            request.name
        };

        Task {
            id,
            name,
            cpu_required: request.cpu,
            ram_required: request.ram,
            execution_time: request.execution_time,
            priority: request.priority,
            arrival_time,
            remaining_time: request.execution_time,
            start_time: None,
            end_time: None,
            status: TaskStatus::Pending,
            quantum_used: 0.0,
            cost: 0.0,
            assigned_vm: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Time from arrival to first start
    pub fn wait_time(&self) -> Option<f64> {
        self.start_time.map(|start| start - self.arrival_time)
    }

    /// Time from arrival to completion
    pub fn turnaround_time(&self) -> Option<f64> {
        self.end_time.map(|end| end - self.arrival_time)
    }
}
