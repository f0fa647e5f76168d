//! Derived statistics: utilization, wait/turnaround time and cost
//!
//! Everything here reads simulation state; nothing writes to tasks or VMs.
//! The collector only owns its own utilization history.

use std::collections::VecDeque;

use cloudvista_core::CostRates;
use serde::{Deserialize, Serialize};

use crate::pool::ResourcePool;
use crate::state::SimulationState;
use crate::types::Task;

/// Seconds per billing hour
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Default number of utilization samples kept
pub const DEFAULT_HISTORY_LIMIT: usize = 60;

/// Cost of a task's full execution, independent of how it was scheduled
pub fn task_cost(task: &Task, rates: &CostRates) -> f64 {
    let hours = task.execution_time / SECONDS_PER_HOUR;
    (task.cpu_required as f64 * rates.cpu_hourly + task.ram_required as f64 * rates.ram_hourly)
        * hours
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Aggregate metrics for the current state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub running_tasks: usize,
    pub completed_tasks: usize,
    pub avg_wait_time: f64,
    pub avg_turnaround_time: f64,
    pub cpu_utilization: f64,
    pub ram_utilization: f64,
    pub total_cost: f64,
    pub avg_cost_per_task: f64,
}

impl Statistics {
    pub fn collect(state: &SimulationState) -> Self {
        let completed: Vec<&Task> = state.completed().collect();
        let completed_count = completed.len();

        let avg_wait_time = mean(completed.iter().filter_map(|t| t.wait_time()));
        let avg_turnaround_time = mean(completed.iter().filter_map(|t| t.turnaround_time()));
        let total_cost: f64 = completed.iter().map(|t| t.cost).sum();
        let avg_cost_per_task = if completed_count == 0 {
            0.0
        } else {
            total_cost / completed_count as f64
        };

        let (cpu_utilization, ram_utilization) = utilization(state.pool());

        Statistics {
            total_tasks: state.tasks().len(),
            pending_tasks: state.pending().count(),
            running_tasks: state.running().count(),
            completed_tasks: completed_count,
            avg_wait_time,
            avg_turnaround_time,
            cpu_utilization,
            ram_utilization,
            total_cost,
            avg_cost_per_task,
        }
    }
}

/// CPU and RAM utilization percentages across the pool
pub fn utilization(pool: &ResourcePool) -> (f64, f64) {
    (
        percent(pool.used_cores(), pool.total_cores()),
        percent(pool.used_ram(), pool.total_ram()),
    )
}

/// One utilization sample taken at the end of a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSample {
    pub time: f64,
    pub cpu: f64,
    pub ram: f64,
}

/// Wait/execution/cost breakdown of a completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTimeline {
    pub task_id: u64,
    pub name: String,
    pub wait_time: f64,
    pub execution_time: f64,
    pub cost: f64,
}

/// Completed tasks in completion order
pub fn timeline(state: &SimulationState) -> Vec<TaskTimeline> {
    state
        .completed()
        .map(|t| TaskTimeline {
            task_id: t.id,
            name: t.name.clone(),
            wait_time: t.wait_time().unwrap_or(0.0),
            execution_time: t.execution_time,
            cost: t.cost,
        })
        .collect()
}

/// Samples utilization once per tick, keeping a bounded history
#[derive(Debug, Clone)]
pub struct StatsCollector {
    history: VecDeque<UtilizationSample>,
    limit: usize,
}

impl StatsCollector {
    pub fn new(limit: usize) -> Self {
        StatsCollector {
            history: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn sample(&mut self, time: f64, pool: &ResourcePool) -> UtilizationSample {
        let (cpu, ram) = utilization(pool);
        let sample = UtilizationSample { time, cpu, ram };

        if self.limit > 0 {
            if self.history.len() == self.limit {
                self.history.pop_front();
            }
            self.history.push_back(sample);
        }
        sample
    }

    /// Oldest sample first
    pub fn history(&self) -> Vec<UtilizationSample> {
        self.history.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskRequest;
    use cloudvista_core::VmSpec;

    #[test]
    fn test_task_cost() {
        let task = Task::from_request(1, TaskRequest::new("job", 2, 4, 3600.0), 0.0);
        let rates = CostRates {
            cpu_hourly: 1.0,
            ram_hourly: 0.5,
        };
        assert!((task_cost(&task, &rates) - 4.0).abs() < 1e-12);

        let half = Task::from_request(2, TaskRequest::new("half", 2, 4, 1800.0), 0.0);
        assert!((task_cost(&half, &rates) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_state_is_all_zero() {
        let stats = Statistics::collect(&SimulationState::new());
        assert_eq!(stats, Statistics::default());
    }

    #[test]
    fn test_averages_over_completed_only() {
        let mut state = SimulationState::new();
        state.initialize_vms(VmSpec::new(2, 4, 8, 50)).unwrap();
        state.submit(TaskRequest::new("a", 2, 4, 1.0), 0.0).unwrap();
        state.submit(TaskRequest::new("b", 2, 4, 1.0), 0.0).unwrap();
        state.submit(TaskRequest::new("c", 1, 1, 1.0), 0.0).unwrap();

        let rates = CostRates::default();
        state.admit(1, 1, 1.0).unwrap();
        state.admit(2, 2, 3.0).unwrap();
        state.complete(1, 2.0, &rates).unwrap();

        let stats = Statistics::collect(&state);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.running_tasks, 1);
        assert_eq!(stats.pending_tasks, 1);
        assert!((stats.avg_wait_time - 1.0).abs() < 1e-12);
        assert!((stats.avg_turnaround_time - 2.0).abs() < 1e-12);
        assert!((stats.avg_cost_per_task - stats.total_cost).abs() < 1e-12);

        // Only VM 2 is busy: 2 of 8 cores, 4 of 16 GB
        assert!((stats.cpu_utilization - 25.0).abs() < 1e-12);
        assert!((stats.ram_utilization - 25.0).abs() < 1e-12);

        let rows = timeline(&state);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "a");
        assert!((rows[0].wait_time - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut pool = ResourcePool::new();
        pool.initialize(VmSpec::new(1, 4, 8, 50)).unwrap();

        let mut collector = StatsCollector::new(3);
        for i in 1..=5 {
            collector.sample(i as f64 * 0.1, &pool);
        }

        let history = collector.history();
        assert_eq!(history.len(), 3);
        assert!((history[0].time - 0.3).abs() < 1e-12);
        assert_eq!(history[2].cpu, 0.0);
    }
}
