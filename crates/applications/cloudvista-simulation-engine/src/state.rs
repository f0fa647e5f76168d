//! Owned simulation state: the VM pool, every submitted task and the order
//! in which tasks completed.
//!
//! All task transitions go through this type so that task status and VM
//! occupancy never disagree.

use cloudvista_core::{CloudVistaError, CostRates, Result, TaskId, TaskStatus, VmId, VmSpec};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pool::ResourcePool;
use crate::stats::task_cost;
use crate::types::{Task, TaskRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationState {
    pool: ResourcePool,
    tasks: Vec<Task>,
    completion_order: Vec<TaskId>,
    next_task_id: TaskId,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationState {
    pub fn new() -> Self {
        SimulationState {
            pool: ResourcePool::new(),
            tasks: Vec::new(),
            completion_order: Vec::new(),
            next_task_id: 1,
        }
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn initialize_vms(&mut self, spec: VmSpec) -> Result<()> {
        self.pool.initialize(spec)
    }

    /// All tasks in submission order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    // Ids are handed out from 1 in submission order, so id - 1 is the index
    fn index_of(id: TaskId) -> Option<usize> {
        id.checked_sub(1).map(|i| i as usize)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        Self::index_of(id).and_then(|i| self.tasks.get(i))
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        Self::index_of(id)
            .and_then(|i| self.tasks.get_mut(i))
            .ok_or_else(|| CloudVistaError::invalid_config(format!("unknown task {id}")))
    }

    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_pending())
    }

    pub fn running(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_running())
    }

    /// Completed tasks in the order they finished
    pub fn completed(&self) -> impl Iterator<Item = &Task> {
        self.completion_order.iter().filter_map(|id| self.task(*id))
    }

    pub fn completed_count(&self) -> usize {
        self.completion_order.len()
    }

    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(Task::is_completed)
    }

    /// Ids of running tasks in VM creation order
    pub fn running_on_vms(&self) -> Vec<TaskId> {
        self.pool.vms().iter().filter_map(|vm| vm.current_task).collect()
    }

    /// Validate and append a pending task arriving at `now`
    pub fn submit(&mut self, request: TaskRequest, now: f64) -> Result<&Task> {
        request.validate()?;

        let id = self.next_task_id;
        self.next_task_id += 1;
        self.tasks.push(Task::from_request(id, request, now));

        let task = &self.tasks[self.tasks.len() - 1];
        debug!(task_id = id, name = %task.name, arrival = now, "Submitted task");
        Ok(task)
    }

    /// Place a pending task on a VM and mark it running.
    ///
    /// `start_time` is only set on the first admission. `end_time` is the
    /// projected finish if the task ran uninterrupted from `now`.
    pub fn admit(&mut self, task_id: TaskId, vm_id: VmId, now: f64) -> Result<()> {
        let task = Self::index_of(task_id)
            .and_then(|i| self.tasks.get(i))
            .ok_or_else(|| CloudVistaError::invalid_config(format!("unknown task {task_id}")))?;
        if !task.is_pending() {
            return Err(CloudVistaError::conflict(
                vm_id,
                format!("task {task_id} is not pending"),
            ));
        }
        self.pool.assign(vm_id, task)?;

        let task = self.task_mut(task_id)?;
        task.status = TaskStatus::Running;
        task.start_time.get_or_insert(now);
        task.end_time = Some(now + task.remaining_time);
        task.quantum_used = 0.0;
        task.assigned_vm = Some(vm_id);
        Ok(())
    }

    /// Finish a running task at `end_time`, price it and free its VM
    pub fn complete(&mut self, task_id: TaskId, end_time: f64, rates: &CostRates) -> Result<()> {
        let task = self.task_mut(task_id)?;
        if task.is_completed() {
            return Ok(());
        }

        task.status = TaskStatus::Completed;
        task.end_time = Some(end_time);
        task.remaining_time = 0.0;
        task.quantum_used = 0.0;
        task.cost = task_cost(task, rates);
        let vm_id = task.assigned_vm.take();
        let snapshot = task.clone();

        if let Some(vm_id) = vm_id {
            self.pool.release(vm_id, &snapshot);
        }
        self.completion_order.push(task_id);
        Ok(())
    }

    /// Return a running task to pending and free its VM
    pub fn preempt(&mut self, task_id: TaskId) -> Result<()> {
        let task = self.task_mut(task_id)?;
        if !task.is_running() {
            return Ok(());
        }

        task.status = TaskStatus::Pending;
        task.quantum_used = 0.0;
        task.end_time = None;
        let vm_id = task.assigned_vm.take();
        let snapshot = task.clone();

        if let Some(vm_id) = vm_id {
            self.pool.release(vm_id, &snapshot);
        }
        Ok(())
    }

    /// Accrue one tick of running time against the task's remaining work
    /// and its current quantum
    pub fn accrue(&mut self, task_id: TaskId, tick: f64) -> Result<&Task> {
        let task = self.task_mut(task_id)?;
        task.quantum_used += tick;
        task.remaining_time -= tick;
        Ok(&*task)
    }

    /// Drop every task and free every VM; the VM set itself is kept
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.completion_order.clear();
        self.next_task_id = 1;
        self.pool.reset();
    }
}
