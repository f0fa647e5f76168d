//! Scheduling policies for task admission
//!
//! Implements three policies to compare:
//! - FCFS: static order by arrival time, run to completion
//! - Priority: static order by descending priority (stable), run to completion
//! - Round-Robin: FIFO queue with a time quantum and preemption
//!
//! FCFS and Priority are stateless re-evaluations of an order fixed at start.
//! Round-robin keeps a queue that changes every tick.

use std::cmp::Ordering;
use std::collections::VecDeque;

use cloudvista_core::{CloudVistaError, CostRates, Result, SchedulerKind, TaskId, VmId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::SimulationState;
use crate::types::Task;

/// Per-tick inputs shared by every policy
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Simulated time after this tick's advance
    pub now: f64,
    pub tick_duration: f64,
    pub epsilon: f64,
    pub rates: CostRates,
}

/// Task transitions produced by one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickEvents {
    pub completed: Vec<TaskId>,
    pub preempted: Vec<TaskId>,
    pub admitted: Vec<(TaskId, VmId)>,
}

/// Scheduling policy trait
pub trait Scheduler: Send {
    fn kind(&self) -> SchedulerKind;

    /// Get policy name
    fn name(&self) -> &str;

    /// Fix the admission order from the tasks pending at start
    fn prepare(&mut self, state: &SimulationState);

    /// Take a task submitted while the run is active
    fn enqueue(&mut self, task: &Task);

    /// Completion (and preemption) pass over running tasks
    fn advance(&mut self, state: &mut SimulationState, ctx: &TickContext) -> Result<TickEvents> {
        complete_finished(state, ctx)
    }

    /// Admission pass against current pool availability
    fn admit(
        &mut self,
        state: &mut SimulationState,
        ctx: &TickContext,
    ) -> Result<Vec<(TaskId, VmId)>>;

    /// Whether tasks are still waiting in scheduler-owned state
    fn has_queued(&self) -> bool {
        false
    }
}

/// Build the scheduler for a policy; `quantum` is required for round-robin
pub fn build_scheduler(kind: SchedulerKind, quantum: Option<f64>) -> Result<Box<dyn Scheduler>> {
    Ok(match kind {
        SchedulerKind::Fcfs => Box::new(StaticOrderScheduler::fcfs()),
        SchedulerKind::Priority => Box::new(StaticOrderScheduler::priority()),
        SchedulerKind::RoundRobin => {
            let quantum = quantum.ok_or_else(|| {
                CloudVistaError::invalid_config("round-robin requires a time quantum")
            })?;
            Box::new(RoundRobinScheduler::new(quantum)?)
        }
    })
}

/// Complete every running task whose projected end has been reached.
///
/// Tasks that keep running still accrue the tick, so `remaining_time` stays
/// current if the run is resumed under a preemptive policy.
fn complete_finished(state: &mut SimulationState, ctx: &TickContext) -> Result<TickEvents> {
    let mut events = TickEvents::default();

    for task_id in state.running_on_vms() {
        let Some(end) = state.task(task_id).and_then(|t| t.end_time) else {
            continue;
        };
        if ctx.now + ctx.epsilon >= end {
            state.complete(task_id, end, &ctx.rates)?;
            debug!(task_id, time = ctx.now, "Task completed");
            events.completed.push(task_id);
        } else {
            state.accrue(task_id, ctx.tick_duration)?;
        }
    }

    Ok(events)
}

#[derive(Debug, Clone, Copy)]
struct OrderEntry {
    id: TaskId,
    arrival_time: f64,
    priority: i32,
}

impl From<&Task> for OrderEntry {
    fn from(task: &Task) -> Self {
        OrderEntry {
            id: task.id,
            arrival_time: task.arrival_time,
            priority: task.priority,
        }
    }
}

/// FCFS and Priority: admission order sorted once, stable across ticks
pub struct StaticOrderScheduler {
    kind: SchedulerKind,
    order: Vec<OrderEntry>,
}

impl StaticOrderScheduler {
    /// Ascending arrival time
    pub fn fcfs() -> Self {
        StaticOrderScheduler {
            kind: SchedulerKind::Fcfs,
            order: Vec::new(),
        }
    }

    /// Descending priority, ties keep submission order
    pub fn priority() -> Self {
        StaticOrderScheduler {
            kind: SchedulerKind::Priority,
            order: Vec::new(),
        }
    }

    fn compare(&self, a: &OrderEntry, b: &OrderEntry) -> Ordering {
        match self.kind {
            SchedulerKind::Priority => b.priority.cmp(&a.priority),
            _ => a.arrival_time.total_cmp(&b.arrival_time),
        }
    }

    /// Task ids still waiting, in admission order
    pub fn order(&self) -> Vec<TaskId> {
        self.order.iter().map(|e| e.id).collect()
    }
}

impl Scheduler for StaticOrderScheduler {
    fn kind(&self) -> SchedulerKind {
        self.kind
    }

    fn name(&self) -> &str {
        match self.kind {
            SchedulerKind::Priority => "Priority",
            _ => "FCFS",
        }
    }

    fn prepare(&mut self, state: &SimulationState) {
        let mut order: Vec<OrderEntry> = state.pending().map(OrderEntry::from).collect();
        // sort_by is stable, so equal keys keep submission order
        order.sort_by(|a, b| self.compare(a, b));
        self.order = order;
    }

    fn enqueue(&mut self, task: &Task) {
        let entry = OrderEntry::from(task);
        let at = self
            .order
            .partition_point(|e| self.compare(e, &entry) != Ordering::Greater);
        self.order.insert(at, entry);
    }

    fn admit(
        &mut self,
        state: &mut SimulationState,
        ctx: &TickContext,
    ) -> Result<Vec<(TaskId, VmId)>> {
        let mut admitted = Vec::new();

        // Every pending task gets an attempt; an unfit task never blocks later ones
        for entry in &self.order {
            let Some(task) = state.task(entry.id) else {
                continue;
            };
            if !task.is_pending() {
                continue;
            }
            if let Some(vm_id) = state.pool().find_fit(task) {
                state.admit(entry.id, vm_id, ctx.now)?;
                debug!(task_id = entry.id, vm_id, time = ctx.now, "Task admitted");
                admitted.push((entry.id, vm_id));
            }
        }

        self.order
            .retain(|e| state.task(e.id).is_some_and(|t| t.is_pending()));
        Ok(admitted)
    }
}

/// Round-robin over an explicit FIFO queue
pub struct RoundRobinScheduler {
    quantum: f64,
    queue: VecDeque<TaskId>,
    pub total_preemptions: usize,
}

impl RoundRobinScheduler {
    pub fn new(quantum: f64) -> Result<Self> {
        if !(quantum.is_finite() && quantum > 0.0) {
            return Err(CloudVistaError::invalid_config(format!(
                "time quantum must be positive, got {quantum}"
            )));
        }
        Ok(RoundRobinScheduler {
            quantum,
            queue: VecDeque::new(),
            total_preemptions: 0,
        })
    }

    pub fn quantum(&self) -> f64 {
        self.quantum
    }

    /// Queued task ids, head first
    pub fn queue(&self) -> impl Iterator<Item = &TaskId> {
        self.queue.iter()
    }
}

impl Scheduler for RoundRobinScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::RoundRobin
    }

    fn name(&self) -> &str {
        "RoundRobin"
    }

    fn prepare(&mut self, state: &SimulationState) {
        self.queue = state.pending().map(|t| t.id).collect();
    }

    fn enqueue(&mut self, task: &Task) {
        self.queue.push_back(task.id);
    }

    fn advance(&mut self, state: &mut SimulationState, ctx: &TickContext) -> Result<TickEvents> {
        let mut events = TickEvents::default();

        for task_id in state.running_on_vms() {
            let task = state.accrue(task_id, ctx.tick_duration)?;
            let (remaining, quantum_used) = (task.remaining_time, task.quantum_used);

            if remaining <= ctx.epsilon {
                state.complete(task_id, ctx.now, &ctx.rates)?;
                debug!(task_id, time = ctx.now, "Task completed");
                events.completed.push(task_id);
            } else if quantum_used >= self.quantum - ctx.epsilon {
                state.preempt(task_id)?;
                self.queue.push_back(task_id);
                self.total_preemptions += 1;
                debug!(task_id, time = ctx.now, "Quantum expired, task preempted");
                events.preempted.push(task_id);
            }
        }

        Ok(events)
    }

    fn admit(
        &mut self,
        state: &mut SimulationState,
        ctx: &TickContext,
    ) -> Result<Vec<(TaskId, VmId)>> {
        let mut admitted = Vec::new();

        while let Some(&task_id) = self.queue.front() {
            let Some(task) = state.task(task_id).filter(|t| t.is_pending()) else {
                // Completed (or vanished) entries do not consume a slot
                self.queue.pop_front();
                continue;
            };

            // Stop at the first head that does not fit; never skip ahead
            let Some(vm_id) = state.pool().find_fit(task) else {
                break;
            };

            self.queue.pop_front();
            state.admit(task_id, vm_id, ctx.now)?;
            debug!(task_id, vm_id, time = ctx.now, "Task admitted");
            admitted.push((task_id, vm_id));
        }

        Ok(admitted)
    }

    fn has_queued(&self) -> bool {
        !self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskRequest;
    use cloudvista_core::VmSpec;

    fn ctx(now: f64) -> TickContext {
        TickContext {
            now,
            tick_duration: 0.1,
            epsilon: 0.05,
            rates: CostRates::default(),
        }
    }

    fn state_with(vms: u32, cores: u32, requests: &[(u32, f64, i32)]) -> SimulationState {
        let mut state = SimulationState::new();
        state.initialize_vms(VmSpec::new(vms, cores, 16, 50)).unwrap();
        for (i, &(cpu, time, priority)) in requests.iter().enumerate() {
            let request = TaskRequest::new(format!("t{}", i + 1), cpu, 1, time).with_priority(priority);
            state.submit(request, i as f64 * 0.1).unwrap();
        }
        state
    }

    #[test]
    fn test_build_scheduler() {
        assert_eq!(build_scheduler(SchedulerKind::Fcfs, None).unwrap().name(), "FCFS");
        assert_eq!(
            build_scheduler(SchedulerKind::Priority, Some(3.0)).unwrap().kind(),
            SchedulerKind::Priority
        );
        assert!(build_scheduler(SchedulerKind::RoundRobin, None).is_err());
        assert!(build_scheduler(SchedulerKind::RoundRobin, Some(0.0)).is_err());
        assert!(build_scheduler(SchedulerKind::RoundRobin, Some(2.0)).is_ok());
    }

    #[test]
    fn test_priority_order_is_stable() {
        let state = state_with(1, 4, &[(1, 1.0, 3), (1, 1.0, 9), (1, 1.0, 3), (1, 1.0, 9)]);
        let mut scheduler = StaticOrderScheduler::priority();
        scheduler.prepare(&state);

        assert_eq!(scheduler.order(), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_priority_enqueue_inserts_after_equals() {
        let mut state = state_with(1, 4, &[(1, 1.0, 9), (1, 1.0, 3)]);
        let mut scheduler = StaticOrderScheduler::priority();
        scheduler.prepare(&state);

        let id = state
            .submit(TaskRequest::new("late", 1, 1, 1.0).with_priority(9), 1.0)
            .unwrap()
            .id;
        scheduler.enqueue(state.task(id).unwrap());

        assert_eq!(scheduler.order(), vec![1, 3, 2]);
    }

    #[test]
    fn test_static_order_has_no_head_of_line_blocking() {
        // First task needs more cores than any VM offers
        let mut state = state_with(2, 4, &[(8, 1.0, 5), (2, 1.0, 5), (2, 1.0, 5)]);
        let mut scheduler = StaticOrderScheduler::fcfs();
        scheduler.prepare(&state);

        let admitted = scheduler.admit(&mut state, &ctx(0.1)).unwrap();
        assert_eq!(admitted, vec![(2, 1), (3, 2)]);

        // The unfit task keeps its place at the front
        assert_eq!(scheduler.order(), vec![1]);
    }

    #[test]
    fn test_run_to_completion_uses_projected_end() {
        let mut state = state_with(1, 4, &[(1, 1.0, 5)]);
        let mut scheduler = StaticOrderScheduler::fcfs();
        scheduler.prepare(&state);
        scheduler.admit(&mut state, &ctx(0.1)).unwrap();

        let events = scheduler.advance(&mut state, &ctx(1.0)).unwrap();
        assert!(events.completed.is_empty());

        let events = scheduler.advance(&mut state, &ctx(1.1)).unwrap();
        assert_eq!(events.completed, vec![1]);
        assert!(state.pool().vms()[0].is_idle());
    }

    #[test]
    fn test_round_robin_preempts_to_tail() {
        let mut state = state_with(1, 4, &[(1, 5.0, 5), (1, 5.0, 5)]);
        let mut scheduler = RoundRobinScheduler::new(0.2).unwrap();
        scheduler.prepare(&state);

        assert_eq!(scheduler.admit(&mut state, &ctx(0.1)).unwrap(), vec![(1, 1)]);

        let events = scheduler.advance(&mut state, &ctx(0.2)).unwrap();
        assert!(events.preempted.is_empty());

        let events = scheduler.advance(&mut state, &ctx(0.3)).unwrap();
        assert_eq!(events.preempted, vec![1]);
        assert_eq!(scheduler.queue().copied().collect::<Vec<_>>(), vec![2, 1]);

        assert_eq!(scheduler.admit(&mut state, &ctx(0.3)).unwrap(), vec![(2, 1)]);
        assert_eq!(scheduler.total_preemptions, 1);
    }

    #[test]
    fn test_round_robin_head_blocks_queue() {
        // Head needs 8 cores; the small task behind it must wait
        let mut state = state_with(1, 4, &[(8, 1.0, 5), (1, 1.0, 5)]);
        let mut scheduler = RoundRobinScheduler::new(2.0).unwrap();
        scheduler.prepare(&state);

        assert!(scheduler.admit(&mut state, &ctx(0.1)).unwrap().is_empty());
        assert!(scheduler.has_queued());
        assert!(state.pool().vms()[0].is_idle());
    }

    #[test]
    fn test_round_robin_discards_completed_head() {
        let mut state = state_with(2, 4, &[(1, 1.0, 5), (1, 1.0, 5)]);
        let mut scheduler = RoundRobinScheduler::new(2.0).unwrap();
        scheduler.prepare(&state);

        state.admit(1, 1, 0.1).unwrap();
        state.complete(1, 1.1, &CostRates::default()).unwrap();

        assert_eq!(scheduler.admit(&mut state, &ctx(1.2)).unwrap(), vec![(2, 1)]);
        assert!(!scheduler.has_queued());
    }
}
