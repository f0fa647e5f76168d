//! VM resource pool with first-fit placement
//!
//! Each VM runs at most one task. Capacity is debited on assignment and
//! credited back on release, so for every VM
//! `available + demand of its current task == total` holds between ticks.

use cloudvista_core::{CloudVistaError, Result, TaskId, VmId, VmSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{Task, Vm};

/// Fixed set of VMs in stable creation order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcePool {
    vms: Vec<Vm>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire VM set with `spec.count` identical VMs
    pub fn initialize(&mut self, spec: VmSpec) -> Result<()> {
        if spec.count == 0 {
            return Err(CloudVistaError::invalid_config("VM count must be positive"));
        }
        if spec.cores == 0 || spec.ram == 0 || spec.storage == 0 {
            return Err(CloudVistaError::invalid_config(format!(
                "VM capacity must be positive (cores={}, ram={}, storage={})",
                spec.cores, spec.ram, spec.storage
            )));
        }

        self.vms = (1..=spec.count as VmId)
            .map(|id| Vm::new(id, spec.cores, spec.ram, spec.storage))
            .collect();

        info!(
            count = spec.count,
            cores = spec.cores,
            ram = spec.ram,
            "Initialized {} VMs with {} cores and {}GB RAM each",
            spec.count,
            spec.cores,
            spec.ram
        );
        Ok(())
    }

    pub fn vms(&self) -> &[Vm] {
        &self.vms
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vms.len()
    }

    pub fn get(&self, vm_id: VmId) -> Option<&Vm> {
        self.vms.iter().find(|vm| vm.id == vm_id)
    }

    fn get_mut(&mut self, vm_id: VmId) -> Result<&mut Vm> {
        self.vms
            .iter_mut()
            .find(|vm| vm.id == vm_id)
            .ok_or_else(|| CloudVistaError::conflict(vm_id, "no such VM"))
    }

    /// First idle VM, in creation order, with enough cores and RAM
    pub fn find_fit(&self, task: &Task) -> Option<VmId> {
        self.vms.iter().find(|vm| vm.can_fit(task)).map(|vm| vm.id)
    }

    /// Debit the task's demand from the VM and record it as current
    pub fn assign(&mut self, vm_id: VmId, task: &Task) -> Result<()> {
        let vm = self.get_mut(vm_id)?;

        if let Some(current) = vm.current_task {
            return Err(CloudVistaError::conflict(
                vm_id,
                format!("already running task {current}"),
            ));
        }
        if vm.available_cores < task.cpu_required || vm.available_ram < task.ram_required {
            return Err(CloudVistaError::conflict(
                vm_id,
                format!(
                    "insufficient capacity: need {} cores/{}GB, have {} cores/{}GB",
                    task.cpu_required, task.ram_required, vm.available_cores, vm.available_ram
                ),
            ));
        }

        vm.available_cores -= task.cpu_required;
        vm.available_ram -= task.ram_required;
        vm.current_task = Some(task.id);

        debug!(vm_id, task_id = task.id, "Assigned task to VM");
        Ok(())
    }

    /// Credit the task's demand back to the VM and clear its current task.
    ///
    /// Returns the released task id, or `None` when the VM was not running
    /// `task` (already released this tick, or never assigned).
    pub fn release(&mut self, vm_id: VmId, task: &Task) -> Option<TaskId> {
        let vm = self.vms.iter_mut().find(|vm| vm.id == vm_id)?;
        if vm.current_task != Some(task.id) {
            return None;
        }

        vm.available_cores = (vm.available_cores + task.cpu_required).min(vm.total_cores);
        vm.available_ram = (vm.available_ram + task.ram_required).min(vm.total_ram);
        vm.current_task = None;

        debug!(vm_id, task_id = task.id, "Released VM");
        Some(task.id)
    }

    /// Full availability and no current task on every VM
    pub fn reset(&mut self) {
        self.vms.iter_mut().for_each(Vm::reset);
    }

    pub fn total_cores(&self) -> u64 {
        self.vms.iter().map(|vm| vm.total_cores as u64).sum()
    }

    pub fn used_cores(&self) -> u64 {
        self.vms.iter().map(|vm| vm.used_cores() as u64).sum()
    }

    pub fn total_ram(&self) -> u64 {
        self.vms.iter().map(|vm| vm.total_ram as u64).sum()
    }

    pub fn used_ram(&self) -> u64 {
        self.vms.iter().map(|vm| vm.used_ram() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskRequest;

    fn task(id: TaskId, cpu: u32, ram: u32) -> Task {
        Task::from_request(id, TaskRequest::new(format!("t{id}"), cpu, ram, 1.0), 0.0)
    }

    fn pool(count: u32, cores: u32, ram: u32) -> ResourcePool {
        let mut pool = ResourcePool::new();
        pool.initialize(VmSpec::new(count, cores, ram, 50)).unwrap();
        pool
    }

    #[test]
    fn test_initialize_rejects_bad_spec() {
        let mut pool = ResourcePool::new();
        for spec in [
            VmSpec::new(0, 4, 8, 50),
            VmSpec::new(2, 0, 8, 50),
            VmSpec::new(2, 4, 0, 50),
            VmSpec::new(2, 4, 8, 0),
        ] {
            assert!(matches!(
                pool.initialize(spec),
                Err(CloudVistaError::InvalidConfig(_))
            ));
        }
        assert!(pool.is_empty());
    }

    #[test]
    fn test_initialize_replaces_vms() {
        let mut pool = pool(3, 4, 8);
        pool.initialize(VmSpec::new(2, 8, 16, 100)).unwrap();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.vms()[0].id, 1);
        assert_eq!(pool.vms()[1].total_cores, 8);
        assert_eq!(pool.total_ram(), 32);
    }

    #[test]
    fn test_find_fit_is_first_fit() {
        let mut pool = pool(3, 4, 8);
        let t1 = task(1, 2, 2);

        assert_eq!(pool.find_fit(&t1), Some(1));
        pool.assign(1, &t1).unwrap();

        // VM 1 still has spare capacity but is occupied
        assert_eq!(pool.find_fit(&task(2, 1, 1)), Some(2));
        assert_eq!(pool.find_fit(&task(3, 5, 1)), None);
    }

    #[test]
    fn test_assign_conflicts() {
        let mut occupied = pool(1, 4, 8);
        occupied.assign(1, &task(1, 2, 2)).unwrap();

        let err = occupied.assign(1, &task(2, 1, 1)).unwrap_err();
        assert!(matches!(err, CloudVistaError::ResourceConflict { vm_id: 1, .. }));

        let mut small = pool(1, 4, 8);
        let err = small.assign(1, &task(3, 16, 1)).unwrap_err();
        assert!(matches!(err, CloudVistaError::ResourceConflict { .. }));
        assert_eq!(small.vms()[0].available_cores, 4);
        assert!(small.vms()[0].is_idle());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut pool = pool(1, 4, 8);
        let t1 = task(1, 3, 6);
        pool.assign(1, &t1).unwrap();
        assert_eq!(pool.vms()[0].available_cores, 1);

        assert_eq!(pool.release(1, &t1), Some(1));
        assert_eq!(pool.release(1, &t1), None);

        let vm = &pool.vms()[0];
        assert_eq!(vm.available_cores, 4);
        assert_eq!(vm.available_ram, 8);
        assert!(vm.is_idle());
    }

    #[test]
    fn test_release_ignores_other_task() {
        let mut pool = pool(1, 4, 8);
        let t1 = task(1, 3, 6);
        pool.assign(1, &t1).unwrap();

        assert_eq!(pool.release(1, &task(2, 1, 1)), None);
        assert_eq!(pool.vms()[0].current_task, Some(1));
        assert_eq!(pool.used_cores(), 3);
    }
}
