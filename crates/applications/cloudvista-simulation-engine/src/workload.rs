//! Synthetic workload generation
//!
//! Produces reproducible task submissions for demos and policy comparisons:
//! - CPU/RAM demand uniform in `1..=max`
//! - Execution time drawn from a normal distribution, clamped to at least one
//!   second and rounded to whole seconds
//! - Priority uniform in `1..=10`

use cloudvista_core::{CloudVistaError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::types::TaskRequest;

/// Highest priority handed out by the generator
const MAX_PRIORITY: i32 = 10;

/// Seeded generator of task submissions
pub struct WorkloadGenerator {
    rng: StdRng,
    max_cpu: u32,
    max_ram: u32,
    execution_time: Normal<f64>,
}

impl WorkloadGenerator {
    /// Create a generator
    ///
    /// # Arguments
    /// * `seed` - RNG seed; the same seed always yields the same workload
    /// * `max_cpu` / `max_ram` - Upper bound for per-task demand
    /// * `mean_time` / `std_dev_time` - Execution time distribution (seconds)
    pub fn new(
        seed: u64,
        max_cpu: u32,
        max_ram: u32,
        mean_time: f64,
        std_dev_time: f64,
    ) -> Result<Self> {
        if max_cpu == 0 || max_ram == 0 {
            return Err(CloudVistaError::invalid_config(
                "workload demand bounds must be positive",
            ));
        }
        let execution_time = Normal::new(mean_time, std_dev_time)
            .map_err(|e| CloudVistaError::invalid_config(format!("execution time distribution: {e}")))?;

        Ok(WorkloadGenerator {
            rng: StdRng::seed_from_u64(seed),
            max_cpu,
            max_ram,
            execution_time,
        })
    }

    /// Next task submission
    pub fn next_request(&mut self, index: usize) -> TaskRequest {
        let cpu = self.rng.gen_range(1..=self.max_cpu);
        let ram = self.rng.gen_range(1..=self.max_ram);
        let time = self.execution_time.sample(&mut self.rng).max(1.0).round();
        let priority = self.rng.gen_range(1..=MAX_PRIORITY);

        TaskRequest::new(format!("Task-{}", index + 1), cpu, ram, time).with_priority(priority)
    }

    /// Generate `count` submissions
    pub fn generate(&mut self, count: usize) -> Vec<TaskRequest> {
        (0..count).map(|i| self.next_request(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_workload() {
        let a = WorkloadGenerator::new(7, 4, 8, 10.0, 3.0).unwrap().generate(20);
        let b = WorkloadGenerator::new(7, 4, 8, 10.0, 3.0).unwrap().generate(20);
        assert_eq!(a, b);
    }

    #[test]
    fn test_requests_are_valid() {
        let mut generator = WorkloadGenerator::new(42, 4, 8, 2.0, 5.0).unwrap();
        for request in generator.generate(200) {
            assert!(request.validate().is_ok());
            assert!((1..=4).contains(&request.cpu));
            assert!((1..=8).contains(&request.ram));
            assert!(request.execution_time >= 1.0);
            assert_eq!(request.execution_time.fract(), 0.0);
            assert!((1..=MAX_PRIORITY).contains(&request.priority));
        }
    }

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(WorkloadGenerator::new(1, 0, 8, 10.0, 1.0).is_err());
        assert!(WorkloadGenerator::new(1, 4, 8, 10.0, -1.0).is_err());
    }
}
