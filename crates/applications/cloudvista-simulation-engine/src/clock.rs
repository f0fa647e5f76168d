//! Logical simulation clock
//!
//! Time is derived from an integer tick counter (`ticks * tick_duration`) so
//! repeated runs land on identical timestamps instead of accumulating
//! floating-point drift.

use cloudvista_core::{CloudVistaError, Result, SimulationStatus};
use serde::{Deserialize, Serialize};

/// Reference tick size in simulated seconds
pub const DEFAULT_TICK_SECONDS: f64 = 0.1;

/// Completion tolerance as a fraction of one tick
pub const COMPLETION_EPSILON_FRACTION: f64 = 0.5;

/// Tolerance for "time remaining is ~0" comparisons at a given tick size
pub fn completion_epsilon(tick_duration: f64) -> f64 {
    tick_duration * COMPLETION_EPSILON_FRACTION
}

/// Clock state machine: Idle -> Running -> Completed, Running -> Idle on stop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationClock {
    tick_duration: f64,
    ticks: u64,
    status: SimulationStatus,
}

impl SimulationClock {
    pub fn new(tick_duration: f64) -> Result<Self> {
        if !(tick_duration.is_finite() && tick_duration > 0.0) {
            return Err(CloudVistaError::invalid_config(format!(
                "tick duration must be positive, got {tick_duration}"
            )));
        }
        Ok(SimulationClock {
            tick_duration,
            ticks: 0,
            status: SimulationStatus::Idle,
        })
    }

    pub fn now(&self) -> f64 {
        self.ticks as f64 * self.tick_duration
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick_duration(&self) -> f64 {
        self.tick_duration
    }

    pub fn epsilon(&self) -> f64 {
        completion_epsilon(self.tick_duration)
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SimulationStatus::Running
    }

    /// Move one tick forward and return the new time
    pub fn advance(&mut self) -> f64 {
        self.ticks += 1;
        self.now()
    }

    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(CloudVistaError::AlreadyRunning);
        }
        self.status = SimulationStatus::Running;
        Ok(())
    }

    /// User-initiated stop; time is kept so the run can be resumed
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(CloudVistaError::NotRunning);
        }
        self.status = SimulationStatus::Idle;
        Ok(())
    }

    /// Natural completion of a run
    pub fn finish(&mut self) {
        if self.is_running() {
            self.status = SimulationStatus::Completed;
        }
    }

    pub fn reset(&mut self) {
        self.ticks = 0;
        self.status = SimulationStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_has_no_drift() {
        let mut clock = SimulationClock::new(DEFAULT_TICK_SECONDS).unwrap();
        for _ in 0..30 {
            clock.advance();
        }
        assert_eq!(clock.ticks(), 30);
        assert!((clock.now() - 3.0).abs() < 1e-12);
        assert!((clock.epsilon() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_tick() {
        assert!(SimulationClock::new(0.0).is_err());
        assert!(SimulationClock::new(-0.1).is_err());
        assert!(SimulationClock::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_state_machine() {
        let mut clock = SimulationClock::new(0.1).unwrap();
        assert!(matches!(clock.stop(), Err(CloudVistaError::NotRunning)));

        clock.start().unwrap();
        assert!(matches!(clock.start(), Err(CloudVistaError::AlreadyRunning)));

        clock.stop().unwrap();
        assert_eq!(clock.status(), SimulationStatus::Idle);

        clock.start().unwrap();
        clock.advance();
        clock.finish();
        assert_eq!(clock.status(), SimulationStatus::Completed);

        clock.reset();
        assert_eq!(clock.status(), SimulationStatus::Idle);
        assert_eq!(clock.now(), 0.0);
    }
}
