//! Simulation reports for persistence and export collaborators
//!
//! A report is a self-contained JSON document describing a finished (or
//! stopped) run: the scheduler used, aggregate statistics, utilization
//! history and one record per completed task.

use chrono::{DateTime, Utc};
use cloudvista_core::{CloudVistaError, Result, SchedulerKind, TaskId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::simulator::Simulation;
use crate::stats::{Statistics, UtilizationSample};
use crate::types::Task;

/// Saved form of a completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTaskRecord {
    pub id: TaskId,
    pub name: String,
    pub cpu_required: u32,
    pub ram_required: u32,
    pub execution_time: f64,
    pub priority: i32,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub cost: f64,
}

impl From<&Task> for CompletedTaskRecord {
    fn from(task: &Task) -> Self {
        CompletedTaskRecord {
            id: task.id,
            name: task.name.clone(),
            cpu_required: task.cpu_required,
            ram_required: task.ram_required,
            execution_time: task.execution_time,
            priority: task.priority,
            start_time: task.start_time,
            end_time: task.end_time,
            cost: task.cost,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub simulation_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub scheduler: Option<SchedulerKind>,
    pub simulated_time: f64,
    pub statistics: Statistics,
    pub utilization: Vec<UtilizationSample>,
    pub completed_tasks: Vec<CompletedTaskRecord>,
}

impl SimulationReport {
    /// Build a report; fails with `NoCompletedTasks` before anything finished
    pub fn from_simulation(sim: &Simulation) -> Result<Self> {
        let completed_tasks: Vec<CompletedTaskRecord> = sim
            .state()
            .completed()
            .map(CompletedTaskRecord::from)
            .collect();
        if completed_tasks.is_empty() {
            return Err(CloudVistaError::NoCompletedTasks);
        }

        Ok(SimulationReport {
            simulation_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            scheduler: sim.scheduler_kind(),
            simulated_time: sim.now(),
            statistics: sim.statistics(),
            utilization: sim.utilization_history(),
            completed_tasks,
        })
    }

    /// File name derived from the generation time, safe on every filesystem
    pub fn file_name(&self) -> String {
        let stamp = self.generated_at.to_rfc3339().replace([':', '.', '+'], "-");
        format!("cloudvista_report_{stamp}.json")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(feature = "async")]
pub use file_sink::JsonFileSink;

#[cfg(feature = "async")]
mod file_sink {
    use std::path::PathBuf;

    use async_trait::async_trait;
    use cloudvista_core::{ReportSink, Result};
    use tracing::info;

    use super::SimulationReport;

    /// Writes each report as a pretty-printed JSON file into a directory
    pub struct JsonFileSink {
        dir: PathBuf,
    }

    impl JsonFileSink {
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self { dir: dir.into() }
        }
    }

    #[async_trait]
    impl ReportSink<SimulationReport> for JsonFileSink {
        fn name(&self) -> &str {
            "json-file"
        }

        async fn save(&self, report: &SimulationReport) -> Result<String> {
            tokio::fs::create_dir_all(&self.dir).await?;
            let path = self.dir.join(report.file_name());
            tokio::fs::write(&path, report.to_json()?).await?;

            let location = path.display().to_string();
            info!(
                simulation_id = %report.simulation_id,
                path = %location,
                "Simulation report saved"
            );
            Ok(location)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::types::TaskRequest;
    use cloudvista_core::VmSpec;

    fn finished_simulation() -> Simulation {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        sim.initialize_vms(VmSpec::new(1, 4, 8, 100)).unwrap();
        sim.submit_task(TaskRequest::new("render", 2, 4, 0.5).with_priority(7))
            .unwrap();
        sim.start(SchedulerKind::Priority, None).unwrap();
        sim.run(1_000).unwrap();
        sim
    }

    #[test]
    fn test_report_requires_completed_tasks() {
        let sim = Simulation::new(SimulationConfig::default()).unwrap();
        assert!(matches!(
            SimulationReport::from_simulation(&sim),
            Err(CloudVistaError::NoCompletedTasks)
        ));
    }

    #[test]
    fn test_report_contents() {
        let report = SimulationReport::from_simulation(&finished_simulation()).unwrap();

        assert_eq!(report.scheduler, Some(SchedulerKind::Priority));
        assert_eq!(report.completed_tasks.len(), 1);
        assert_eq!(report.statistics.completed_tasks, 1);
        assert!(!report.utilization.is_empty());
        assert!(report.file_name().starts_with("cloudvista_report_"));
        assert!(!report.file_name().contains(':'));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["scheduler"], "priority");
        assert_eq!(json["completed_tasks"][0]["cpu_required"], 2);
        assert_eq!(json["completed_tasks"][0]["priority"], 7);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_json_file_sink_writes_report() {
        use cloudvista_core::ReportSink;

        let dir = std::env::temp_dir().join(format!("cloudvista-test-{}", Uuid::new_v4()));
        let sink = JsonFileSink::new(&dir);
        let report = SimulationReport::from_simulation(&finished_simulation()).unwrap();

        let location = sink.save(&report).await.unwrap();
        let saved: SimulationReport =
            serde_json::from_str(&std::fs::read_to_string(&location).unwrap()).unwrap();
        assert_eq!(saved.simulation_id, report.simulation_id);
        assert_eq!(sink.name(), "json-file");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
