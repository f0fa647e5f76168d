//! Error types for CloudVista

use thiserror::Error;

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, CloudVistaError>;

/// Core error type for CloudVista operations
#[derive(Error, Debug)]
pub enum CloudVistaError {
    /// Bad VM, task or engine parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Attempted double-assignment or over-commit of a VM
    #[error("Resource conflict on VM {vm_id}: {reason}")]
    ResourceConflict { vm_id: u64, reason: String },

    #[error("Simulation is already running")]
    AlreadyRunning,

    #[error("Simulation is not running")]
    NotRunning,

    #[error("No VMs initialized")]
    NoVms,

    #[error("No pending tasks to simulate")]
    NoPendingTasks,

    #[error("No completed tasks to report")]
    NoCompletedTasks,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudVistaError {
    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a resource conflict error for a VM
    pub fn conflict(vm_id: u64, reason: impl Into<String>) -> Self {
        Self::ResourceConflict {
            vm_id,
            reason: reason.into(),
        }
    }
}
