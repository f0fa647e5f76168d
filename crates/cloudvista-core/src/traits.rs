//! Core traits for CloudVista
//!
//! Finished runs leave the engine through the ReportSink trait. The engine
//! never depends on how a sink stores or renders what it receives.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Persistence collaborator for completed simulation runs
#[async_trait]
pub trait ReportSink<R>: Send + Sync
where
    R: Serialize + Send + Sync,
{
    /// Sink identity (for logging)
    fn name(&self) -> &str;

    /// Store a report and return a locator for it (path, id, URL...)
    async fn save(&self, report: &R) -> Result<String>;
}
