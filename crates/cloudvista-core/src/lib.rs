//! CloudVista Core - Shared types and traits
//!
//! This crate defines the abstractions shared between:
//! - cloudvista-simulation-engine (the tick-driven scheduler simulator)
//! - collaborators that persist or render finished runs
//!
//! Key types:
//! - Scheduling policy and lifecycle enums
//! - VM batch and cost-rate specifications
//! - ReportSink trait (interface for result persistence)
//! - Error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
