//! Radio Control Gateway Core
//!
//! This crate turns commands aimed at heterogeneous vendor radios into one
//! uniform surface with consistent error codes, deadlines, audit records
//! and state tracking.
//!
//! # Architecture
//!
//! - [`Inventory`] owns every known radio, its adapter and the single
//!   "active" designation
//! - [`Orchestrator`] validates commands, dispatches them to the active
//!   adapter under a per-command deadline, and normalizes failures
//! - [`AuditSink`] and [`TelemetrySink`] are the ports every command reports
//!   through; [`TelemetryHub`] and [`MemoryAuditLog`] are in-tree sinks
//! - [`TimingConfig`] carries command timeouts and the optional [`BandPlan`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rcc_core::{Inventory, Orchestrator, TimingConfig, TracingAuditSink};
//!
//! # async fn run(adapter: Arc<dyn rcc_adapter::RadioAdapter>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = TimingConfig::load()?;
//! let inventory = Arc::new(Inventory::new());
//! inventory
//!     .register_and_load("radio-1", adapter, config.commands.get_state)
//!     .await?;
//!
//! let orchestrator = Orchestrator::new(&config)
//!     .with_inventory(inventory)
//!     .with_audit(Arc::new(TracingAuditSink));
//!
//! orchestrator.set_power("radio-1", 20.0).await?;
//! orchestrator.set_channel_by_index("radio-1", 6).await?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod band_plan;
pub mod config;
mod deadline;
pub mod error;
pub mod inventory;
pub mod orchestrator;
pub mod telemetry;

pub use audit::{AuditEntry, AuditResult, AuditSink, MemoryAuditLog, TracingAuditSink};
pub use band_plan::{BandChannel, BandPlan, BandPlanError, DEFAULT_BAND};
pub use config::{
    CommandTimeouts, ConfigError, EventBufferConfig, HeartbeatConfig, ProbeBackoff, ProbeConfig,
    TimingConfig, TimingOverrides,
};
pub use error::{CommandError, ErrorCode, InventoryError};
pub use inventory::{Inventory, Radio, RadioList, RadioStatus};
pub use orchestrator::{
    validate_frequency, validate_power, Action, Orchestrator, MAX_FREQUENCY_MHZ, MIN_FREQUENCY_MHZ,
};
pub use telemetry::{EventKind, TelemetryError, TelemetryEvent, TelemetryHub, TelemetrySink};
