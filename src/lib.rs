//! Index Custodian
//!
//! Per-tenant orchestration of full index updates: schedules maintenance jobs
//! with the device's job scheduler, serializes their execution onto a single
//! worker slot, and propagates cooperative cancellation when runs overlap or
//! get revoked. The host provides the two collaborators at the edges, a
//! [`JobScheduler`] and an [`IndexingEngine`].

pub mod config;
pub mod engine;
pub mod job_id;
pub mod metrics;
pub mod platform;
pub mod registry;
pub mod scheduler;
pub mod worker;

// Re-export commonly used types for convenience
pub use config::Settings;
pub use engine::IndexingEngine;
pub use job_id::{JobId, JobIdMapper, JobIdRangeError, TenantId};
pub use platform::{
    JobCadence, JobConstraints, JobDescriptor, JobScheduler, StartDisposition, StartEvent,
    StopDisposition, StopEvent, StopReason,
};
pub use registry::{RunRegistry, RunToken};
pub use scheduler::MaintenanceScheduler;
pub use worker::{create_maintenance_worker, MaintenanceService, MaintenanceWorker, RunOutcome};
