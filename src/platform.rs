use anyhow::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::job_id::{JobId, TenantId};

/// When the device scheduler should fire a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCadence {
    /// Fire once, as soon as constraints allow.
    OneShot,
    /// Fire every `interval`, anywhere inside the trailing `flex` window.
    Periodic { interval: Duration, flex: Duration },
}

/// Conditions the device must satisfy before a job may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobConstraints {
    pub require_device_idle: bool,
    pub require_battery_not_low: bool,
}

/// Everything the device scheduler needs to register one maintenance job.
///
/// Equality is structural: a schedule request whose descriptor matches the
/// pending one for the same job id must be treated as a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub job_id: JobId,
    /// Tenant the job runs for, echoed back in the start event.
    pub tenant: TenantId,
    pub cadence: JobCadence,
    pub constraints: JobConstraints,
    /// Keep the registration across device reboots.
    pub persisted: bool,
}

/// Device job scheduling facility, implemented by the hosting process.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait JobScheduler: Send + Sync {
    /// Register `descriptor`, replacing any pending job with the same id.
    fn schedule(&self, descriptor: &JobDescriptor) -> Result<()>;

    /// Drop the pending job with this id, if any.
    fn cancel(&self, job_id: JobId) -> Result<()>;

    /// Descriptor of the pending job with this id, if one is registered.
    fn pending_job(&self, job_id: JobId) -> Result<Option<JobDescriptor>>;

    /// Tell the scheduler a delivered job has finished. `wants_reschedule`
    /// asks for another delivery because the run was stopped early.
    fn notify_finished(&self, job_id: JobId, wants_reschedule: bool);
}

/// Why the scheduler is revoking a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A scheduling constraint (idle, battery) no longer holds.
    ConstraintsLost,
    /// The device needs the execution slot for more urgent work.
    Preempted,
    /// The job exceeded the scheduler's execution time allowance.
    Timeout,
    SystemShutdown,
    Unknown,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ConstraintsLost => write!(f, "constraints no longer met"),
            StopReason::Preempted => write!(f, "preempted"),
            StopReason::Timeout => write!(f, "execution time exceeded"),
            StopReason::SystemShutdown => write!(f, "system shutdown"),
            StopReason::Unknown => write!(f, "unknown"),
        }
    }
}

/// Inbound notification that the scheduler wants a job to run now.
#[derive(Debug, Clone)]
pub struct StartEvent {
    pub job_id: JobId,
    /// Tenant the job was scheduled for; `None` when the delivery carries no
    /// usable tenant id.
    pub tenant: Option<TenantId>,
    /// Fires if the scheduler revokes this delivery; the run's stop token is
    /// derived from it.
    pub stop_handle: CancellationToken,
}

/// Inbound notification that the scheduler is revoking a delivered job.
#[derive(Debug, Clone)]
pub struct StopEvent {
    pub job_id: JobId,
    pub tenant: Option<TenantId>,
    /// Only logged, never branched on.
    pub reason: StopReason,
}

/// Answer to a start event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDisposition {
    /// Work accepted and running in the background.
    Accepted,
    /// Nothing will run for this delivery.
    NotHandled,
}

/// Answer to a stop event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDisposition {
    /// The run was interrupted, deliver the job again later.
    Reschedule,
    /// Nothing to retry.
    Discard,
}
