use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::Settings;
use crate::job_id::{JobId, JobIdMapper, JobIdRangeError, TenantId};
use crate::metrics;
use crate::platform::{JobCadence, JobConstraints, JobDescriptor, JobScheduler};

/// Schedules and cancels full update jobs with the device scheduler.
///
/// Submission is idempotent: a request whose descriptor is value-equal to the
/// pending one for the same job id is skipped instead of resubmitted, so
/// callers can re-issue their schedule on every boot without churning the
/// device scheduler.
pub struct MaintenanceScheduler {
    platform: Arc<dyn JobScheduler>,
    mapper: JobIdMapper,
    settings: Settings,
}

impl MaintenanceScheduler {
    /// Fails when the reserved job id range cannot hold the supported tenant
    /// count; this is checked here once, not per call.
    pub fn new(platform: Arc<dyn JobScheduler>, settings: Settings) -> Result<Self, JobIdRangeError> {
        Ok(Self {
            platform,
            mapper: JobIdMapper::new()?,
            settings,
        })
    }

    /// Register a full update job for `tenant`, replacing a pending one only
    /// when the parameters actually changed.
    pub fn schedule_full_update(
        &self,
        tenant: TenantId,
        periodic: bool,
        interval: Duration,
    ) -> Result<()> {
        let job_id = self.mapper.job_id(tenant);
        let descriptor = self.descriptor_for(job_id, tenant, periodic, interval);

        if let Some(pending) = self.platform.pending_job(job_id)? {
            if pending == descriptor {
                debug!(
                    "Full update job {} for tenant {} already scheduled with identical parameters",
                    job_id, tenant
                );
                metrics::record_schedule_request("skipped_identical");
                return Ok(());
            }
        }

        self.platform.schedule(&descriptor)?;
        metrics::record_schedule_request("submitted");
        debug!("Scheduled full update job {} for tenant {}", job_id, tenant);
        Ok(())
    }

    /// Periodic full update at the interval configured in [`Settings`].
    pub fn schedule_periodic_full_update(&self, tenant: TenantId) -> Result<()> {
        self.schedule_full_update(tenant, true, self.settings.full_update_interval())
    }

    /// Drop the pending full update job for `tenant`, if any.
    pub fn cancel_full_update(&self, tenant: TenantId) -> Result<()> {
        let job_id = self.mapper.job_id(tenant);
        self.platform.cancel(job_id)?;
        debug!("Cancelled pending full update job {} for tenant {}", job_id, tenant);
        Ok(())
    }

    pub fn is_full_update_scheduled(&self, tenant: TenantId) -> Result<bool> {
        let job_id = self.mapper.job_id(tenant);
        Ok(self.platform.pending_job(job_id)?.is_some())
    }

    /// Best-effort variant for tenant removal paths: device scheduler
    /// failures are logged and swallowed, never propagated.
    pub fn cancel_if_scheduled(&self, tenant: TenantId) {
        if let Err(e) = self.try_cancel_if_scheduled(tenant) {
            error!(
                "Failed to cancel pending full update for tenant {}: {:#}",
                tenant, e
            );
        }
    }

    fn try_cancel_if_scheduled(&self, tenant: TenantId) -> Result<()> {
        if self.is_full_update_scheduled(tenant)? {
            self.cancel_full_update(tenant)?;
        }
        Ok(())
    }

    fn descriptor_for(
        &self,
        job_id: JobId,
        tenant: TenantId,
        periodic: bool,
        interval: Duration,
    ) -> JobDescriptor {
        let cadence = if periodic {
            // Half the interval as flex constrains each run to the back half
            // of its period, keeping consecutive runs apart across period
            // boundaries.
            JobCadence::Periodic {
                interval,
                flex: interval / 2,
            }
        } else {
            JobCadence::OneShot
        };

        JobDescriptor {
            job_id,
            tenant,
            cadence,
            constraints: JobConstraints {
                require_device_idle: self.settings.require_device_idle,
                require_battery_not_low: self.settings.require_battery_not_low,
            },
            persisted: self.settings.persisted,
        }
    }
}
