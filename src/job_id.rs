use thiserror::Error;

/// Lowest job id reserved for full update maintenance jobs.
pub const MIN_MAINTENANCE_JOB_ID: u32 = 16_942_831;

/// Highest job id reserved for full update maintenance jobs.
pub const MAX_MAINTENANCE_JOB_ID: u32 = 16_964_306;

/// Most tenants a single device is ever expected to host.
pub const MAX_SUPPORTED_TENANTS: u32 = 21_475;

/// Identifier of an OS user account whose data is indexed independently.
///
/// Stable for the lifetime of the account and never reused while it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(u32);

impl TenantId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a job registered with the device scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u32);

impl JobId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur when setting up the job id range.
#[derive(Debug, Error)]
pub enum JobIdRangeError {
    #[error("Job id range [{min}, {max}] is inverted")]
    InvertedRange { min: u32, max: u32 },

    #[error("Job id range [{min}, {max}] holds {capacity} ids but {required} tenants must fit")]
    RangeTooSmall {
        min: u32,
        max: u32,
        capacity: u64,
        required: u32,
    },
}

/// Deterministic mapping from a tenant to its reserved scheduler job id.
///
/// The range check runs once at construction; after that [`JobIdMapper::job_id`]
/// is total and injective over tenants `0..max_tenants`.
#[derive(Debug, Clone, Copy)]
pub struct JobIdMapper {
    base: u32,
    max_tenants: u32,
}

impl JobIdMapper {
    /// Mapper over the reserved maintenance job id range.
    pub fn new() -> Result<Self, JobIdRangeError> {
        Self::with_range(
            MIN_MAINTENANCE_JOB_ID,
            MAX_MAINTENANCE_JOB_ID,
            MAX_SUPPORTED_TENANTS,
        )
    }

    /// Mapper over an arbitrary id range, validated against `max_tenants`.
    pub fn with_range(min: u32, max: u32, max_tenants: u32) -> Result<Self, JobIdRangeError> {
        if max < min {
            return Err(JobIdRangeError::InvertedRange { min, max });
        }
        let capacity = u64::from(max) - u64::from(min) + 1;
        if capacity < u64::from(max_tenants) {
            return Err(JobIdRangeError::RangeTooSmall {
                min,
                max,
                capacity,
                required: max_tenants,
            });
        }
        Ok(Self {
            base: min,
            max_tenants,
        })
    }

    /// Job id reserved for `tenant`'s full update job.
    pub fn job_id(&self, tenant: TenantId) -> JobId {
        debug_assert!(tenant.get() < self.max_tenants);
        JobId(self.base + tenant.get())
    }
}
