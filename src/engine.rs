//! Indexing engine trait, the collaborator that performs the actual reindex

use crate::job_id::TenantId;
use crate::registry::RunToken;

/// Engine that rebuilds one tenant's index from scratch.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait IndexingEngine: Send + Sync {
    /// Run a full update for `tenant`, synchronously.
    ///
    /// Long-running. Implementations must poll `stop` at reasonable points
    /// and return in bounded time once a stop has been requested; a stopped
    /// run may return `Ok` with partial work done.
    /// Returns an error if the update fails.
    fn run_full_update(&self, tenant: TenantId, stop: &RunToken) -> anyhow::Result<()>;
}
