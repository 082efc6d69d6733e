use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::job_id::TenantId;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(0);

/// Cancellation handle for one maintenance run.
///
/// Wraps a token derived from the scheduler's stop handle, plus a
/// process-unique run id so a registry entry can be matched back to the exact
/// run that installed it. Clones refer to the same run.
#[derive(Debug, Clone)]
pub struct RunToken {
    run_id: u64,
    token: CancellationToken,
}

impl RunToken {
    /// Token for a fresh run, linked to the scheduler's stop handle: when the
    /// handle fires, this token observes the stop request too.
    pub fn attached_to(stop_handle: &CancellationToken) -> Self {
        Self {
            run_id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            token: stop_handle.child_token(),
        }
    }

    /// Ask the run holding this token to stop. Advisory: returns immediately,
    /// the run keeps going until it observes the flag.
    pub fn request_stop(&self) {
        self.token.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether `other` refers to the same run as this token.
    pub fn same_run(&self, other: &RunToken) -> bool {
        self.run_id == other.run_id
    }
}

/// Live cancellation tokens for in-flight maintenance runs, keyed by tenant.
///
/// At most one entry per tenant; absence means no run is outstanding. The lock
/// is held only for map reads and writes, callers signal tokens after
/// releasing it.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<TenantId, RunToken>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token of the run currently outstanding for `tenant`, if any.
    pub fn current(&self, tenant: TenantId) -> Option<RunToken> {
        self.runs.lock().unwrap().get(&tenant).cloned()
    }

    /// Install `token` as the outstanding run for `tenant`, returning the
    /// replaced token if one was present.
    pub fn install(&self, tenant: TenantId, token: RunToken) -> Option<RunToken> {
        self.runs.lock().unwrap().insert(tenant, token)
    }

    /// Remove and return the outstanding token for `tenant`.
    pub fn take(&self, tenant: TenantId) -> Option<RunToken> {
        self.runs.lock().unwrap().remove(&tenant)
    }

    /// Remove the entry for `tenant` only if it still belongs to `token`'s
    /// run, returning whether an entry was removed.
    ///
    /// A run tearing down can lose the race against an overlapping start that
    /// already replaced its entry; the identity check keeps the newer run's
    /// bookkeeping intact.
    pub fn remove_if_current(&self, tenant: TenantId, token: &RunToken) -> bool {
        let mut runs = self.runs.lock().unwrap();
        match runs.get(&tenant) {
            Some(current) if current.same_run(token) => {
                runs.remove(&tenant);
                true
            }
            _ => false,
        }
    }

    /// Number of runs currently outstanding across all tenants.
    pub fn outstanding_runs(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}
