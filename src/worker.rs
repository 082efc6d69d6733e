use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::IndexingEngine;
use crate::job_id::{JobId, TenantId};
use crate::metrics;
use crate::platform::{JobScheduler, StartDisposition, StartEvent, StopDisposition, StopEvent};
use crate::registry::{RunRegistry, RunToken};

/// One full update invocation waiting for the worker slot.
#[derive(Debug)]
struct QueuedRun {
    tenant: TenantId,
    job_id: JobId,
    token: RunToken,
}

/// Terminal state of one full update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// No engine is installed; the scheduled job was cancelled instead.
    EngineUnavailable,
}

impl RunOutcome {
    fn as_label(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Failed => "failed",
            RunOutcome::EngineUnavailable => "engine_unavailable",
        }
    }
}

/// Inbound surface for the device scheduler's job callbacks.
///
/// Both callbacks are synchronous and return without waiting for the worker
/// slot; the actual reindex work happens on the [`MaintenanceWorker`] loop.
/// Cheap to clone, all clones feed the same worker.
#[derive(Clone)]
pub struct MaintenanceService {
    registry: Arc<RunRegistry>,
    queue_tx: mpsc::UnboundedSender<QueuedRun>,
}

impl MaintenanceService {
    /// A job was delivered for execution. Returns whether work was accepted
    /// and keeps running in the background.
    pub fn on_start_job(&self, event: StartEvent) -> StartDisposition {
        let Some(tenant) = event.tenant else {
            warn!(
                "Start event for job {} carries no tenant id, rejecting",
                event.job_id
            );
            return StartDisposition::NotHandled;
        };

        debug!(
            "Full update job {} started for tenant {}",
            event.job_id, tenant
        );

        // An entry still present here means an older run is outstanding. The
        // new start wins: the old run is asked to stop and abandoned before
        // its replacement is installed.
        if let Some(stale) = self.registry.current(tenant) {
            warn!("Cancelling unfinished full update run for tenant {}", tenant);
            stale.request_stop();
            metrics::record_overlap_cancellation();
        }

        let token = RunToken::attached_to(&event.stop_handle);
        self.registry.install(tenant, token.clone());

        let queued = QueuedRun {
            tenant,
            job_id: event.job_id,
            token,
        };
        if let Err(e) = self.queue_tx.send(queued) {
            // Worker loop is gone; retire the entry installed just above
            self.registry.remove_if_current(tenant, &e.0.token);
            warn!(
                "Maintenance worker is not running, rejecting start for tenant {}",
                tenant
            );
            return StartDisposition::NotHandled;
        }

        StartDisposition::Accepted
    }

    /// The scheduler is revoking a job it delivered earlier. Returns whether
    /// the job should be delivered again later.
    pub fn on_stop_job(&self, event: StopEvent) -> StopDisposition {
        let Some(tenant) = event.tenant else {
            warn!(
                "Stop event for job {} carries no tenant id, ignoring",
                event.job_id
            );
            return StopDisposition::Discard;
        };

        debug!(
            "Stopping full update job {} for tenant {} ({})",
            event.job_id, tenant, event.reason
        );

        match self.registry.take(tenant) {
            Some(token) => {
                token.request_stop();
                metrics::record_stop_event("signalled");
                // Interrupted rather than finished: ask for another delivery
                StopDisposition::Reschedule
            }
            None => {
                error!(
                    "Device scheduler stopped a full update for tenant {} that was not running",
                    tenant
                );
                metrics::record_stop_event("unknown_run");
                StopDisposition::Discard
            }
        }
    }

    /// Whether a run for `tenant` is outstanding (queued or executing).
    pub fn is_run_outstanding(&self, tenant: TenantId) -> bool {
        self.registry.current(tenant).is_some()
    }

    /// Number of outstanding runs across all tenants.
    pub fn outstanding_runs(&self) -> usize {
        self.registry.outstanding_runs()
    }
}

/// Single-consumer loop executing queued full update runs one at a time.
///
/// One worker per process: runs for different tenants queue behind each other
/// instead of competing with foreground work.
pub struct MaintenanceWorker {
    /// Engine doing the reindex work; absent when indexing is disabled.
    engine: Option<Arc<dyn IndexingEngine>>,

    /// Device scheduler, told about every finished run.
    platform: Arc<dyn JobScheduler>,

    /// Tokens of outstanding runs, shared with the service half.
    registry: Arc<RunRegistry>,

    /// Runs accepted by the service, awaiting the worker slot.
    queue_rx: mpsc::UnboundedReceiver<QueuedRun>,

    /// Token to signal worker shutdown.
    shutdown_token: CancellationToken,
}

impl MaintenanceWorker {
    /// Main worker loop. Consumes queued runs until shutdown.
    pub async fn run(mut self) {
        info!("Maintenance worker started");

        loop {
            // Biased so shutdown wins over queued work
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!("Maintenance worker received shutdown signal");
                    self.drain_queue();
                    break;
                }
                maybe_run = self.queue_rx.recv() => {
                    match maybe_run {
                        Some(run) => {
                            self.execute(run).await;
                        }
                        None => {
                            debug!("All maintenance service handles dropped, stopping worker");
                            break;
                        }
                    }
                }
            }
        }

        info!("Maintenance worker stopped");
    }

    /// Run one full update invocation to its terminal state.
    async fn execute(&self, run: QueuedRun) -> RunOutcome {
        let QueuedRun {
            tenant,
            job_id,
            token,
        } = run;

        metrics::set_runs_in_flight(1);
        let start_time = Instant::now();

        let outcome = match &self.engine {
            Some(engine) => {
                let engine = Arc::clone(engine);
                let run_token = token.clone();
                let result =
                    tokio::task::spawn_blocking(move || engine.run_full_update(tenant, &run_token))
                        .await;
                let elapsed = start_time.elapsed();

                match result {
                    Ok(Ok(())) => {
                        info!("Full update for tenant {} completed in {:?}", tenant, elapsed);
                        RunOutcome::Completed
                    }
                    Ok(Err(e)) => {
                        error!(
                            "Full update for tenant {} failed after {:?}: {:#}",
                            tenant, elapsed, e
                        );
                        RunOutcome::Failed
                    }
                    Err(e) => {
                        error!(
                            "Full update for tenant {} panicked after {:?}: {}",
                            tenant, elapsed, e
                        );
                        RunOutcome::Failed
                    }
                }
            }
            None => {
                // No engine will ever serve this schedule; drop the
                // registration instead of waking up for nothing again.
                error!(
                    "No indexing engine available, cancelling full update job {} for tenant {}",
                    job_id, tenant
                );
                if let Err(e) = self.platform.cancel(job_id) {
                    error!(
                        "Failed to cancel full update job {} for tenant {}: {:#}",
                        job_id, tenant, e
                    );
                }
                RunOutcome::EngineUnavailable
            }
        };

        // Teardown runs for every outcome: tell the scheduler the job
        // finished (asking for redelivery only when the run was stopped
        // early), then retire this run's registry entry unless a newer start
        // already replaced it.
        self.platform
            .notify_finished(job_id, token.is_stop_requested());
        if !self.registry.remove_if_current(tenant, &token) {
            debug!(
                "Registry entry for tenant {} was already replaced or removed",
                tenant
            );
        }

        metrics::set_runs_in_flight(0);
        metrics::record_full_update_run(outcome.as_label(), start_time.elapsed());

        outcome
    }

    /// Retire runs that were queued but never started. Their registry entries
    /// would otherwise outlive the worker.
    fn drain_queue(&mut self) {
        while let Ok(run) = self.queue_rx.try_recv() {
            debug!(
                "Dropping queued full update for tenant {} on shutdown",
                run.tenant
            );
            self.registry.remove_if_current(run.tenant, &run.token);
        }
    }
}

/// Create a worker and the service handle the host wires to its scheduler
/// callbacks. The run registry is built here, once, and shared by both halves.
pub fn create_maintenance_worker(
    engine: Option<Arc<dyn IndexingEngine>>,
    platform: Arc<dyn JobScheduler>,
    shutdown_token: CancellationToken,
) -> (MaintenanceWorker, MaintenanceService) {
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let registry = Arc::new(RunRegistry::new());

    let worker = MaintenanceWorker {
        engine,
        platform,
        registry: Arc::clone(&registry),
        queue_rx,
        shutdown_token,
    };

    let service = MaintenanceService { registry, queue_tx };

    (worker, service)
}
