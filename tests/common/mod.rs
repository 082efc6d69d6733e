//! Common test infrastructure
//!
//! Fake collaborators plus a fully wired harness for lifecycle tests. Tests
//! drive the public crate surface only: schedule through the facade, deliver
//! scheduler events to the service, observe the fakes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use index_custodian::{
    create_maintenance_worker, IndexingEngine, JobDescriptor, JobId, JobIdMapper, JobScheduler,
    MaintenanceScheduler, MaintenanceService, RunToken, Settings, StartDisposition, StartEvent,
    StopDisposition, StopEvent, StopReason, TenantId,
};

static TRACING: Once = Once::new();

/// Install a test subscriber once so RUST_LOG controls test log output.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

// ============================================================================
// Fake device scheduler
// ============================================================================

/// Device scheduler fake backed by a map of pending jobs.
#[derive(Default)]
pub struct FakeScheduler {
    pending: Mutex<HashMap<JobId, JobDescriptor>>,
    pub schedule_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    finished: Mutex<Vec<(JobId, bool)>>,
    fail: AtomicBool,
}

impl FakeScheduler {
    pub fn pending_descriptor(&self, job_id: JobId) -> Option<JobDescriptor> {
        self.pending.lock().unwrap().get(&job_id).cloned()
    }

    /// Make every scheduler operation fail until reset.
    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Finish notifications received so far, as (job id, wants_reschedule).
    pub fn finished_notifications(&self) -> Vec<(JobId, bool)> {
        self.finished.lock().unwrap().clone()
    }
}

impl JobScheduler for FakeScheduler {
    fn schedule(&self, descriptor: &JobDescriptor) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("device scheduler unavailable");
        }
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        self.pending
            .lock()
            .unwrap()
            .insert(descriptor.job_id, descriptor.clone());
        Ok(())
    }

    fn cancel(&self, job_id: JobId) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("device scheduler unavailable");
        }
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().unwrap().remove(&job_id);
        Ok(())
    }

    fn pending_job(&self, job_id: JobId) -> anyhow::Result<Option<JobDescriptor>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("device scheduler unavailable");
        }
        Ok(self.pending_descriptor(job_id))
    }

    fn notify_finished(&self, job_id: JobId, wants_reschedule: bool) {
        self.finished
            .lock()
            .unwrap()
            .push((job_id, wants_reschedule));
    }
}

// ============================================================================
// Recording engine
// ============================================================================

/// One observed engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineRun {
    pub tenant: TenantId,
    pub stopped_early: bool,
}

/// Indexing engine fake that records invocations and can hold or fail.
#[derive(Default)]
pub struct RecordingEngine {
    pub runs_started: AtomicUsize,
    hold: AtomicBool,
    fail: AtomicBool,
    observed: Mutex<Vec<EngineRun>>,
}

impl RecordingEngine {
    /// Keep invocations spinning until released or stopped.
    pub fn hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    pub fn fail_runs(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Finished invocations in execution order.
    pub fn runs(&self) -> Vec<EngineRun> {
        self.observed.lock().unwrap().clone()
    }
}

impl IndexingEngine for RecordingEngine {
    fn run_full_update(&self, tenant: TenantId, stop: &RunToken) -> anyhow::Result<()> {
        self.runs_started.fetch_add(1, Ordering::SeqCst);

        while self.hold.load(Ordering::SeqCst) && !stop.is_stop_requested() {
            std::thread::sleep(Duration::from_millis(5));
        }

        self.observed.lock().unwrap().push(EngineRun {
            tenant,
            stopped_early: stop.is_stop_requested(),
        });

        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("index rebuild failed");
        }
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A maintenance setup wired over fake collaborators, worker loop running.
pub struct TestHarness {
    pub scheduler: MaintenanceScheduler,
    pub service: MaintenanceService,
    pub platform: Arc<FakeScheduler>,
    pub engine: Arc<RecordingEngine>,
    pub shutdown: CancellationToken,
    mapper: JobIdMapper,
}

impl TestHarness {
    pub fn spawn() -> Self {
        Self::create(true)
    }

    /// Harness with indexing disabled, the way a host without an engine runs.
    pub fn spawn_without_engine() -> Self {
        Self::create(false)
    }

    fn create(with_engine: bool) -> Self {
        init_tracing();

        let platform = Arc::new(FakeScheduler::default());
        let engine = Arc::new(RecordingEngine::default());
        let shutdown = CancellationToken::new();

        let scheduler = MaintenanceScheduler::new(platform.clone(), Settings::default())
            .expect("reserved job id range must fit the supported tenant count");

        let worker_engine = with_engine.then(|| engine.clone() as Arc<dyn IndexingEngine>);
        let (worker, service) =
            create_maintenance_worker(worker_engine, platform.clone(), shutdown.clone());
        tokio::spawn(worker.run());

        Self {
            scheduler,
            service,
            platform,
            engine,
            shutdown,
            mapper: JobIdMapper::new().unwrap(),
        }
    }

    pub fn job_id(&self, tenant: u32) -> JobId {
        self.mapper.job_id(TenantId::new(tenant))
    }

    /// Deliver a start event the way the device scheduler would, returning
    /// the disposition and the stop handle backing the delivery.
    pub fn start_tenant(&self, tenant: u32) -> (StartDisposition, CancellationToken) {
        let stop_handle = CancellationToken::new();
        let disposition = self.service.on_start_job(StartEvent {
            job_id: self.job_id(tenant),
            tenant: Some(TenantId::new(tenant)),
            stop_handle: stop_handle.clone(),
        });
        (disposition, stop_handle)
    }

    pub fn stop_tenant(&self, tenant: u32) -> StopDisposition {
        self.service.on_stop_job(StopEvent {
            job_id: self.job_id(tenant),
            tenant: Some(TenantId::new(tenant)),
            reason: StopReason::ConstraintsLost,
        })
    }

    /// Give the worker loop time to process what was queued.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
