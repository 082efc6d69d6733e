use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};
use std::time::Duration;

/// Metric name prefix for all custodian metrics
const PREFIX: &str = "custodian";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Full update run metrics
    pub static ref FULL_UPDATE_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_full_update_runs_total"), "Finished full update runs by outcome"),
        &["outcome"]
    ).expect("Failed to create full_update_runs_total metric");

    pub static ref FULL_UPDATE_RUN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_full_update_run_duration_seconds"),
            "Full update run duration in seconds"
        )
        .buckets(vec![0.1, 1.0, 10.0, 60.0, 300.0, 1800.0, 3600.0])
    ).expect("Failed to create full_update_run_duration_seconds metric");

    pub static ref FULL_UPDATE_RUNS_IN_FLIGHT: Gauge = Gauge::new(
        format!("{PREFIX}_full_update_runs_in_flight"),
        "Full update runs currently executing"
    ).expect("Failed to create full_update_runs_in_flight metric");

    // Lifecycle event metrics
    pub static ref OVERLAP_CANCELLATIONS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_overlap_cancellations_total"),
        "Stale runs cancelled because a newer start arrived for the same tenant"
    ).expect("Failed to create overlap_cancellations_total metric");

    pub static ref STOP_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_stop_events_total"), "Stop events by handling result"),
        &["result"]
    ).expect("Failed to create stop_events_total metric");

    // Scheduling metrics
    pub static ref SCHEDULE_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_schedule_requests_total"), "Schedule requests by decision"),
        &["decision"]
    ).expect("Failed to create schedule_requests_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(FULL_UPDATE_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FULL_UPDATE_RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(FULL_UPDATE_RUNS_IN_FLIGHT.clone()));
    let _ = REGISTRY.register(Box::new(OVERLAP_CANCELLATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STOP_EVENTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SCHEDULE_REQUESTS_TOTAL.clone()));

    tracing::info!("Maintenance metrics initialized");
}

/// Record a finished full update run
pub fn record_full_update_run(outcome: &str, duration: Duration) {
    FULL_UPDATE_RUNS_TOTAL.with_label_values(&[outcome]).inc();

    FULL_UPDATE_RUN_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Update the number of runs currently executing
pub fn set_runs_in_flight(count: i64) {
    FULL_UPDATE_RUNS_IN_FLIGHT.set(count as f64);
}

/// Record a stale run cancelled by an overlapping start
pub fn record_overlap_cancellation() {
    OVERLAP_CANCELLATIONS_TOTAL.inc();
}

/// Record a stop event and how it was handled
pub fn record_stop_event(result: &str) {
    STOP_EVENTS_TOTAL.with_label_values(&[result]).inc();
}

/// Record a schedule request and the decision taken
pub fn record_schedule_request(decision: &str) {
    SCHEDULE_REQUESTS_TOTAL.with_label_values(&[decision]).inc();
}
