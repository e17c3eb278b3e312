use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-loop counters exposed at `/metrics`; one relaxed atomic each so a
/// stalled loop is visible from the outside.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    batches_processed: AtomicU64,
    datapoints_ingested: AtomicU64,
    datapoints_dropped: AtomicU64,
    definitions_applied: AtomicU64,
    definitions_rejected: AtomicU64,
    reconcile_rounds: AtomicU64,
    reconcile_failures: AtomicU64,
    alarms_published: AtomicU64,
    publish_failures: AtomicU64,
    active_processors: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_batches_processed(&self) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_datapoints_ingested(&self, count: u64) {
        self.datapoints_ingested.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_datapoints_dropped(&self) {
        self.datapoints_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_definitions_applied(&self) {
        self.definitions_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_definitions_rejected(&self) {
        self.definitions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconcile_rounds(&self) {
        self.reconcile_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconcile_failures(&self) {
        self.reconcile_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_alarms_published(&self, count: u64) {
        self.alarms_published.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_publish_failures(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_active_processors(&self, count: u64) {
        self.active_processors.store(count, Ordering::Relaxed);
    }

    pub fn batches_processed_val(&self) -> u64 {
        self.batches_processed.load(Ordering::Relaxed)
    }

    pub fn datapoints_ingested_val(&self) -> u64 {
        self.datapoints_ingested.load(Ordering::Relaxed)
    }

    pub fn datapoints_dropped_val(&self) -> u64 {
        self.datapoints_dropped.load(Ordering::Relaxed)
    }

    pub fn definitions_applied_val(&self) -> u64 {
        self.definitions_applied.load(Ordering::Relaxed)
    }

    pub fn definitions_rejected_val(&self) -> u64 {
        self.definitions_rejected.load(Ordering::Relaxed)
    }

    pub fn reconcile_rounds_val(&self) -> u64 {
        self.reconcile_rounds.load(Ordering::Relaxed)
    }

    pub fn reconcile_failures_val(&self) -> u64 {
        self.reconcile_failures.load(Ordering::Relaxed)
    }

    pub fn alarms_published_val(&self) -> u64 {
        self.alarms_published.load(Ordering::Relaxed)
    }

    pub fn publish_failures_val(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    pub fn active_processors_val(&self) -> u64 {
        self.active_processors.load(Ordering::Relaxed)
    }
}
