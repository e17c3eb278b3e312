use std::collections::HashMap;

use crate::alarm::{AlarmState, MetricId};

use super::window::PeriodRing;
use super::Leaf;

/// Independent evaluation state for one combination of match-by values:
/// a ring per leaf, the last recorded top-level state, and the identities
/// of the datapoint streams feeding it.
#[derive(Debug)]
pub struct EvaluationGroup {
    rings: HashMap<String, PeriodRing>,
    state: AlarmState,
    state_updated_ms: i64,
    metrics: HashMap<MetricId, i64>,
}

impl EvaluationGroup {
    pub fn new(leaves: &[Leaf]) -> Self {
        Self {
            rings: leaves
                .iter()
                .map(|l| (l.canonical.clone(), l.ring()))
                .collect(),
            state: AlarmState::Undetermined,
            state_updated_ms: 0,
            metrics: HashMap::new(),
        }
    }

    pub fn observe(&mut self, canonical: &str, timestamp_ms: i64, value: Option<f64>) {
        if let Some(ring) = self.rings.get_mut(canonical) {
            ring.observe(timestamp_ms, value);
        }
    }

    pub fn record_metric(&mut self, id: MetricId, timestamp_ms: i64) {
        let last_seen = self.metrics.entry(id).or_insert(timestamp_ms);
        *last_seen = (*last_seen).max(timestamp_ms);
    }

    pub fn evaluate_leaf(&self, leaf: &Leaf) -> (AlarmState, Vec<f64>) {
        match self.rings.get(&leaf.canonical) {
            Some(ring) => ring.evaluate(leaf.expr.function, leaf.expr.operator, leaf.expr.threshold),
            None => (AlarmState::Undetermined, Vec::new()),
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn state_updated_ms(&self) -> i64 {
        self.state_updated_ms
    }

    pub fn set_state(&mut self, state: AlarmState, now_ms: i64) {
        self.state = state;
        self.state_updated_ms = now_ms;
    }

    /// Re-keys the rings after a definition update: leaves still present (by
    /// canonical form) keep their accumulated buckets, new leaves start
    /// empty, dropped leaves are discarded. The recorded state survives so
    /// the next evaluation emits the transition if the result changed.
    pub fn retarget(&mut self, leaves: &[Leaf]) {
        let mut rings = HashMap::with_capacity(leaves.len());
        for leaf in leaves {
            let ring = self
                .rings
                .remove(&leaf.canonical)
                .unwrap_or_else(|| leaf.ring());
            rings.insert(leaf.canonical.clone(), ring);
        }
        self.rings = rings;
    }

    /// Metric identities still inside the retained horizon, oldest entries
    /// pruned relative to the most recent arrival.
    pub fn contributing_metrics(&mut self, horizon_ms: i64) -> Vec<MetricId> {
        if let Some(&newest) = self.metrics.values().max() {
            let cutoff = newest - horizon_ms;
            self.metrics.retain(|_, seen| *seen >= cutoff);
        }
        let mut ids: Vec<MetricId> = self.metrics.keys().cloned().collect();
        ids.sort();
        ids
    }
}
