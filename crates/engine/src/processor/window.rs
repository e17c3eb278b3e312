use std::collections::VecDeque;

use crate::alarm::AlarmState;
use crate::expr::{AggregateFn, CompareOp};

/// Running aggregates for one evaluation period. Datapoints without a value
/// are counted but contribute nothing to the value aggregates.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    points: u64,
    values: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Bucket {
    fn observe(&mut self, value: Option<f64>) {
        self.points += 1;
        if let Some(v) = value {
            if self.values == 0 {
                self.min = v;
                self.max = v;
            } else {
                self.min = self.min.min(v);
                self.max = self.max.max(v);
            }
            self.values += 1;
            self.sum += v;
        }
    }

    pub fn aggregate(&self, function: AggregateFn) -> Option<f64> {
        match function {
            AggregateFn::Count => Some(self.points as f64),
            AggregateFn::Sum if self.values > 0 => Some(self.sum),
            AggregateFn::Avg if self.values > 0 => Some(self.sum / self.values as f64),
            AggregateFn::Max if self.values > 0 => Some(self.max),
            AggregateFn::Min if self.values > 0 => Some(self.min),
            _ => None,
        }
    }
}

/// A ring of up to `periods` buckets, each `window_ms` wide, keyed by the
/// datapoint's own timestamp so out-of-order arrivals land in the right
/// period. Buckets older than the horizon relative to the newest bucket are
/// evicted; datapoints older than the horizon are ignored.
#[derive(Debug, Clone)]
pub struct PeriodRing {
    window_ms: i64,
    periods: usize,
    buckets: VecDeque<(i64, Bucket)>,
}

impl PeriodRing {
    pub fn new(window_secs: i64, periods: usize) -> Self {
        Self {
            window_ms: window_secs * 1000,
            periods,
            buckets: VecDeque::new(),
        }
    }

    pub fn observe(&mut self, timestamp_ms: i64, value: Option<f64>) {
        let idx = timestamp_ms.div_euclid(self.window_ms);
        if let Some(&(newest, _)) = self.buckets.back() {
            if idx <= newest - self.periods as i64 {
                return;
            }
        }
        match self.buckets.binary_search_by_key(&idx, |&(i, _)| i) {
            Ok(pos) => self.buckets[pos].1.observe(value),
            Err(pos) => {
                self.buckets.insert(pos, (idx, Bucket::default()));
                self.buckets[pos].1.observe(value);
            }
        }
        self.evict();
    }

    fn evict(&mut self) {
        let Some(&(newest, _)) = self.buckets.back() else {
            return;
        };
        let oldest_kept = newest - self.periods as i64 + 1;
        while let Some(&(idx, _)) = self.buckets.front() {
            if idx < oldest_kept {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    /// Tri-state result plus the available per-bucket aggregates
    /// (oldest-first). UNDETERMINED unless every period in the horizon has a
    /// bucket and every bucket yields an aggregate; then ALARM iff every
    /// aggregate satisfies the comparison.
    pub fn evaluate(
        &self,
        function: AggregateFn,
        operator: CompareOp,
        threshold: f64,
    ) -> (AlarmState, Vec<f64>) {
        let aggregates: Vec<Option<f64>> = self
            .buckets
            .iter()
            .map(|(_, b)| b.aggregate(function))
            .collect();
        let values: Vec<f64> = aggregates.iter().copied().flatten().collect();

        if self.buckets.len() < self.periods || values.len() < aggregates.len() {
            return (AlarmState::Undetermined, values);
        }
        let state = if values.iter().all(|v| operator.check(*v, threshold)) {
            AlarmState::Alarm
        } else {
            AlarmState::Ok
        };
        (state, values)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }
}
