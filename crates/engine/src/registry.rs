use std::collections::HashMap;

use vigil_common::datapoint::MetricDatapoint;
use vigil_common::definition::{AlarmDefinition, DefinitionChange};

use crate::alarm::AlarmDocument;
use crate::processor::ThresholdingProcessor;

struct Entry {
    processor: ThresholdingProcessor,
    // raw content of the last listing element seen for this id, used to
    // detect changes in snapshot mode
    last_seen: AlarmDefinition,
    seen_generation: u64,
}

/// The live population of processors, one per alarm definition id. All
/// access goes through the engine's single exclusive lock; the registry
/// itself is plain single-threaded state.
#[derive(Default)]
pub struct ProcessorRegistry {
    entries: HashMap<String, Entry>,
    generation: u64,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Applies one discrete change record (event-driven reconciliation).
    /// Unknown ids on update/delete are silently ignored; a definition whose
    /// expression fails to parse is logged and dropped, never registered.
    pub fn apply_change(&mut self, change: DefinitionChange) {
        match change {
            DefinitionChange::Create(def) => {
                if self.entries.contains_key(&def.id) {
                    tracing::debug!(definition_id = %def.id, "definition already registered");
                    return;
                }
                self.insert(def);
            }
            DefinitionChange::Update(def) => {
                if let Some(entry) = self.entries.get_mut(&def.id) {
                    let id = def.id.clone();
                    entry.last_seen = def.clone();
                    let updated = entry.processor.update_definition(def);
                    if updated {
                        tracing::info!(definition_id = %id, "definition updated");
                    } else {
                        tracing::warn!(definition_id = %id, "definition update rejected");
                    }
                }
            }
            DefinitionChange::Delete { id } => {
                if self.entries.remove(&id).is_some() {
                    tracing::info!(definition_id = %id, "definition removed");
                }
            }
        }
    }

    /// One snapshot-diff round over a full listing: create absent ids,
    /// update changed ones, stamp everything listed with a fresh generation,
    /// then sweep the entries the listing no longer contains. Callers skip
    /// the round entirely when the listing fetch failed.
    pub fn reconcile(&mut self, listing: Vec<AlarmDefinition>) {
        self.generation += 1;
        let generation = self.generation;

        for def in listing {
            match self.entries.get_mut(&def.id) {
                Some(entry) => {
                    if entry.last_seen != def {
                        let id = def.id.clone();
                        entry.last_seen = def.clone();
                        if !entry.processor.update_definition(def) {
                            tracing::warn!(definition_id = %id, "definition update rejected");
                        }
                    }
                    entry.seen_generation = generation;
                }
                None => {
                    self.insert(def);
                }
            }
        }

        let before = self.entries.len();
        self.entries.retain(|_, e| e.seen_generation == generation);
        let swept = before - self.entries.len();
        if swept > 0 {
            tracing::info!(swept, "expired definitions removed");
        }
    }

    fn insert(&mut self, def: AlarmDefinition) {
        let id = def.id.clone();
        match ThresholdingProcessor::new(def.clone()) {
            Ok(processor) => {
                tracing::info!(definition_id = %id, "definition registered");
                self.entries.insert(
                    id,
                    Entry {
                        processor,
                        last_seen: def,
                        seen_generation: self.generation,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(definition_id = %id, error = %e, "definition rejected");
            }
        }
    }

    /// Fans one datapoint out to every processor (each decides whether the
    /// point concerns it).
    pub fn process_metrics(&mut self, dp: &MetricDatapoint) {
        for entry in self.entries.values_mut() {
            entry.processor.process_metrics(dp);
        }
    }

    /// Drains the state-change documents of every processor.
    pub fn process_alarms(&mut self, now_ms: i64) -> Vec<AlarmDocument> {
        self.entries
            .values_mut()
            .flat_map(|e| e.processor.process_alarms(now_ms))
            .collect()
    }
}
