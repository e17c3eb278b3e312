use async_nats::jetstream::consumer::PullConsumer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::metrics::EngineMetrics;
use crate::registry::ProcessorRegistry;

use super::handler::{ack, decode_definition_change, pull_batch};

/// Event-driven reconciliation: consumes discrete definition change records
/// and applies them to the registry. Undecodable records are acked and
/// discarded after logging; the definition set must never be corrupted by a
/// bad message.
pub struct DefinitionsLoop {
    consumer: PullConsumer,
    registry: Arc<Mutex<ProcessorRegistry>>,
    metrics: Arc<EngineMetrics>,
    batch_size: usize,
}

impl DefinitionsLoop {
    pub fn new(
        consumer: PullConsumer,
        registry: Arc<Mutex<ProcessorRegistry>>,
        metrics: Arc<EngineMetrics>,
        batch_size: usize,
    ) -> Self {
        Self {
            consumer,
            registry,
            metrics,
            batch_size,
        }
    }

    pub async fn run(self) {
        loop {
            let messages = match pull_batch(&self.consumer, self.batch_size).await {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::error!(error = %e, "definition pull failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if messages.is_empty() {
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }

            let mut changes = Vec::with_capacity(messages.len());
            for msg in &messages {
                match decode_definition_change(msg) {
                    Ok(change) => changes.push(change),
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping malformed definition change");
                        self.metrics.inc_definitions_rejected();
                    }
                }
            }

            {
                let mut registry = self.registry.lock().await;
                for change in changes {
                    registry.apply_change(change);
                    self.metrics.inc_definitions_applied();
                }
                self.metrics.set_active_processors(registry.len() as u64);
            }

            for msg in &messages {
                ack(msg).await;
            }
        }
    }
}
