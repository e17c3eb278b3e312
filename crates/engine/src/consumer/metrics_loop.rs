use async_nats::jetstream::consumer::PullConsumer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::metrics::EngineMetrics;
use crate::registry::ProcessorRegistry;

use super::handler::{ack, decode_metric, pull_batch};

/// Metric ingestion: pulls one batch, decodes it (dropping malformed
/// datapoints), and feeds the whole batch to the registry under a single
/// lock acquisition. A failed pull abandons the round and retries; nothing
/// here terminates the loop.
pub struct MetricsLoop {
    consumer: PullConsumer,
    registry: Arc<Mutex<ProcessorRegistry>>,
    metrics: Arc<EngineMetrics>,
    batch_size: usize,
}

impl MetricsLoop {
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
                    tracing::error!(error = %e, "metric pull failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            if messages.is_empty() {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }

            let mut decoded = Vec::with_capacity(messages.len());
            for msg in &messages {
                match decode_metric(msg) {
                    Ok(dp) => decoded.push(dp),
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping malformed datapoint");
                        self.metrics.inc_datapoints_dropped();
                    }
                }
            }

            {
                let mut registry = self.registry.lock().await;
                for dp in &decoded {
                    registry.process_metrics(dp);
                }
            }
            self.metrics.add_datapoints_ingested(decoded.len() as u64);
            self.metrics.inc_batches_processed();

            for msg in &messages {
                ack(msg).await;
            }
        }
    }
}
