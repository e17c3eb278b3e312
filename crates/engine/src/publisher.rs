use async_nats::jetstream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use vigil_common::nats_config::ALARMS_SUBJECT;

use crate::alarm::AlarmDocument;
use crate::metrics::EngineMetrics;
use crate::registry::ProcessorRegistry;

#[derive(Debug)]
pub struct PublishError(pub String);

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "publish: {}", self.0)
    }
}

impl std::error::Error for PublishError {}

pub struct AlarmPublisher {
    js: jetstream::Context,
}

impl AlarmPublisher {
    pub fn new(js: jetstream::Context) -> Self {
        Self { js }
    }

    pub async fn publish(&self, document: &AlarmDocument) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(document).map_err(|e| PublishError(e.to_string()))?;

        let mut headers = async_nats::HeaderMap::new();
        headers.insert("X-Definition-Id", document.alarm_definition.id.as_str());
        headers.insert("X-Alarm-State", document.state.as_str());

        self.js
            .publish_with_headers(ALARMS_SUBJECT, headers, payload.into())
            .await
            .map_err(|e| PublishError(e.to_string()))?
            .await
            .map_err(|e| PublishError(e.to_string()))?;

        Ok(())
    }
}

/// Alarm publication: on a fixed interval, drains the state-change documents
/// of every processor under the registry lock, then sends them with the lock
/// released. Delivery failures are logged and not retried here.
pub struct PublisherLoop {
    publisher: AlarmPublisher,
    registry: Arc<Mutex<ProcessorRegistry>>,
    metrics: Arc<EngineMetrics>,
    interval: Duration,
}

impl PublisherLoop {
    pub fn new(
        publisher: AlarmPublisher,
        registry: Arc<Mutex<ProcessorRegistry>>,
        metrics: Arc<EngineMetrics>,
        interval: Duration,
    ) -> Self {
        Self {
            publisher,
            registry,
            metrics,
            interval,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let now_ms = epoch_ms();

            let documents = {
                let mut registry = self.registry.lock().await;
                registry.process_alarms(now_ms)
            };

            let mut published = 0u64;
            for document in &documents {
                match self.publisher.publish(document).await {
                    Ok(()) => published += 1,
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            definition_id = %document.alarm_definition.id,
                            "alarm delivery failed"
                        );
                        self.metrics.inc_publish_failures();
                    }
                }
            }
            if published > 0 {
                tracing::info!(published, "alarm documents published");
                self.metrics.add_alarms_published(published);
            }
        }
    }
}

pub fn epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
