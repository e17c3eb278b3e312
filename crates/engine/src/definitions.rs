use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use vigil_common::definition::AlarmDefinition;
use vigil_common::retry::{retry_async, RetryConfig};

use crate::metrics::EngineMetrics;
use crate::registry::ProcessorRegistry;

#[derive(Debug)]
pub struct FetchError(pub String);

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "definition fetch: {}", self.0)
    }
}

impl std::error::Error for FetchError {}

/// Pulls the full definition listing from the definition API:
/// a JSON body of the shape `{"elements": [definition, ...]}`.
pub struct DefinitionFetcher {
    client: Client,
    url: String,
}

impl DefinitionFetcher {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    pub async fn fetch(&self) -> Result<Vec<AlarmDefinition>, FetchError> {
        let body: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError(e.to_string()))?
            .error_for_status()
            .map_err(|e| FetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| FetchError(e.to_string()))?;
        parse_listing(&body)
    }
}

/// Invalid elements are logged and skipped; the rest of the listing still
/// reconciles.
pub fn parse_listing(body: &serde_json::Value) -> Result<Vec<AlarmDefinition>, FetchError> {
    let elements = body
        .get("elements")
        .and_then(|e| e.as_array())
        .ok_or_else(|| FetchError("missing elements array".into()))?;

    let mut definitions = Vec::with_capacity(elements.len());
    for element in elements {
        match AlarmDefinition::from_value(element) {
            Ok(def) => definitions.push(def),
            Err(e) => tracing::warn!(error = %e, "skipping invalid definition element"),
        }
    }
    Ok(definitions)
}

/// Snapshot-diff reconciliation: fetches the listing on a fixed interval and
/// hands it to the registry's mark-and-sweep. A failed fetch (after retries)
/// skips the round and leaves the population untouched.
pub struct DefinitionPoller {
    fetcher: DefinitionFetcher,
    registry: Arc<Mutex<ProcessorRegistry>>,
    metrics: Arc<EngineMetrics>,
    interval: Duration,
}

impl DefinitionPoller {
    pub fn new(
        fetcher: DefinitionFetcher,
        registry: Arc<Mutex<ProcessorRegistry>>,
        metrics: Arc<EngineMetrics>,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            registry,
            metrics,
            interval,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let retry = RetryConfig::default();
            match retry_async(&retry, || self.fetcher.fetch()).await {
                Ok(listing) => {
                    let mut registry = self.registry.lock().await;
                    registry.reconcile(listing);
                    self.metrics.inc_reconcile_rounds();
                    self.metrics.set_active_processors(registry.len() as u64);
                }
                Err(e) => {
                    tracing::error!(error = %e, "definition listing unavailable, skipping round");
                    self.metrics.inc_reconcile_failures();
                }
            }
        }
    }
}
