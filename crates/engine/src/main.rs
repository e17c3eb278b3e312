use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use vigil_common::nats_config::StreamConfig;
use vigil_engine::api;
use vigil_engine::config::{DefinitionMode, EngineConfig};
use vigil_engine::consumer::{
    connect_jetstream, create_definitions_consumer, create_metrics_consumer, ensure_stream,
    DefinitionsLoop, MetricsLoop,
};
use vigil_engine::definitions::{DefinitionFetcher, DefinitionPoller};
use vigil_engine::metrics::EngineMetrics;
use vigil_engine::publisher::{AlarmPublisher, PublisherLoop};
use vigil_engine::registry::ProcessorRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = EngineConfig::from_env();
    let engine_metrics = EngineMetrics::new();
    let registry = Arc::new(Mutex::new(ProcessorRegistry::new()));

    let api_metrics = engine_metrics.clone();
    let api_addr = config.api_addr.clone();
    let api_handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&api_addr).await.unwrap();
        tracing::info!(%api_addr, "engine API server starting");
        api::serve(listener, api_metrics).await.unwrap();
    });

    tracing::info!(url = %config.nats_url, "connecting to NATS JetStream");
    let js = connect_jetstream(&config.nats_url).await?;

    ensure_stream(&js, &StreamConfig::metrics()).await?;
    ensure_stream(&js, &StreamConfig::definitions()).await?;
    ensure_stream(&js, &StreamConfig::alarms()).await?;
    tracing::info!("streams ready");

    let metrics_consumer = create_metrics_consumer(&js).await?;
    let metrics_loop = MetricsLoop::new(
        metrics_consumer,
        registry.clone(),
        engine_metrics.clone(),
        config.batch_size,
    );
    let ingest_handle = tokio::spawn(metrics_loop.run());
    tracing::info!("metric ingestion running");

    let reconcile_handle = match config.definition_mode {
        DefinitionMode::Stream => {
            let definitions_consumer = create_definitions_consumer(&js).await?;
            let definitions_loop = DefinitionsLoop::new(
                definitions_consumer,
                registry.clone(),
                engine_metrics.clone(),
                config.batch_size,
            );
            tracing::info!("definition change stream running");
            tokio::spawn(definitions_loop.run())
        }
        DefinitionMode::Poll => {
            let fetcher = DefinitionFetcher::new(config.definition_api_url.clone());
            let poller = DefinitionPoller::new(
                fetcher,
                registry.clone(),
                engine_metrics.clone(),
                Duration::from_secs(config.check_definition_interval_secs),
            );
            tracing::info!(url = %config.definition_api_url, "definition polling running");
            tokio::spawn(poller.run())
        }
    };

    let publisher_loop = PublisherLoop::new(
        AlarmPublisher::new(js),
        registry,
        engine_metrics,
        Duration::from_secs(config.check_alarm_interval_secs),
    );
    let publish_handle = tokio::spawn(publisher_loop.run());
    tracing::info!("alarm publication running");

    tokio::select! {
        r = api_handle => { if let Err(e) = r { tracing::error!("API: {e}"); } }
        r = ingest_handle => { if let Err(e) = r { tracing::error!("ingestion: {e}"); } }
        r = reconcile_handle => { if let Err(e) = r { tracing::error!("reconciliation: {e}"); } }
        r = publish_handle => { if let Err(e) = r { tracing::error!("publication: {e}"); } }
    }

    Ok(())
}
