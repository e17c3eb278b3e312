use async_nats::jetstream;
use async_nats::jetstream::consumer::PullConsumer;
use async_nats::jetstream::stream::Stream;

use vigil_common::nats_config::{
    StreamConfig, DEFINITIONS_CONSUMER, DEFINITIONS_STREAM, METRICS_CONSUMER, METRICS_STREAM,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub async fn connect_jetstream(url: &str) -> Result<jetstream::Context, BoxError> {
    let client = async_nats::connect(url).await?;
    Ok(jetstream::new(client))
}

pub async fn ensure_stream(
    js: &jetstream::Context,
    config: &StreamConfig,
) -> Result<Stream, BoxError> {
    let stream_config = jetstream::stream::Config {
        name: config.name.clone(),
        subjects: config.subjects.clone(),
        max_bytes: config.max_bytes,
        max_age: std::time::Duration::from_secs(config.max_age_secs),
        ..Default::default()
    };
    Ok(js.get_or_create_stream(stream_config).await?)
}

pub async fn create_metrics_consumer(js: &jetstream::Context) -> Result<PullConsumer, BoxError> {
    create_consumer(js, METRICS_STREAM, METRICS_CONSUMER).await
}

pub async fn create_definitions_consumer(
    js: &jetstream::Context,
) -> Result<PullConsumer, BoxError> {
    create_consumer(js, DEFINITIONS_STREAM, DEFINITIONS_CONSUMER).await
}

async fn create_consumer(
    js: &jetstream::Context,
    stream_name: &str,
    consumer_name: &str,
) -> Result<PullConsumer, BoxError> {
    let stream = js.get_stream(stream_name).await?;

    let consumer_config = jetstream::consumer::pull::Config {
        durable_name: Some(consumer_name.into()),
        ack_policy: jetstream::consumer::AckPolicy::Explicit,
        max_deliver: 5,
        ..Default::default()
    };

    Ok(stream
        .get_or_create_consumer(consumer_name, consumer_config)
        .await?)
}
