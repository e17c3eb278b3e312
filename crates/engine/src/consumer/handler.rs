use async_nats::jetstream::consumer::PullConsumer;
use async_nats::jetstream::Message;
use futures::StreamExt;

use vigil_common::datapoint::{decode_datapoint, DecodeError, MetricDatapoint};
use vigil_common::definition::{decode_change, DefinitionChange, DefinitionError};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub fn decode_metric(msg: &Message) -> Result<MetricDatapoint, DecodeError> {
    let text = std::str::from_utf8(&msg.payload)
        .map_err(|e| DecodeError::Json(e.to_string()))?;
    decode_datapoint(text)
}

pub fn decode_definition_change(msg: &Message) -> Result<DefinitionChange, DefinitionError> {
    let text = std::str::from_utf8(&msg.payload)
        .map_err(|e| DefinitionError::Json(e.to_string()))?;
    decode_change(text)
}

pub async fn pull_batch(
    consumer: &PullConsumer,
    max_messages: usize,
) -> Result<Vec<Message>, BoxError> {
    let mut messages = consumer.fetch().max_messages(max_messages).messages().await?;
    let mut batch = Vec::with_capacity(max_messages);
    while let Some(Ok(msg)) = messages.next().await {
        batch.push(msg);
    }
    Ok(batch)
}

pub async fn ack(msg: &Message) {
    if let Err(e) = msg.ack().await {
        tracing::error!(error = %e, "ack failed");
    }
}
