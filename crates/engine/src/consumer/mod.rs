mod connection;
mod definitions_loop;
mod handler;
mod metrics_loop;

pub use connection::{
    connect_jetstream, create_definitions_consumer, create_metrics_consumer, ensure_stream,
};
pub use definitions_loop::DefinitionsLoop;
pub use metrics_loop::MetricsLoop;
