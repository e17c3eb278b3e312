pub mod datapoint;
pub mod definition;
pub mod nats_config;
pub mod retry;
