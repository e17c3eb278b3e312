use axum::extract::State;
use std::sync::Arc;

use crate::metrics::exposition::render_prometheus;
use crate::metrics::EngineMetrics;

pub async fn metrics(State(m): State<Arc<EngineMetrics>>) -> String {
    render_prometheus(&m)
}
