use super::engine_metrics::EngineMetrics;
use std::sync::Arc;

pub fn render_prometheus(m: &Arc<EngineMetrics>) -> String {
    let mut out = String::with_capacity(1024);

    write_counter(&mut out, "vigil_engine_batches_processed_total", m.batches_processed_val());
    write_counter(&mut out, "vigil_engine_datapoints_ingested_total", m.datapoints_ingested_val());
    write_counter(&mut out, "vigil_engine_datapoints_dropped_total", m.datapoints_dropped_val());
    write_counter(&mut out, "vigil_engine_definitions_applied_total", m.definitions_applied_val());
    write_counter(&mut out, "vigil_engine_definitions_rejected_total", m.definitions_rejected_val());
    write_counter(&mut out, "vigil_engine_reconcile_rounds_total", m.reconcile_rounds_val());
    write_counter(&mut out, "vigil_engine_reconcile_failures_total", m.reconcile_failures_val());
    write_counter(&mut out, "vigil_engine_alarms_published_total", m.alarms_published_val());
    write_counter(&mut out, "vigil_engine_publish_failures_total", m.publish_failures_val());
    write_gauge(&mut out, "vigil_engine_active_processors", m.active_processors_val());

    out
}

fn write_counter(out: &mut String, name: &str, val: u64) {
    use std::fmt::Write;
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {val}");
}

fn write_gauge(out: &mut String, name: &str, val: u64) {
    use std::fmt::Write;
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {val}");
}
