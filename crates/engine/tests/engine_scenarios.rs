use std::collections::HashMap;

use vigil_common::datapoint::MetricDatapoint;
use vigil_common::definition::{decode_change, AlarmDefinition, DefinitionChange};

use vigil_engine::alarm::AlarmState;
use vigil_engine::registry::ProcessorRegistry;

const T0: i64 = 1_700_000_000_000;
const WINDOW_MS: i64 = 60_000;

fn definition(id: &str, expression: &str, match_by: &[&str]) -> AlarmDefinition {
    AlarmDefinition::from_json(
        &serde_json::json!({
            "id": id,
            "name": format!("watch {id}"),
            "description": "scenario definition",
            "expression": expression,
            "match_by": match_by,
            "severity": "HIGH",
            "alarm_actions": ["notify-pager"],
            "ok_actions": ["notify-email"],
            "undetermined_actions": ["notify-email"],
        })
        .to_string(),
    )
    .unwrap()
}

fn datapoint(name: &str, dims: &[(&str, &str)], ts: i64, value: f64) -> MetricDatapoint {
    MetricDatapoint {
        name: name.into(),
        dimensions: dims
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        timestamp_ms: ts,
        value: Some(value),
    }
}

// Align scenario timestamps to a window edge so every point lands in a
// predictable period regardless of T0's position inside its window.
fn window_start(ts: i64) -> i64 {
    ts.div_euclid(WINDOW_MS) * WINDOW_MS
}

#[test]
fn match_by_fan_out_through_registry() {
    let mut registry = ProcessorRegistry::new();
    registry.apply_change(DefinitionChange::Create(definition(
        "d-biz",
        "max(biz{key2=value2})>1400",
        &["hostname"],
    )));

    let points = [
        ("h1", 1300.0),
        ("h2", 1500.0),
        ("h3", 1200.0),
    ];
    for (host, value) in points {
        registry.process_metrics(&datapoint(
            "biz",
            &[("hostname", host), ("key2", "value2")],
            T0,
            value,
        ));
    }
    // h1 gets a second, higher point carrying extra dimensions
    registry.process_metrics(&datapoint(
        "biz",
        &[
            ("hostname", "h1"),
            ("key1", "value1"),
            ("key2", "value2"),
            ("key3", "value3"),
        ],
        T0,
        1500.0,
    ));

    let mut docs = registry.process_alarms(T0 + 1000);
    assert_eq!(docs.len(), 3);
    docs.sort_by(|a, b| a.match_values.cmp(&b.match_values));

    assert_eq!(docs[0].match_values, ["h1"]);
    assert_eq!(docs[0].state, AlarmState::Alarm);
    assert_eq!(docs[1].match_values, ["h2"]);
    assert_eq!(docs[1].state, AlarmState::Alarm);
    assert_eq!(docs[2].match_values, ["h3"]);
    assert_eq!(docs[2].state, AlarmState::Ok);

    // states settled: the next pass is silent
    assert!(registry.process_alarms(T0 + 2000).is_empty());
}

#[test]
fn alarm_document_wire_shape() {
    let mut registry = ProcessorRegistry::new();
    registry.apply_change(DefinitionChange::Create(definition(
        "d-wire",
        "max(biz{key2=value2})>1400",
        &["hostname"],
    )));
    registry.process_metrics(&datapoint(
        "biz",
        &[("hostname", "h1"), ("key2", "value2")],
        T0,
        1500.0,
    ));

    let docs = registry.process_alarms(T0 + 1000);
    assert_eq!(docs.len(), 1);

    let value: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&docs[0]).unwrap()).unwrap();
    assert_eq!(value["state"], "ALARM");
    assert_eq!(value["alarm-definition"]["id"], "d-wire");
    assert_eq!(value["alarm-definition"]["severity"], "HIGH");
    assert_eq!(value["state_updated_timestamp"], T0 + 1000);
    assert_eq!(value["actions"][0], "notify-pager");
    assert_eq!(value["metrics"][0]["name"], "biz");
    assert_eq!(value["metrics"][0]["dimensions"]["hostname"], "h1");

    let sub = &value["sub_alarms"][0];
    assert_eq!(sub["expression"], "max(biz{key2=value2})>1400");
    assert_eq!(sub["function"], "max");
    assert_eq!(sub["operator"], "GT");
    assert_eq!(sub["threshold"], 1400.0);
    assert_eq!(sub["state"], "ALARM");
    assert_eq!(sub["current_values"][0], 1500.0);
}

#[test]
fn no_document_while_undetermined() {
    let mut registry = ProcessorRegistry::new();
    registry.apply_change(DefinitionChange::Create(definition(
        "d-quiet",
        "max(foo)>100 times 4",
        &[],
    )));

    // nothing ingested: no groups, no documents
    assert!(registry.process_alarms(T0).is_empty());

    // one period of data against a four-period requirement: still silent
    registry.process_metrics(&datapoint("foo", &[], window_start(T0), 50.0));
    assert!(registry.process_alarms(T0 + 1000).is_empty());
}

#[test]
fn multi_period_requirement_over_time() {
    let mut registry = ProcessorRegistry::new();
    registry.apply_change(DefinitionChange::Create(definition(
        "d-periods",
        "max(foo)>=100 times 3",
        &[],
    )));

    let base = window_start(T0);
    // three consecutive periods all breaching
    for i in 0..3 {
        registry.process_metrics(&datapoint("foo", &[], base + i * WINDOW_MS, 150.0));
    }
    let docs = registry.process_alarms(base + 3 * WINDOW_MS);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].state, AlarmState::Alarm);
    assert_eq!(docs[0].sub_alarms[0].current_values, [150.0, 150.0, 150.0]);

    // one healthy period breaks the run
    registry.process_metrics(&datapoint("foo", &[], base + 3 * WINDOW_MS, 20.0));
    let docs = registry.process_alarms(base + 4 * WINDOW_MS);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].state, AlarmState::Ok);
}

#[test]
fn compound_expression_tri_state_through_registry() {
    let mut registry = ProcessorRegistry::new();
    registry.apply_change(DefinitionChange::Create(definition(
        "d-compound",
        "max(foo)>1 and (min(bar)<10 or count(baz)>5)",
        &[],
    )));

    // only foo: AND(ALARM, UNDETERMINED) stays undetermined, no document
    registry.process_metrics(&datapoint("foo", &[], T0, 5.0));
    assert!(registry.process_alarms(T0 + 1000).is_empty());

    // bar arrives low: OR(ALARM, UNDETERMINED) = ALARM, AND resolves
    registry.process_metrics(&datapoint("bar", &[], T0, 3.0));
    let docs = registry.process_alarms(T0 + 2000);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].state, AlarmState::Alarm);

    // foo drops in the next window (the old period slides out): AND
    // short-circuits to OK even though baz never reported
    registry.process_metrics(&datapoint("foo", &[], T0 + WINDOW_MS, 0.5));
    let docs = registry.process_alarms(T0 + WINDOW_MS + 1000);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].state, AlarmState::Ok);
}

#[test]
fn update_flow_through_change_records() {
    let mut registry = ProcessorRegistry::new();

    let mut create: serde_json::Value =
        serde_json::to_value(definition("d-upd", "max(biz{key2=value2})>1400", &["hostname"]))
            .unwrap();
    create["request"] = "POST".into();
    registry.apply_change(decode_change(&create.to_string()).unwrap());

    for (host, value) in [("h1", 1500.0), ("h2", 1500.0), ("h3", 1200.0)] {
        registry.process_metrics(&datapoint(
            "biz",
            &[("hostname", host), ("key2", "value2")],
            T0,
            value,
        ));
    }
    assert_eq!(registry.process_alarms(T0 + 1000).len(), 3);

    // a malformed update is rejected and changes nothing
    let mut bad: serde_json::Value =
        serde_json::to_value(definition("d-upd", "max(biz{key2=value2}) = 1400", &["hostname"]))
            .unwrap();
    bad["request"] = "PUT".into();
    registry.apply_change(decode_change(&bad.to_string()).unwrap());
    assert!(registry.process_alarms(T0 + 2000).is_empty());

    // a well-formed update takes effect: the replaced leaf starts empty, so
    // every group transitions to UNDETERMINED
    let mut good: serde_json::Value =
        serde_json::to_value(definition("d-upd", "min(biz{key2=value2})<1450", &["hostname"]))
            .unwrap();
    good["request"] = "PUT".into();
    registry.apply_change(decode_change(&good.to_string()).unwrap());
    let docs = registry.process_alarms(T0 + 3000);
    assert_eq!(docs.len(), 3);
    assert!(docs.iter().all(|d| d.state == AlarmState::Undetermined));

    // fresh data resolves under the new expression
    registry.process_metrics(&datapoint(
        "biz",
        &[("hostname", "h1"), ("key2", "value2")],
        T0 + 4000,
        1300.0,
    ));
    let docs = registry.process_alarms(T0 + 5000);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].match_values, ["h1"]);
    assert_eq!(docs[0].state, AlarmState::Alarm);
}

#[test]
fn mark_and_sweep_expiry_and_skipped_round() {
    let mut registry = ProcessorRegistry::new();
    registry.reconcile(vec![
        definition("a", "max(foo)>10", &[]),
        definition("b", "max(bar)>10", &[]),
        definition("c", "max(baz)>10", &[]),
    ]);
    assert_eq!(registry.len(), 3);

    // a fetch failure skips the round entirely: the population is untouched
    // (nothing to call; the poller never reconciles on error)
    assert_eq!(registry.len(), 3);

    // next successful round is missing "b": it is swept
    registry.reconcile(vec![
        definition("a", "max(foo)>10", &[]),
        definition("c", "max(baz)>10", &[]),
    ]);
    assert_eq!(registry.len(), 2);
    assert!(!registry.contains("b"));

    // metrics matching only the swept definition no longer produce anything
    registry.process_metrics(&datapoint("bar", &[], T0, 50.0));
    assert!(registry.process_alarms(T0 + 1000).is_empty());

    // the survivors still evaluate
    registry.process_metrics(&datapoint("foo", &[], T0, 50.0));
    let docs = registry.process_alarms(T0 + 2000);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].alarm_definition.id, "a");
    assert_eq!(docs[0].state, AlarmState::Alarm);
}

#[test]
fn out_of_order_arrival_within_horizon() {
    let mut registry = ProcessorRegistry::new();
    registry.apply_change(DefinitionChange::Create(definition(
        "d-ooo",
        "sum(requests)>100 times 2",
        &[],
    )));

    let base = window_start(T0);
    // newest period arrives first, the older one catches up late
    registry.process_metrics(&datapoint("requests", &[], base + WINDOW_MS, 80.0));
    registry.process_metrics(&datapoint("requests", &[], base, 70.0));
    registry.process_metrics(&datapoint("requests", &[], base + WINDOW_MS + 1000, 30.0));
    registry.process_metrics(&datapoint("requests", &[], base + 1000, 40.0));

    let docs = registry.process_alarms(base + 2 * WINDOW_MS);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].state, AlarmState::Alarm);
    assert_eq!(docs[0].sub_alarms[0].current_values, [110.0, 110.0]);
}
