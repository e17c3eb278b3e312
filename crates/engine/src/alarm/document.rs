use serde::Serialize;
use std::collections::BTreeMap;

use vigil_common::datapoint::MetricDatapoint;
use vigil_common::definition::AlarmDefinition;

use super::state::AlarmState;
use crate::expr::{AggregateFn, SubExpr};

/// Identity of a datapoint stream that contributed to an evaluation group:
/// the metric name plus its full dimension set, in stable key order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MetricId {
    pub name: String,
    pub dimensions: BTreeMap<String, String>,
}

impl From<&MetricDatapoint> for MetricId {
    fn from(dp: &MetricDatapoint) -> Self {
        Self {
            name: dp.name.clone(),
            dimensions: dp
                .dimensions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// The evaluation outcome of one leaf inside an emitted document.
/// `current_values` holds the retained bucket aggregates oldest-first.
#[derive(Debug, Clone, Serialize)]
pub struct SubAlarm {
    pub expression: String,
    pub function: AggregateFn,
    pub metric_name: String,
    pub dimensions: BTreeMap<String, String>,
    pub operator: &'static str,
    pub threshold: f64,
    pub periods: usize,
    pub state: AlarmState,
    pub current_values: Vec<f64>,
}

impl SubAlarm {
    pub fn new(leaf: &SubExpr, state: AlarmState, current_values: Vec<f64>) -> Self {
        Self {
            expression: leaf.canonical(),
            function: leaf.function,
            metric_name: leaf.metric_name.clone(),
            dimensions: leaf.dimensions.clone(),
            operator: leaf.operator.normalized(),
            threshold: leaf.threshold,
            periods: leaf.periods,
            state,
            current_values,
        }
    }
}

/// One alarm state-change event, serialized as-is onto the alarms subject.
#[derive(Debug, Clone, Serialize)]
pub struct AlarmDocument {
    pub id: String,
    #[serde(rename = "alarm-definition")]
    pub alarm_definition: AlarmDefinition,
    pub state: AlarmState,
    pub previous_state: AlarmState,
    pub state_updated_timestamp: i64,
    pub previous_state_timestamp: i64,
    pub match_values: Vec<String>,
    pub metrics: Vec<MetricId>,
    pub sub_alarms: Vec<SubAlarm>,
    pub actions: Vec<String>,
}

impl AlarmDocument {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        definition: &AlarmDefinition,
        match_values: Vec<String>,
        state: AlarmState,
        previous_state: AlarmState,
        state_updated_timestamp: i64,
        previous_state_timestamp: i64,
        metrics: Vec<MetricId>,
        sub_alarms: Vec<SubAlarm>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            alarm_definition: definition.clone(),
            state,
            previous_state,
            state_updated_timestamp,
            previous_state_timestamp,
            match_values,
            metrics,
            sub_alarms,
            actions: definition.actions_for(state.as_str()).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn definition() -> AlarmDefinition {
        AlarmDefinition::from_json(
            r#"{"id":"d-1","name":"n","expression":"max(biz)>1400",
                "alarm_actions":["act-a"],"ok_actions":["act-o"]}"#,
        )
        .unwrap()
    }

    #[test]
    fn metric_id_sorts_dimensions() {
        let dp = MetricDatapoint {
            name: "biz".into(),
            dimensions: HashMap::from([
                ("z".to_string(), "1".to_string()),
                ("a".to_string(), "2".to_string()),
            ]),
            timestamp_ms: 0,
            value: Some(1.0),
        };
        let id = MetricId::from(&dp);
        let keys: Vec<&String> = id.dimensions.keys().collect();
        assert_eq!(keys, ["a", "z"]);
    }

    #[test]
    fn document_selects_actions_for_new_state() {
        let def = definition();
        let doc = AlarmDocument::new(
            &def,
            vec![],
            AlarmState::Alarm,
            AlarmState::Undetermined,
            1_700_000_000_000,
            0,
            vec![],
            vec![],
        );
        assert_eq!(doc.actions, ["act-a"]);

        let doc = AlarmDocument::new(
            &def,
            vec![],
            AlarmState::Ok,
            AlarmState::Alarm,
            1_700_000_000_000,
            0,
            vec![],
            vec![],
        );
        assert_eq!(doc.actions, ["act-o"]);
    }

    #[test]
    fn document_wire_shape() {
        let def = definition();
        let doc = AlarmDocument::new(
            &def,
            vec!["h1".into()],
            AlarmState::Alarm,
            AlarmState::Undetermined,
            1_700_000_000_000,
            0,
            vec![],
            vec![],
        );
        let value: serde_json::Value = serde_json::from_str(&serde_json::to_string(&doc).unwrap()).unwrap();
        assert_eq!(value["state"], "ALARM");
        assert_eq!(value["alarm-definition"]["id"], "d-1");
        assert_eq!(value["state_updated_timestamp"], 1_700_000_000_000i64);
        assert_eq!(value["match_values"][0], "h1");
    }
}
