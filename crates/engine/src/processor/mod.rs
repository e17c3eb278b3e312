mod group;
mod window;

pub use group::EvaluationGroup;
pub use window::{Bucket, PeriodRing};

use std::collections::HashMap;

use vigil_common::datapoint::MetricDatapoint;
use vigil_common::definition::AlarmDefinition;

use crate::alarm::{AlarmDocument, AlarmState, MetricId, SubAlarm};
use crate::expr::{parse, ExprNode, ParseError, SubExpr};

/// One leaf of the parsed tree together with its canonical identity string.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub canonical: String,
    pub expr: SubExpr,
}

impl Leaf {
    fn from_tree(tree: &ExprNode) -> Vec<Leaf> {
        let mut leaves: Vec<Leaf> = Vec::new();
        for expr in tree.leaves() {
            let canonical = expr.canonical();
            // identical tests inside one expression share a ring
            if leaves.iter().any(|l| l.canonical == canonical) {
                continue;
            }
            leaves.push(Leaf {
                canonical,
                expr: expr.clone(),
            });
        }
        leaves
    }

    pub(crate) fn ring(&self) -> PeriodRing {
        PeriodRing::new(self.expr.window_secs, self.expr.periods)
    }

    fn horizon_ms(&self) -> i64 {
        self.expr.window_secs * 1000 * self.expr.periods as i64
    }
}

/// The stateful evaluator for one alarm definition: routes datapoints into
/// match-by groups, recomputes tri-state results on demand, and emits a
/// document for every group whose top-level state changed.
pub struct ThresholdingProcessor {
    definition: AlarmDefinition,
    tree: ExprNode,
    leaves: Vec<Leaf>,
    groups: HashMap<Vec<String>, EvaluationGroup>,
}

impl ThresholdingProcessor {
    /// Fails closed: a definition whose expression does not parse never
    /// yields a processor.
    pub fn new(definition: AlarmDefinition) -> Result<Self, ParseError> {
        let tree = parse(&definition.expression)?;
        let leaves = Leaf::from_tree(&tree);
        Ok(Self {
            definition,
            tree,
            leaves,
            groups: HashMap::new(),
        })
    }

    pub fn definition(&self) -> &AlarmDefinition {
        &self.definition
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Routes a datapoint to every leaf it satisfies. The evaluation group
    /// for its match-by tuple is created on first sight; a missing match-by
    /// dimension maps to an empty value rather than dropping the point.
    pub fn process_metrics(&mut self, dp: &MetricDatapoint) {
        let matched: Vec<usize> = self
            .leaves
            .iter()
            .enumerate()
            .filter(|(_, l)| l.expr.matches(dp))
            .map(|(i, _)| i)
            .collect();
        if matched.is_empty() {
            return;
        }

        let key: Vec<String> = self
            .definition
            .match_by
            .iter()
            .map(|k| dp.dimensions.get(k).cloned().unwrap_or_default())
            .collect();

        let group = self
            .groups
            .entry(key)
            .or_insert_with(|| EvaluationGroup::new(&self.leaves));
        for i in matched {
            group.observe(&self.leaves[i].canonical, dp.timestamp_ms, dp.value);
        }
        group.record_metric(MetricId::from(dp), dp.timestamp_ms);
    }

    /// Recomputes every group and returns one document per state change.
    /// Recorded states start at UNDETERMINED, so a group emits on its first
    /// determined evaluation and stays silent while data is insufficient.
    pub fn process_alarms(&mut self, now_ms: i64) -> Vec<AlarmDocument> {
        let horizon_ms = self.leaves.iter().map(Leaf::horizon_ms).max().unwrap_or(0);
        let mut documents = Vec::new();

        for (key, group) in &mut self.groups {
            let mut leaf_states: HashMap<&str, AlarmState> = HashMap::new();
            let mut sub_alarms = Vec::new();
            for leaf in &self.leaves {
                let (state, current_values) = group.evaluate_leaf(leaf);
                leaf_states.insert(leaf.canonical.as_str(), state);
                sub_alarms.push(SubAlarm::new(&leaf.expr, state, current_values));
            }

            let new_state = evaluate_tree(&self.tree, &leaf_states);
            let previous = group.state();
            if new_state == previous {
                continue;
            }
            let previous_timestamp = group.state_updated_ms();
            group.set_state(new_state, now_ms);
            documents.push(AlarmDocument::new(
                &self.definition,
                key.clone(),
                new_state,
                previous,
                now_ms,
                previous_timestamp,
                group.contributing_metrics(horizon_ms),
                sub_alarms,
            ));
        }

        documents
    }

    /// Applies an updated definition. Returns `false` (leaving everything
    /// untouched) when the new expression fails to parse. On success,
    /// surviving leaves keep their accumulated buckets; a changed match-by
    /// discards every group since their identity is no longer meaningful.
    pub fn update_definition(&mut self, new_definition: AlarmDefinition) -> bool {
        let tree = match parse(&new_definition.expression) {
            Ok(tree) => tree,
            Err(_) => return false,
        };
        let leaves = Leaf::from_tree(&tree);

        if new_definition.match_by != self.definition.match_by {
            self.groups.clear();
        } else {
            for group in self.groups.values_mut() {
                group.retarget(&leaves);
            }
        }

        self.definition = new_definition;
        self.tree = tree;
        self.leaves = leaves;
        true
    }
}

fn evaluate_tree(node: &ExprNode, leaf_states: &HashMap<&str, AlarmState>) -> AlarmState {
    match node {
        ExprNode::Leaf(leaf) => leaf_states
            .get(leaf.canonical().as_str())
            .copied()
            .unwrap_or(AlarmState::Undetermined),
        ExprNode::Combinator { op, children } => {
            let mut states = children.iter().map(|c| evaluate_tree(c, leaf_states));
            let first = states.next().unwrap_or(AlarmState::Undetermined);
            match op {
                crate::expr::LogicOp::And => states.fold(first, AlarmState::and),
                crate::expr::LogicOp::Or => states.fold(first, AlarmState::or),
            }
        }
    }
}
