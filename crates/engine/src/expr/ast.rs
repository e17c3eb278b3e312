use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use vigil_common::datapoint::MetricDatapoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    Max,
    Min,
    Avg,
    Sum,
    Count,
}

impl FromStr for AggregateFn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            "avg" => Ok(Self::Avg),
            "sum" => Ok(Self::Sum),
            "count" => Ok(Self::Count),
            _ => Err(format!("unknown aggregation function: {s}")),
        }
    }
}

impl std::fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
            Self::Avg => write!(f, "avg"),
            Self::Sum => write!(f, "sum"),
            Self::Count => write!(f, "count"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "gte" => Ok(Self::Gte),
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "lte" => Ok(Self::Lte),
            _ => Err(format!("unknown comparison operator: {s}")),
        }
    }
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    pub fn normalized(&self) -> &'static str {
        match self {
            Self::Gt => "GT",
            Self::Gte => "GTE",
            Self::Lt => "LT",
            Self::Lte => "LTE",
        }
    }

    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// One aggregation test: a function over a metric/dimension filter compared
/// to a threshold across `periods` windows of `window_secs` each.
#[derive(Debug, Clone, PartialEq)]
pub struct SubExpr {
    pub function: AggregateFn,
    pub metric_name: String,
    pub dimensions: BTreeMap<String, String>,
    pub window_secs: i64,
    pub operator: CompareOp,
    pub threshold: f64,
    pub periods: usize,
}

pub const DEFAULT_WINDOW_SECS: i64 = 60;
pub const DEFAULT_PERIODS: usize = 1;

impl SubExpr {
    /// Whitespace-free canonical rendering, the leaf's identity within one
    /// definition. Dimensions render in key order; the window argument and
    /// the `times` clause are omitted at their default values so formatting
    /// variants of the same test collapse to one string.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.function.to_string());
        out.push('(');
        out.push_str(&self.metric_name);
        if !self.dimensions.is_empty() {
            out.push('{');
            let dims: Vec<String> = self
                .dimensions
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            out.push_str(&dims.join(","));
            out.push('}');
        }
        if self.window_secs != DEFAULT_WINDOW_SECS {
            out.push_str(&format!(",{}", self.window_secs));
        }
        out.push(')');
        out.push_str(self.operator.symbol());
        out.push_str(&self.threshold.to_string());
        if self.periods != DEFAULT_PERIODS {
            out.push_str(&format!("times{}", self.periods));
        }
        out
    }

    /// A datapoint is routed to this leaf when the names match and every
    /// filter pair is present and equal; extra dimensions are ignored.
    pub fn matches(&self, dp: &MetricDatapoint) -> bool {
        if dp.name != self.metric_name {
            return false;
        }
        self.dimensions
            .iter()
            .all(|(k, v)| dp.dimensions.get(k) == Some(v))
    }
}

impl std::fmt::Display for SubExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}", self.function, self.metric_name)?;
        if !self.dimensions.is_empty() {
            let dims: Vec<String> = self
                .dimensions
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, "{{{}}}", dims.join(","))?;
        }
        if self.window_secs != DEFAULT_WINDOW_SECS {
            write!(f, ", {}", self.window_secs)?;
        }
        write!(f, ") {} {}", self.operator, self.threshold)?;
        if self.periods != DEFAULT_PERIODS {
            write!(f, " times {}", self.periods)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Leaf(SubExpr),
    Combinator { op: LogicOp, children: Vec<ExprNode> },
}

impl ExprNode {
    pub fn leaves(&self) -> Vec<&SubExpr> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a SubExpr>) {
        match self {
            Self::Leaf(leaf) => out.push(leaf),
            Self::Combinator { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

impl std::fmt::Display for ExprNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf(leaf) => write!(f, "{leaf}"),
            Self::Combinator { op, children } => {
                let sep = match op {
                    LogicOp::And => " and ",
                    LogicOp::Or => " or ",
                };
                let rendered: Vec<String> = children
                    .iter()
                    .map(|child| match (op, child) {
                        // OR children under an AND need parentheses to survive
                        // a re-parse, since AND binds tighter.
                        (LogicOp::And, ExprNode::Combinator { op: LogicOp::Or, .. }) => {
                            format!("({child})")
                        }
                        _ => child.to_string(),
                    })
                    .collect();
                write!(f, "{}", rendered.join(sep))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn leaf() -> SubExpr {
        SubExpr {
            function: AggregateFn::Max,
            metric_name: "biz".into(),
            dimensions: BTreeMap::from([("key2".into(), "value2".into())]),
            window_secs: 60,
            operator: CompareOp::Gt,
            threshold: 1400.0,
            periods: 1,
        }
    }

    fn datapoint(name: &str, dims: &[(&str, &str)]) -> MetricDatapoint {
        MetricDatapoint {
            name: name.into(),
            dimensions: dims
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            timestamp_ms: 0,
            value: Some(1.0),
        }
    }

    #[test]
    fn canonical_omits_defaults() {
        assert_eq!(leaf().canonical(), "max(biz{key2=value2})>1400");
    }

    #[test]
    fn canonical_includes_non_defaults() {
        let mut l = leaf();
        l.window_secs = 120;
        l.periods = 3;
        l.operator = CompareOp::Gte;
        assert_eq!(l.canonical(), "max(biz{key2=value2},120)>=1400times3");
    }

    #[test]
    fn matches_requires_every_filter_pair() {
        let l = leaf();
        assert!(l.matches(&datapoint("biz", &[("key2", "value2")])));
        assert!(l.matches(&datapoint(
            "biz",
            &[("key2", "value2"), ("extra", "x")]
        )));
        assert!(!l.matches(&datapoint("biz", &[("key2", "other")])));
        assert!(!l.matches(&datapoint("biz", &[("key3", "value2")])));
        assert!(!l.matches(&datapoint("baz", &[("key2", "value2")])));
    }

    #[test]
    fn compare_op_checks() {
        assert!(CompareOp::Gt.check(2.0, 1.0));
        assert!(!CompareOp::Gt.check(1.0, 1.0));
        assert!(CompareOp::Gte.check(1.0, 1.0));
        assert!(CompareOp::Lt.check(0.5, 1.0));
        assert!(CompareOp::Lte.check(1.0, 1.0));
    }

    #[test]
    fn leaves_collects_in_order() {
        let tree = ExprNode::Combinator {
            op: LogicOp::And,
            children: vec![
                ExprNode::Leaf(leaf()),
                ExprNode::Combinator {
                    op: LogicOp::Or,
                    children: vec![ExprNode::Leaf(leaf()), ExprNode::Leaf(leaf())],
                },
            ],
        };
        assert_eq!(tree.leaves().len(), 3);
    }
}
