//! XGBoost JSON backend
//!
//! Reads the native JSON dump written by `Booster.save_model("model.json")`
//! and evaluates the tree ensemble directly. Only the fields needed for
//! inference are parsed; everything else in the document is ignored.

use crate::model::Model;
use crate::schema::FeatureRow;
use crate::{InferenceError, LoadError};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::info;

// =============================================================================
// Foreign layout
// =============================================================================

#[derive(Debug, Deserialize)]
struct Document {
    learner: Learner,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: Booster,
    learner_model_param: LearnerModelParam,
    objective: Objective,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    #[serde(deserialize_with = "scalar_f64")]
    base_score: f64,
    #[serde(default, deserialize_with = "count")]
    num_feature: usize,
    #[serde(default, deserialize_with = "count")]
    num_class: usize,
}

#[derive(Debug, Deserialize)]
struct Booster {
    name: String,
    #[serde(default)]
    model: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Ensemble {
    trees: Vec<TreeDump>,
    #[serde(default)]
    tree_info: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct TreeDump {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f64>,
    #[serde(deserialize_with = "flags")]
    default_left: Vec<bool>,
    #[serde(default)]
    categories_nodes: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct Objective {
    name: String,
}

/// Number, numeric string, or a one-element array of either ("[5E-1]")
fn scalar_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let mut current = Value::deserialize(deserializer)?;
    loop {
        match current {
            Value::Number(n) => {
                return n.as_f64().ok_or_else(|| D::Error::custom("invalid number"));
            }
            Value::String(s) => {
                let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
                return trimmed
                    .parse::<f64>()
                    .map_err(|_| D::Error::custom(format!("cannot parse number from '{}'", s)));
            }
            Value::Array(items) => match items.into_iter().next() {
                Some(first) => current = first,
                None => return Err(D::Error::custom("empty array")),
            },
            _ => return Err(D::Error::custom("expected number, string or array")),
        }
    }
}

/// Non-negative integer stored as number or string
fn count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| D::Error::custom("expected a non-negative integer")),
        Value::String(s) => s
            .trim()
            .parse::<usize>()
            .map_err(|_| D::Error::custom(format!("cannot parse count from '{}'", s))),
        _ => Err(D::Error::custom("expected number or string")),
    }
}

/// Boolean flags written either as booleans or as 0/1 integers
fn flags<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|value| match value {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            other => Err(D::Error::custom(format!("invalid flag: {}", other))),
        })
        .collect()
}

// =============================================================================
// Native representation
// =============================================================================

/// How the summed margin turns into the returned score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Sigmoid,
    Identity,
    Hinge,
}

impl Link {
    fn for_objective(name: &str) -> Option<Self> {
        match name {
            "binary:logistic" | "reg:logistic" => Some(Link::Sigmoid),
            "binary:logitraw" | "reg:squarederror" => Some(Link::Identity),
            "binary:hinge" => Some(Link::Hinge),
            _ => None,
        }
    }

    /// Move base_score from output space into margin space
    fn base_margin(self, base_score: f64) -> f64 {
        match self {
            Link::Sigmoid => {
                let p = base_score.clamp(1e-7, 1.0 - 1e-7);
                (p / (1.0 - p)).ln()
            }
            Link::Identity | Link::Hinge => base_score,
        }
    }

    fn apply(self, margin: f64) -> f64 {
        match self {
            Link::Sigmoid => 1.0 / (1.0 + (-margin).exp()),
            Link::Identity => margin,
            Link::Hinge => {
                if margin > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        default_left: bool,
        left: usize,
        right: usize,
    },
    Leaf(f64),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_dump(index: usize, dump: TreeDump, num_features: usize) -> Result<Self, LoadError> {
        let invalid = |msg: String| LoadError::ModelLoadError(format!("tree {}: {}", index, msg));

        let n = dump.left_children.len();
        if n == 0 {
            return Err(invalid("no nodes".to_string()));
        }
        let lengths = [
            dump.right_children.len(),
            dump.split_indices.len(),
            dump.split_conditions.len(),
            dump.default_left.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(invalid("node arrays have different lengths".to_string()));
        }
        if !dump.categories_nodes.is_empty() {
            return Err(invalid("categorical splits are not supported".to_string()));
        }

        let child = |raw: i64, node: usize| -> Result<usize, LoadError> {
            usize::try_from(raw)
                .ok()
                .filter(|&c| c < n && c != node)
                .ok_or_else(|| invalid(format!("node {} has invalid child {}", node, raw)))
        };

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            if dump.left_children[i] == -1 {
                nodes.push(Node::Leaf(dump.split_conditions[i]));
                continue;
            }

            let feature = usize::try_from(dump.split_indices[i])
                .ok()
                .filter(|&f| num_features == 0 || f < num_features)
                .ok_or_else(|| {
                    invalid(format!("node {} splits on feature {}", i, dump.split_indices[i]))
                })?;

            nodes.push(Node::Split {
                feature,
                // XGBoost stores split thresholds as f32.
                threshold: dump.split_conditions[i] as f32,
                default_left: dump.default_left[i],
                left: child(dump.left_children[i], i)?,
                right: child(dump.right_children[i], i)?,
            });
        }

        // Walk from the root; a node reached twice means the arrays do not form a tree.
        // Unreachable (pruned) nodes are allowed.
        let mut visited = vec![false; n];
        let mut stack = vec![0usize];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id], true) {
                return Err(invalid(format!("node {} is reachable more than once", id)));
            }
            if let Node::Split { left, right, .. } = nodes[id] {
                stack.push(left);
                stack.push(right);
            }
        }

        Ok(Self { nodes })
    }

    fn leaf_value(&self, values: &[f64]) -> Result<f64, InferenceError> {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf(value) => return Ok(value),
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let value = values.get(feature).copied().ok_or_else(|| {
                        InferenceError::InferenceFailed(format!(
                            "split on feature {} but row has {} values",
                            feature,
                            values.len()
                        ))
                    })?;
                    // Compared in f32, as XGBoost does
                    let go_left = if value.is_nan() {
                        default_left
                    } else {
                        (value as f32) < threshold
                    };
                    id = if go_left { left } else { right };
                }
            }
        }
    }
}

/// Gradient-boosted tree ensemble with a single output group
#[derive(Debug, Clone)]
pub struct XgboostModel {
    trees: Vec<Tree>,
    base_margin: f64,
    link: Link,
    objective: String,
    num_features: usize,
    feature_names: Option<Vec<String>>,
}

impl XgboostModel {
    /// Parse an XGBoost JSON document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, LoadError> {
        let document: Document = serde_json::from_slice(bytes)
            .map_err(|e| LoadError::ModelLoadError(format!("invalid XGBoost JSON: {}", e)))?;
        Self::from_learner(document.learner)
    }

    fn from_learner(learner: Learner) -> Result<Self, LoadError> {
        let booster = learner.gradient_booster;
        if booster.name != "gbtree" {
            return Err(LoadError::UnsupportedFormat(format!(
                "XGBoost booster '{}' (only gbtree is supported)",
                booster.name
            )));
        }
        let section = booster
            .model
            .ok_or_else(|| LoadError::ModelLoadError("gbtree has no model section".to_string()))?;
        let ensemble: Ensemble = serde_json::from_value(section)
            .map_err(|e| LoadError::ModelLoadError(format!("invalid gbtree section: {}", e)))?;

        let objective = learner.objective.name;
        let link = Link::for_objective(&objective).ok_or_else(|| {
            LoadError::UnsupportedFormat(format!("XGBoost objective '{}'", objective))
        })?;

        let params = learner.learner_model_param;
        if params.num_class > 1 || ensemble.tree_info.iter().any(|&group| group != 0) {
            return Err(LoadError::UnsupportedFormat(
                "multi-class XGBoost models".to_string(),
            ));
        }

        let feature_names = if learner.feature_names.is_empty() {
            None
        } else {
            if params.num_feature != 0 && learner.feature_names.len() != params.num_feature {
                return Err(LoadError::ModelLoadError(format!(
                    "{} feature names for {} features",
                    learner.feature_names.len(),
                    params.num_feature
                )));
            }
            Some(learner.feature_names)
        };

        let trees = ensemble
            .trees
            .into_iter()
            .enumerate()
            .map(|(index, dump)| Tree::from_dump(index, dump, params.num_feature))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Loaded XGBoost ensemble: {} trees, objective={}, features={}",
            trees.len(),
            objective,
            params.num_feature
        );

        Ok(Self {
            trees,
            base_margin: link.base_margin(params.base_score),
            link,
            objective,
            num_features: params.num_feature,
            feature_names,
        })
    }

    /// Number of trees in the ensemble
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Objective name as recorded by XGBoost
    pub fn objective(&self) -> &str {
        &self.objective
    }

    /// Raw margin before the objective's link function
    pub fn margin(&self, values: &[f64]) -> Result<f64, InferenceError> {
        self.trees
            .iter()
            .try_fold(self.base_margin, |acc, tree| Ok(acc + tree.leaf_value(values)?))
    }
}

impl Model for XgboostModel {
    fn predict(&self, row: &FeatureRow<'_>) -> Result<f64, InferenceError> {
        let margin = self.margin(row.values())?;
        Ok(self.link.apply(margin))
    }

    fn num_features(&self) -> Option<usize> {
        (self.num_features > 0).then_some(self.num_features)
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn describe(&self) -> String {
        format!("xgboost-json ({}, {} trees)", self.objective, self.trees.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::FeatureSchema;

    /// Two stumps over columns a, b, c with a logistic objective
    pub(crate) const TWO_STUMPS: &str = r#"{
        "learner": {
            "attributes": {},
            "feature_names": ["a", "b", "c"],
            "feature_types": ["float", "float", "float"],
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "gbtree_model_param": {"num_parallel_tree": "1", "num_trees": "2"},
                    "tree_info": [0, 0],
                    "trees": [
                        {
                            "id": 0,
                            "left_children": [1, -1, -1],
                            "right_children": [2, -1, -1],
                            "split_indices": [0, 0, 0],
                            "split_conditions": [0.5, -0.4, 0.6],
                            "default_left": [1, 0, 0],
                            "base_weights": [0.0, -0.4, 0.6],
                            "categories": [],
                            "categories_nodes": [],
                            "categories_segments": [],
                            "categories_sizes": []
                        },
                        {
                            "id": 1,
                            "left_children": [1, -1, -1],
                            "right_children": [2, -1, -1],
                            "split_indices": [2, 0, 0],
                            "split_conditions": [10.0, 0.2, -0.1],
                            "default_left": [false, false, false],
                            "base_weights": [0.0, 0.2, -0.1]
                        }
                    ]
                }
            },
            "learner_model_param": {
                "base_score": "5E-1",
                "num_class": "0",
                "num_feature": "3",
                "num_target": "1"
            },
            "objective": {"name": "binary:logistic", "reg_loss_param": {"scale_pos_weight": "1"}}
        },
        "version": [2, 0, 3]
    }"#;

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["a".into(), "b".into(), "c".into()]).unwrap()
    }

    fn score(model: &XgboostModel, values: &[f64]) -> f64 {
        let schema = schema();
        let row = schema.label(values).unwrap();
        model.predict(&row).unwrap()
    }

    #[test]
    fn test_parses_metadata() {
        let model = XgboostModel::from_slice(TWO_STUMPS.as_bytes()).unwrap();
        assert_eq!(model.num_trees(), 2);
        assert_eq!(model.objective(), "binary:logistic");
        assert_eq!(model.num_features(), Some(3));
        assert_eq!(
            model.feature_names().unwrap(),
            ["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_logistic_scores() {
        let model = XgboostModel::from_slice(TWO_STUMPS.as_bytes()).unwrap();

        // a >= 0.5 -> 0.6, c < 10 -> 0.2
        let high = score(&model, &[1.0, 2.0, 3.0]);
        assert!((high - sigmoid(0.8)).abs() < 1e-12);

        // a < 0.5 -> -0.4, c >= 10 -> -0.1
        let low = score(&model, &[0.0, 2.0, 20.0]);
        assert!((low - sigmoid(-0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_strict_less_than() {
        let model = XgboostModel::from_slice(TWO_STUMPS.as_bytes()).unwrap();
        // a == 0.5 goes right, c == 10 goes right
        assert!((model.margin(&[0.5, 0.0, 10.0]).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_split_compares_in_single_precision() {
        let text = TWO_STUMPS.replacen("[0.5, -0.4, 0.6]", "[1.0E8, -0.4, 0.6]", 1);
        let model = XgboostModel::from_slice(text.as_bytes()).unwrap();

        // 99_999_999 rounds to 1e8 in f32, so it is not below the threshold
        assert_eq!(99_999_999.0_f64 as f32, 1.0E8_f32);
        let margin = model.margin(&[99_999_999.0, 0.0, 20.0]).unwrap();
        assert!((margin - 0.5).abs() < 1e-12, "went left: margin {}", margin);

        let margin = model.margin(&[99_999_990.0, 0.0, 20.0]).unwrap();
        assert!((margin + 0.5).abs() < 1e-12, "went right: margin {}", margin);
    }

    #[test]
    fn test_missing_value_follows_default_direction() {
        let model = XgboostModel::from_slice(TWO_STUMPS.as_bytes()).unwrap();
        // tree 0 defaults left (-0.4), tree 1 defaults right (-0.1)
        let margin = model.margin(&[f64::NAN, 0.0, f64::NAN]).unwrap();
        assert!((margin + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_bracketed_base_score_and_raw_objective() {
        let text = TWO_STUMPS
            .replace("\"5E-1\"", "\"[2.5E-1]\"")
            .replace("binary:logistic", "binary:logitraw");
        let model = XgboostModel::from_slice(text.as_bytes()).unwrap();
        let margin = score(&model, &[1.0, 2.0, 3.0]);
        assert!((margin - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_hinge_outputs_class_label() {
        let text = TWO_STUMPS.replace("binary:logistic", "binary:hinge").replace("\"5E-1\"", "\"0\"");
        let model = XgboostModel::from_slice(text.as_bytes()).unwrap();
        assert_eq!(score(&model, &[1.0, 2.0, 3.0]), 1.0);
        assert_eq!(score(&model, &[0.0, 2.0, 20.0]), 0.0);
    }

    #[test]
    fn test_rejects_unsupported_objective() {
        let text = TWO_STUMPS.replace("binary:logistic", "multi:softprob");
        assert!(matches!(
            XgboostModel::from_slice(text.as_bytes()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_rejects_gblinear() {
        let text = r#"{"learner": {
            "gradient_booster": {"name": "gblinear", "model": {"weights": [0.1, 0.2]}},
            "learner_model_param": {"base_score": "5E-1", "num_feature": "1"},
            "objective": {"name": "binary:logistic"}
        }}"#;
        assert!(matches!(
            XgboostModel::from_slice(text.as_bytes()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_rejects_cyclic_tree() {
        let text = TWO_STUMPS
            .replacen("\"left_children\": [1, -1, -1]", "\"left_children\": [1, 2, -1]", 1)
            .replacen("\"right_children\": [2, -1, -1]", "\"right_children\": [2, 0, -1]", 1);
        let err = XgboostModel::from_slice(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("reachable more than once"), "{}", err);
    }

    #[test]
    fn test_accepts_unreachable_pruned_nodes() {
        let text = TWO_STUMPS
            .replacen("\"left_children\": [1, -1, -1]", "\"left_children\": [1, -1, -1, -1]", 1)
            .replacen("\"right_children\": [2, -1, -1]", "\"right_children\": [2, -1, -1, -1]", 1)
            .replacen("\"split_indices\": [0, 0, 0]", "\"split_indices\": [0, 0, 0, 0]", 1)
            .replacen("[0.5, -0.4, 0.6]", "[0.5, -0.4, 0.6, 9.0]", 1)
            .replacen("\"default_left\": [1, 0, 0]", "\"default_left\": [1, 0, 0, 0]", 1);
        let model = XgboostModel::from_slice(text.as_bytes()).unwrap();
        assert!((model.margin(&[1.0, 2.0, 3.0]).unwrap() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_out_of_range_split_feature() {
        let text = TWO_STUMPS.replacen("\"split_indices\": [2, 0, 0]", "\"split_indices\": [7, 0, 0]", 1);
        assert!(matches!(
            XgboostModel::from_slice(text.as_bytes()),
            Err(LoadError::ModelLoadError(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_json() {
        let text = &TWO_STUMPS[..TWO_STUMPS.len() / 2];
        assert!(matches!(
            XgboostModel::from_slice(text.as_bytes()),
            Err(LoadError::ModelLoadError(_))
        ));
    }
}
