//! Gradient-boosted tree ensembles in XGBoost's JSON model format.
//!
//! Only the fields needed for inference are read: the per-tree node arrays,
//! `tree_info`, `learner_model_param` and the objective name. Everything else
//! in the document is ignored.
//!
//! Evaluation mirrors XGBoost's own precision: thresholds, leaf values and
//! margins are `f32`, and each input feature is narrowed to `f32` before it is
//! compared.

use super::Table;
use crate::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct BoosterDocument {
    learner: Learner,
}

#[derive(Debug, Deserialize)]
struct Learner {
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveParam,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    name: String,
    #[serde(default)]
    model: Option<GbTreeModel>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModel {
    trees: Vec<RawTree>,
    #[serde(default)]
    tree_info: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<usize>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
}

/// Older writers emit `default_left` as 0/1, newer ones as booleans.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectiveParam {
    name: String,
}

/// How the summed margin becomes the reported prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Identity,
    Logistic,
    LogitRaw,
    Exp,
    Softmax,
}

impl Objective {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "reg:squarederror" | "reg:linear" | "reg:pseudohubererror" | "reg:absoluteerror" => {
                Ok(Self::Identity)
            }
            "reg:logistic" | "binary:logistic" => Ok(Self::Logistic),
            "binary:logitraw" => Ok(Self::LogitRaw),
            "count:poisson" | "reg:gamma" | "reg:tweedie" => Ok(Self::Exp),
            "multi:softmax" => Ok(Self::Softmax),
            other => Err(Error::model_load(format!(
                "unsupported objective '{}'",
                other
            ))),
        }
    }

    /// Maps `base_score` into margin space.
    fn base_margin(self, base_score: f32) -> Result<f32> {
        match self {
            Self::Identity | Self::Softmax => Ok(base_score),
            Self::Logistic | Self::LogitRaw => {
                if base_score <= 0.0 || base_score >= 1.0 {
                    return Err(Error::model_load(format!(
                        "base_score {} must lie in (0, 1) for a logistic objective",
                        base_score
                    )));
                }
                Ok((base_score / (1.0 - base_score)).ln())
            }
            Self::Exp => {
                if base_score <= 0.0 {
                    return Err(Error::model_load(format!(
                        "base_score {} must be positive for a log-link objective",
                        base_score
                    )));
                }
                Ok(base_score.ln())
            }
        }
    }

    fn transform(self, margin: f32) -> f32 {
        match self {
            Self::Identity | Self::LogitRaw | Self::Softmax => margin,
            Self::Logistic => 1.0 / (1.0 + (-margin).exp()),
            Self::Exp => margin.exp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Node {
    left: usize,
    right: usize,
    feature: usize,
    /// Split threshold, or the leaf value when `is_leaf`.
    value: f32,
    default_left: bool,
    is_leaf: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_raw(index: usize, raw: RawTree) -> Result<Self> {
        let n = raw.left_children.len();
        if n == 0 {
            return Err(Error::model_load(format!("tree {} has no nodes", index)));
        }
        if [
            raw.right_children.len(),
            raw.split_indices.len(),
            raw.split_conditions.len(),
            raw.default_left.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err(Error::model_load(format!(
                "tree {} has node arrays of differing lengths",
                index
            )));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (raw.left_children[i], raw.right_children[i]);
            let is_leaf = left == -1;

            // Children always follow their parent, so traversal terminates.
            let child = |c: i64| -> Result<usize> {
                usize::try_from(c)
                    .ok()
                    .filter(|&c| c > i && c < n)
                    .ok_or_else(|| {
                        Error::model_load(format!(
                            "tree {} node {} has invalid child {}",
                            index, i, c
                        ))
                    })
            };

            let (left, right) = if is_leaf {
                (0, 0)
            } else {
                (child(left)?, child(right)?)
            };

            nodes.push(Node {
                left,
                right,
                feature: raw.split_indices[i],
                value: raw.split_conditions[i],
                default_left: raw.default_left[i].is_set(),
                is_leaf,
            });
        }

        Ok(Self { nodes })
    }

    fn leaf_value(&self, row: &[f64]) -> f32 {
        let mut node = &self.nodes[0];
        while !node.is_leaf {
            let x = row[node.feature] as f32;
            let next = if x.is_nan() {
                if node.default_left { node.left } else { node.right }
            } else if x < node.value {
                node.left
            } else {
                node.right
            };
            node = &self.nodes[next];
        }
        node.value
    }

    fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|n| !n.is_leaf)
            .map(|n| n.feature)
            .max()
    }
}

/// A validated gbtree ensemble ready for row-wise evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
    /// Output group of each tree; all zero unless multi-class.
    tree_group: Vec<usize>,
    num_groups: usize,
    num_features: usize,
    /// Inputs must be wider than this for every split to find its feature.
    required_width: usize,
    base_margin: f32,
    objective: Objective,
}

impl TreeEnsemble {
    pub(crate) fn from_document(doc: BoosterDocument) -> Result<Self> {
        let learner = doc.learner;

        if learner.gradient_booster.name != "gbtree" {
            return Err(Error::model_load(format!(
                "unsupported booster '{}', only gbtree is served",
                learner.gradient_booster.name
            )));
        }
        let model = learner
            .gradient_booster
            .model
            .ok_or_else(|| Error::model_load("gbtree booster has no model section"))?;

        let objective = Objective::from_name(&learner.objective.name)?;
        let params = &learner.learner_model_param;
        let base_score = parse_param(&params.base_score, "base_score")? as f32;
        let num_class = match &params.num_class {
            Some(raw) => parse_count(raw, "num_class")?,
            None => 0,
        };
        let num_features = match &params.num_feature {
            Some(raw) => parse_count(raw, "num_feature")?,
            None => 0,
        };

        let num_groups = num_class.max(1);
        if objective == Objective::Softmax && num_groups < 2 {
            return Err(Error::model_load("multi:softmax requires num_class >= 2"));
        }

        let tree_group = if model.tree_info.is_empty() {
            vec![0; model.trees.len()]
        } else {
            model.tree_info
        };
        if tree_group.len() != model.trees.len() {
            return Err(Error::model_load(format!(
                "tree_info lists {} trees but the model has {}",
                tree_group.len(),
                model.trees.len()
            )));
        }
        if let Some(bad) = tree_group.iter().find(|&&g| g >= num_groups) {
            return Err(Error::model_load(format!(
                "tree assigned to output group {} but the model has {}",
                bad, num_groups
            )));
        }

        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Tree::from_raw(i, raw))
            .collect::<Result<Vec<_>>>()?;

        let required_width = trees
            .iter()
            .filter_map(Tree::max_feature)
            .max()
            .map_or(0, |f| f + 1);
        if num_features != 0 && required_width > num_features {
            return Err(Error::model_load(format!(
                "splits reference feature {} but num_feature is {}",
                required_width - 1,
                num_features
            )));
        }

        Ok(Self {
            trees,
            tree_group,
            num_groups,
            num_features,
            required_width,
            base_margin: objective.base_margin(base_score)?,
            objective,
        })
    }

    /// Declared input width, or 0 when the document does not say.
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn predict(&self, table: &Table) -> Result<Vec<f64>> {
        if table.is_empty() {
            return Ok(Vec::new());
        }
        if self.num_features != 0 && table.n_cols() != self.num_features {
            return Err(Error::prediction(format!(
                "model expects {} features, got {}",
                self.num_features,
                table.n_cols()
            )));
        }
        if table.n_cols() < self.required_width {
            return Err(Error::prediction(format!(
                "model splits on feature {} but rows have {} columns",
                self.required_width - 1,
                table.n_cols()
            )));
        }

        Ok(table.rows().map(|row| self.predict_row(row)).collect())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut margins = vec![self.base_margin; self.num_groups];
        for (tree, &group) in self.trees.iter().zip(&self.tree_group) {
            margins[group] += tree.leaf_value(row);
        }

        match self.objective {
            Objective::Softmax => argmax(&margins) as f64,
            objective => widen(objective.transform(margins[0])),
        }
    }
}

/// Widens through the shortest decimal form, so `0.7310586f32` is reported
/// as `0.7310586` rather than `0.7310585975646973`.
fn widen(value: f32) -> f64 {
    if value.is_finite() {
        value.to_string().parse().unwrap_or(f64::from(value))
    } else {
        f64::from(value)
    }
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 { (i, v) } else { best }
        })
        .0
}

/// Learner params are stringified, sometimes wrapped as `"[5E-1]"`.
fn parse_param(raw: &str, name: &str) -> Result<f64> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .parse()
        .map_err(|_| Error::model_load(format!("invalid {} '{}'", name, raw)))
}

/// Upper bound for class and feature counts read from the document.
const MAX_COUNT: usize = 1 << 20;

fn parse_count(raw: &str, name: &str) -> Result<usize> {
    let value = parse_param(raw, name)?;
    if value < 0.0 || value.fract() != 0.0 || value > MAX_COUNT as f64 {
        return Err(Error::model_load(format!(
            "{} '{}' must be a whole number between 0 and {}",
            name, raw, MAX_COUNT
        )));
    }
    Ok(value as usize)
}
