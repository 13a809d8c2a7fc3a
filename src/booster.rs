//! Gradient-boosted regression trees (squared error, second-order leaf
//! weights, exact greedy splits) with exact TreeSHAP attribution.
//!
//! Data is passed column-major: `columns[feature][row]`. Trees store feature
//! indices into that layout, so the caller owns the feature names.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, Result, Stage};

/// Splits must improve the objective by more than this.
const MIN_SPLIT_GAIN: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum hessian sum (row count for squared error) in each child.
    pub min_child_weight: f64,
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    /// Minimum loss reduction to keep a split.
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub early_stopping_rounds: Option<usize>,
    pub seed: u64,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            n_estimators: 1000,
            learning_rate: 0.03,
            max_depth: 6,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            early_stopping_rounds: Some(50),
            seed: 42,
        }
    }
}

impl BoosterConfig {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(PipelineError::Config(format!("booster: {msg}")));
        if self.n_estimators == 0 {
            return fail("n_estimators must be at least 1");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return fail("learning_rate must be in (0, 1]");
        }
        if self.max_depth == 0 {
            return fail("max_depth must be at least 1");
        }
        if !(self.min_child_weight >= 0.0) || !(self.lambda >= 0.0) || !(self.gamma >= 0.0) {
            return fail("min_child_weight, lambda and gamma must be non-negative");
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return fail("subsample must be in (0, 1]");
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return fail("colsample_bytree must be in (0, 1]");
        }
        if self.early_stopping_rounds == Some(0) {
            return fail("early_stopping_rounds must be at least 1 when set");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `x[feature] < threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
        gain: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Split { cover, .. } | TreeNode::Leaf { cover, .. } => *cover,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    /// Root at index 0.
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn leaf_for<F: Fn(usize) -> f64>(&self, value_of: F) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if value_of(*feature) < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.leaf_for(|f| row[f])
    }

    fn predict_at(&self, columns: &[&[f64]], row: usize) -> f64 {
        self.leaf_for(|f| columns[f][row])
    }

    /// Cover-weighted mean leaf value.
    pub fn expected_value(&self) -> f64 {
        self.node_expectation(0)
    }

    fn node_expectation(&self, idx: usize) -> f64 {
        match &self.nodes[idx] {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                left, right, cover, ..
            } => {
                if *cover <= 0.0 {
                    return 0.0;
                }
                let l = self.nodes[*left].cover();
                let r = self.nodes[*right].cover();
                (l * self.node_expectation(*left) + r * self.node_expectation(*right)) / cover
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    /// Adds this tree's TreeSHAP values for `row` into `phi`.
    fn shap_into(&self, row: &[f64], phi: &mut [f64]) {
        self.shap_recurse(0, row, phi, Vec::new(), 1.0, 1.0, None);
    }

    #[allow(clippy::too_many_arguments)]
    fn shap_recurse(
        &self,
        idx: usize,
        row: &[f64],
        phi: &mut [f64],
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend_path(&mut path, zero_fraction, one_fraction, feature);
        match &self.nodes[idx] {
            TreeNode::Leaf { value, .. } => {
                for i in 1..path.len() {
                    let weight = unwound_path_sum(&path, i);
                    let el = &path[i];
                    if let Some(f) = el.feature {
                        phi[f] += weight * (el.one_fraction - el.zero_fraction) * value;
                    }
                }
            }
            TreeNode::Split {
                feature: split_feature,
                threshold,
                left,
                right,
                cover,
                ..
            } => {
                let (hot, cold) = if row[*split_feature] < *threshold {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                let hot_zero = self.nodes[hot].cover() / cover;
                let cold_zero = self.nodes[cold].cover() / cover;
                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;

                // A feature seen earlier on the path is unwound and re-added here.
                if let Some(seen) = path
                    .iter()
                    .position(|el| el.feature == Some(*split_feature))
                {
                    incoming_zero = path[seen].zero_fraction;
                    incoming_one = path[seen].one_fraction;
                    unwind_path(&mut path, seen);
                }

                self.shap_recurse(
                    hot,
                    row,
                    phi,
                    path.clone(),
                    hot_zero * incoming_zero,
                    incoming_one,
                    Some(*split_feature),
                );
                self.shap_recurse(
                    cold,
                    row,
                    phi,
                    path,
                    cold_zero * incoming_zero,
                    0.0,
                    Some(*split_feature),
                );
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / (depth + 1) as f64;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / (depth + 1) as f64;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, path_index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight =
                next_one_portion * (depth + 1) as f64 / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / (depth + 1) as f64;
        } else {
            path[i].pweight =
                path[i].pweight * (depth + 1) as f64 / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in path_index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_path_sum(path: &[PathElement], path_index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (depth + 1) as f64 / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion =
                path[i].pweight - tmp * zero_fraction * (depth - i) as f64 / (depth + 1) as f64;
        } else if zero_fraction != 0.0 {
            total += path[i].pweight / zero_fraction / ((depth - i) as f64 / (depth + 1) as f64);
        }
    }
    total
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedModel {
    pub base_score: f64,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

/// Held-out rows watched for early stopping.
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub columns: &'a [&'a [f64]],
    pub labels: &'a [f64],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingTrace {
    pub rounds_run: usize,
    /// Zero-based round with the lowest eval RMSE, when an eval set was given.
    pub best_iteration: Option<usize>,
    pub train_rmse: f64,
    pub eval_rmse: Option<f64>,
}

pub fn rmse(predictions: &[f64], labels: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let sse: f64 = predictions
        .iter()
        .zip(labels)
        .map(|(p, y)| (p - y) * (p - y))
        .sum();
    (sse / labels.len() as f64).sqrt()
}

impl GradientBoostedModel {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub fn predict_columns(&self, columns: &[&[f64]], n_rows: usize) -> Vec<f64> {
        (0..n_rows)
            .into_par_iter()
            .map(|row| {
                self.base_score
                    + self
                        .trees
                        .iter()
                        .map(|t| t.predict_at(columns, row))
                        .sum::<f64>()
            })
            .collect()
    }

    /// Model output when no feature is known.
    pub fn expected_value(&self) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.expected_value()).sum::<f64>()
    }

    /// Exact TreeSHAP values; `sum + expected_value() == predict_row(row)`.
    pub fn shap_values(&self, row: &[f64]) -> Vec<f64> {
        let mut phi = vec![0.0; self.n_features];
        for tree in &self.trees {
            tree.shap_into(row, &mut phi);
        }
        phi
    }

    /// Total split gain per feature, normalized to sum to one.
    pub fn feature_gain(&self) -> Vec<f64> {
        let mut gain = vec![0.0; self.n_features];
        for tree in &self.trees {
            for node in &tree.nodes {
                if let TreeNode::Split {
                    feature, gain: g, ..
                } = node
                {
                    gain[*feature] += g;
                }
            }
        }
        let total: f64 = gain.iter().sum();
        if total > 0.0 {
            for g in &mut gain {
                *g /= total;
            }
        }
        gain
    }

    pub fn train(
        columns: &[&[f64]],
        labels: &[f64],
        eval: Option<EvalSet<'_>>,
        config: &BoosterConfig,
    ) -> Result<(GradientBoostedModel, TrainingTrace)> {
        config.validate()?;
        let n_rows = labels.len();
        let n_features = columns.len();
        if n_rows == 0 || n_features == 0 {
            return Err(PipelineError::integrity(
                Stage::Train,
                "training data has no rows or no features",
            ));
        }
        if columns.iter().any(|c| c.len() != n_rows) {
            return Err(PipelineError::integrity(
                Stage::Train,
                "feature columns and labels differ in length",
            ));
        }
        if let Some(ev) = eval
            && (ev.columns.len() != n_features
                || ev.columns.iter().any(|c| c.len() != ev.labels.len()))
        {
            return Err(PipelineError::integrity(
                Stage::Train,
                "eval set does not have the training layout",
            ));
        }

        let base_score = labels.iter().sum::<f64>() / n_rows as f64;
        let sorted: Vec<Vec<usize>> = columns
            .par_iter()
            .map(|col| {
                let mut idx: Vec<usize> = (0..n_rows).collect();
                idx.sort_by(|a, b| col[*a].total_cmp(&col[*b]).then(a.cmp(b)));
                idx
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut preds = vec![base_score; n_rows];
        let mut eval_preds = eval.map(|ev| vec![base_score; ev.labels.len()]);
        let mut trees: Vec<RegressionTree> = Vec::with_capacity(config.n_estimators);
        let mut best: Option<(usize, f64)> = None;
        let mut trace = TrainingTrace::default();

        for round in 0..config.n_estimators {
            let grad: Vec<f64> = preds.iter().zip(labels).map(|(p, y)| p - y).collect();
            let rows = sample_rows(&mut rng, n_rows, config.subsample);
            let features = sample_features(&mut rng, n_features, config.colsample_bytree);

            let tree = grow_tree(columns, &sorted, &grad, &rows, &features, config);
            for (row, p) in preds.iter_mut().enumerate() {
                *p += tree.predict_at(columns, row);
            }
            trace.rounds_run = round + 1;

            if let (Some(ev), Some(ep)) = (eval, eval_preds.as_mut()) {
                for (row, p) in ep.iter_mut().enumerate() {
                    *p += tree.predict_at(ev.columns, row);
                }
                let score = rmse(ep, ev.labels);
                trees.push(tree);
                match best {
                    Some((_, best_rmse)) if score >= best_rmse => {}
                    _ => best = Some((round, score)),
                }
                if let (Some(patience), Some((best_round, _))) = (config.early_stopping_rounds, best)
                    && round - best_round >= patience
                {
                    debug!(round, best_round, "early stopping");
                    break;
                }
            } else {
                trees.push(tree);
            }

            if (round + 1) % 100 == 0 {
                debug!(round = round + 1, train_rmse = rmse(&preds, labels), "boosting");
            }
        }

        if config.early_stopping_rounds.is_some() {
            if let Some((best_round, best_rmse)) = best {
                trees.truncate(best_round + 1);
                trace.best_iteration = Some(best_round);
                trace.eval_rmse = Some(best_rmse);
            }
        } else if let (Some(ev), Some(ep)) = (eval, eval_preds.as_ref()) {
            // Without early stopping every round is kept.
            trace.eval_rmse = Some(rmse(ep, ev.labels));
        }

        let model = GradientBoostedModel {
            base_score,
            n_features,
            trees,
        };
        trace.train_rmse = rmse(&model.predict_columns(columns, n_rows), labels);
        info!(
            trees = model.trees.len(),
            rounds = trace.rounds_run,
            train_rmse = trace.train_rmse,
            eval_rmse = ?trace.eval_rmse,
            "trained gradient boosted model"
        );
        Ok((model, trace))
    }
}

fn sample_rows(rng: &mut StdRng, n_rows: usize, fraction: f64) -> Vec<bool> {
    if fraction >= 1.0 {
        return vec![true; n_rows];
    }
    let k = ((n_rows as f64 * fraction).round() as usize).clamp(1, n_rows);
    let mut mask = vec![false; n_rows];
    for idx in sample(rng, n_rows, k).into_iter() {
        mask[idx] = true;
    }
    mask
}

fn sample_features(rng: &mut StdRng, n_features: usize, fraction: f64) -> Vec<usize> {
    if fraction >= 1.0 {
        return (0..n_features).collect();
    }
    let k = ((n_features as f64 * fraction).round() as usize).clamp(1, n_features);
    let mut picked = sample(rng, n_features, k).into_vec();
    picked.sort_unstable();
    picked
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    node: usize,
    grad_sum: f64,
    hess_sum: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_grad: f64,
    left_hess: f64,
}

fn leaf_weight(grad_sum: f64, hess_sum: f64, config: &BoosterConfig) -> f64 {
    -grad_sum / (hess_sum + config.lambda) * config.learning_rate
}

fn score(grad_sum: f64, hess_sum: f64, lambda: f64) -> f64 {
    grad_sum * grad_sum / (hess_sum + lambda)
}

/// Level-wise exact greedy growth. Hessians are all one for squared error.
fn grow_tree(
    columns: &[&[f64]],
    sorted: &[Vec<usize>],
    grad: &[f64],
    in_sample: &[bool],
    features: &[usize],
    config: &BoosterConfig,
) -> RegressionTree {
    let n_rows = grad.len();
    let mut position: Vec<Option<usize>> = (0..n_rows)
        .map(|r| if in_sample[r] { Some(0) } else { None })
        .collect();
    let (g0, h0) = (0..n_rows)
        .filter(|&r| in_sample[r])
        .fold((0.0, 0.0), |(g, h), r| (g + grad[r], h + 1.0));

    let mut nodes = vec![TreeNode::Leaf {
        value: 0.0,
        cover: h0,
    }];
    let mut frontier = vec![OpenNode {
        node: 0,
        grad_sum: g0,
        hess_sum: h0,
    }];

    for _depth in 0..config.max_depth {
        if frontier.is_empty() {
            break;
        }
        let per_feature: Vec<Vec<Option<Candidate>>> = features
            .par_iter()
            .map(|&f| best_splits_for_feature(f, columns[f], &sorted[f], grad, &position, &frontier, config))
            .collect();

        let mut next = Vec::new();
        let mut remap: Vec<Option<(usize, usize)>> = vec![None; frontier.len()];
        for (k, open) in frontier.iter().enumerate() {
            let mut best: Option<Candidate> = None;
            for candidates in &per_feature {
                if let Some(c) = candidates[k]
                    && best.is_none_or(|b| c.gain > b.gain)
                {
                    best = Some(c);
                }
            }
            match best {
                Some(c) if c.gain > MIN_SPLIT_GAIN => {
                    let right_grad = open.grad_sum - c.left_grad;
                    let right_hess = open.hess_sum - c.left_hess;
                    let left = nodes.len();
                    nodes.push(TreeNode::Leaf {
                        value: 0.0,
                        cover: c.left_hess,
                    });
                    let right = nodes.len();
                    nodes.push(TreeNode::Leaf {
                        value: 0.0,
                        cover: right_hess,
                    });
                    nodes[open.node] = TreeNode::Split {
                        feature: c.feature,
                        threshold: c.threshold,
                        left,
                        right,
                        cover: open.hess_sum,
                        gain: c.gain,
                    };
                    remap[k] = Some((next.len(), next.len() + 1));
                    next.push(OpenNode {
                        node: left,
                        grad_sum: c.left_grad,
                        hess_sum: c.left_hess,
                    });
                    next.push(OpenNode {
                        node: right,
                        grad_sum: right_grad,
                        hess_sum: right_hess,
                    });
                }
                _ => {
                    nodes[open.node] = TreeNode::Leaf {
                        value: leaf_weight(open.grad_sum, open.hess_sum, config),
                        cover: open.hess_sum,
                    };
                }
            }
        }

        for row in 0..n_rows {
            let Some(k) = position[row] else { continue };
            position[row] = match (remap[k], &nodes[frontier[k].node]) {
                (Some((l, r)), TreeNode::Split {
                    feature, threshold, ..
                }) => Some(if columns[*feature][row] < *threshold { l } else { r }),
                _ => None,
            };
        }
        frontier = next;
    }

    for open in frontier {
        nodes[open.node] = TreeNode::Leaf {
            value: leaf_weight(open.grad_sum, open.hess_sum, config),
            cover: open.hess_sum,
        };
    }
    RegressionTree { nodes }
}

/// Best split of `feature` for every open node, in one pass over the
/// presorted rows.
fn best_splits_for_feature(
    feature: usize,
    values: &[f64],
    sorted: &[usize],
    grad: &[f64],
    position: &[Option<usize>],
    frontier: &[OpenNode],
    config: &BoosterConfig,
) -> Vec<Option<Candidate>> {
    let n = frontier.len();
    let mut left_grad = vec![0.0; n];
    let mut left_hess = vec![0.0; n];
    let mut last: Vec<Option<f64>> = vec![None; n];
    let mut best: Vec<Option<Candidate>> = vec![None; n];

    for &row in sorted {
        let Some(k) = position[row] else { continue };
        let x = values[row];
        if let Some(prev) = last[k]
            && x > prev
        {
            let open = frontier[k];
            let (gl, hl) = (left_grad[k], left_hess[k]);
            let (gr, hr) = (open.grad_sum - gl, open.hess_sum - hl);
            if hl >= config.min_child_weight && hr >= config.min_child_weight && hl > 0.0 && hr > 0.0 {
                let gain = 0.5
                    * (score(gl, hl, config.lambda) + score(gr, hr, config.lambda)
                        - score(open.grad_sum, open.hess_sum, config.lambda))
                    - config.gamma;
                if best[k].is_none_or(|b| gain > b.gain) {
                    let mid = prev + (x - prev) / 2.0;
                    let threshold = if mid > prev { mid } else { x };
                    best[k] = Some(Candidate {
                        feature,
                        threshold,
                        gain,
                        left_grad: gl,
                        left_hess: hl,
                    });
                }
            }
        }
        left_grad[k] += grad[row];
        left_hess[k] += 1.0;
        last[k] = Some(x);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let noise: Vec<f64> = (0..40).map(|i| ((i * 7) % 5) as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| if *v >= 20.0 { 1.0 } else { 0.0 }).collect();
        (x, noise, y)
    }

    fn quick_config() -> BoosterConfig {
        BoosterConfig {
            n_estimators: 60,
            learning_rate: 0.3,
            max_depth: 3,
            early_stopping_rounds: None,
            ..BoosterConfig::default()
        }
    }

    #[test]
    fn learns_a_step_on_the_informative_feature() {
        let (x, noise, y) = step_data();
        let columns = [x.as_slice(), noise.as_slice()];
        let (model, trace) = GradientBoostedModel::train(&columns, &y, None, &quick_config()).unwrap();
        assert!(model.predict_row(&[35.0, 1.0]) > 0.9);
        assert!(model.predict_row(&[3.0, 1.0]) < 0.1);
        assert!(trace.train_rmse < 0.05);

        let gain = model.feature_gain();
        assert!((gain.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(gain[0] > gain[1]);
        let TreeNode::Split { threshold, .. } = model.trees[0].nodes[0] else {
            panic!("first tree should split");
        };
        assert_eq!(threshold, 19.5);
    }

    #[test]
    fn shap_values_add_up_to_prediction() {
        let (x, noise, y) = step_data();
        let third: Vec<f64> = x.iter().map(|v| (v * 0.37).sin()).collect();
        let target: Vec<f64> = y.iter().zip(&third).map(|(a, b)| a + 0.3 * b).collect();
        let columns = [x.as_slice(), noise.as_slice(), third.as_slice()];
        let config = BoosterConfig {
            subsample: 0.8,
            colsample_bytree: 0.67,
            ..quick_config()
        };
        let (model, _) = GradientBoostedModel::train(&columns, &target, None, &config).unwrap();
        for row in [[3.0, 2.0, 0.5], [25.0, 0.0, -0.9], [19.5, 4.0, 0.0]] {
            let phi = model.shap_values(&row);
            let total = phi.iter().sum::<f64>() + model.expected_value();
            assert!((total - model.predict_row(&row)).abs() < 1e-9);
        }
    }

    #[test]
    fn same_seed_same_model() {
        let (x, noise, y) = step_data();
        let columns = [x.as_slice(), noise.as_slice()];
        let config = BoosterConfig {
            subsample: 0.7,
            colsample_bytree: 0.5,
            ..quick_config()
        };
        let (a, _) = GradientBoostedModel::train(&columns, &y, None, &config).unwrap();
        let (b, _) = GradientBoostedModel::train(&columns, &y, None, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn early_stopping_truncates_to_best_round() {
        let (x, noise, y) = step_data();
        let columns = [x.as_slice(), noise.as_slice()];
        // Held-out labels the training signal cannot explain.
        let eval_labels: Vec<f64> = (0..40).map(|i| (i % 2) as f64).collect();
        let config = BoosterConfig {
            n_estimators: 500,
            early_stopping_rounds: Some(5),
            ..quick_config()
        };
        let eval = EvalSet {
            columns: &columns,
            labels: &eval_labels,
        };
        let (model, trace) = GradientBoostedModel::train(&columns, &y, Some(eval), &config).unwrap();
        let best = trace.best_iteration.unwrap();
        assert_eq!(model.trees.len(), best + 1);
        assert!(trace.rounds_run < 500);
        assert!(trace.rounds_run <= best + 6);
    }

    #[test]
    fn eval_set_without_early_stopping_keeps_every_round() {
        let (x, noise, y) = step_data();
        let columns = [x.as_slice(), noise.as_slice()];
        let eval_labels: Vec<f64> = (0..40).map(|i| (i % 2) as f64).collect();
        let config = BoosterConfig {
            n_estimators: 200,
            ..quick_config()
        };
        let eval = EvalSet {
            columns: &columns,
            labels: &eval_labels,
        };
        let (model, trace) = GradientBoostedModel::train(&columns, &y, Some(eval), &config).unwrap();
        assert_eq!(model.trees.len(), 200);
        assert_eq!(trace.rounds_run, 200);
        assert_eq!(trace.best_iteration, None);
        assert!(trace.eval_rmse.is_some());
    }

    #[test]
    fn constant_labels_give_constant_model() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![0.25; 10];
        let (model, _) =
            GradientBoostedModel::train(&[x.as_slice()], &y, None, &quick_config()).unwrap();
        assert_eq!(model.predict_row(&[4.0]), 0.25);
        assert_eq!(model.shap_values(&[4.0]), vec![0.0]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = BoosterConfig {
            learning_rate: 0.0,
            ..BoosterConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }
}
