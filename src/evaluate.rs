use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, Result, Stage};
use crate::features::FeatureMatrix;
use crate::metrics::{RegressionMetrics, pearson, regression_metrics, roc_auc};
use crate::ranking::{RankedPlayer, SeasonRanking};
use crate::scorer::Scorer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Number of latest validation seasons in the headline mean MVP rank.
    pub recent_seasons: usize,
    pub top_n: usize,
    pub correlation_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            recent_seasons: 10,
            top_n: 5,
            correlation_threshold: 0.85,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.recent_seasons == 0 || self.top_n == 0 {
            return Err(PipelineError::Config(
                "evaluation: recent_seasons and top_n must be at least 1".to_string(),
            ));
        }
        if !(self.correlation_threshold > 0.0 && self.correlation_threshold <= 1.0) {
            return Err(PipelineError::Config(
                "evaluation: correlation_threshold must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonOutcome {
    pub season: i32,
    pub mvp: Option<String>,
    pub mvp_rank: Option<usize>,
    pub mvp_score: Option<f64>,
    pub top: Vec<RankedPlayer>,
}

impl SeasonOutcome {
    pub fn mvp_in_top(&self) -> bool {
        self.mvp_rank.is_some_and(|r| r <= self.top.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureAttribution {
    pub feature: String,
    pub mean_abs_shap: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub feature_a: String,
    pub feature_b: String,
    pub correlation: f64,
    pub attribution_a: f64,
    pub attribution_b: f64,
    pub keep: String,
    pub remove: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub metrics: RegressionMetrics,
    pub seasons: Vec<SeasonOutcome>,
    #[serde(skip)]
    pub rankings: Vec<SeasonRanking>,
    pub recent_seasons: Vec<i32>,
    pub mean_recent_mvp_rank: Option<f64>,
    /// Schema order.
    pub attributions: Vec<FeatureAttribution>,
    pub correlated_pairs: Vec<CorrelatedPair>,
    pub removal_candidates: Vec<String>,
}

impl EvaluationReport {
    /// Attributions sorted by mean |SHAP|, largest first.
    pub fn ranked_attributions(&self) -> Vec<&FeatureAttribution> {
        let mut out: Vec<&FeatureAttribution> = self.attributions.iter().collect();
        out.sort_by(|a, b| {
            b.mean_abs_shap
                .total_cmp(&a.mean_abs_shap)
                .then_with(|| a.feature.cmp(&b.feature))
        });
        out
    }
}

/// Feature pairs whose |Pearson r| reaches `threshold`, each with the member
/// of lower mean attribution marked for removal (the first one on a tie).
/// Constant columns never pair.
pub fn redundancy_candidates(
    names: &[String],
    columns: &[&[f64]],
    attribution: &[f64],
    threshold: f64,
) -> Vec<CorrelatedPair> {
    let mut pairs: Vec<CorrelatedPair> = (0..columns.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            ((i + 1)..columns.len()).filter_map(move |j| {
                let r = pearson(columns[i], columns[j])?;
                if r.abs() < threshold {
                    return None;
                }
                let (a, b) = (attribution[i], attribution[j]);
                let (keep, remove) = if a > b { (i, j) } else { (j, i) };
                Some(CorrelatedPair {
                    feature_a: names[i].clone(),
                    feature_b: names[j].clone(),
                    correlation: r,
                    attribution_a: a,
                    attribution_b: b,
                    keep: names[keep].clone(),
                    remove: names[remove].clone(),
                })
            })
        })
        .collect();
    pairs.sort_by(|x, y| y.correlation.abs().total_cmp(&x.correlation.abs()));
    pairs
}

pub fn evaluate(
    scorer: &Scorer,
    validation: &FeatureMatrix,
    config: &EvaluationConfig,
) -> Result<EvaluationReport> {
    let stage = Stage::Evaluate;
    config.validate()?;
    scorer.check_schema(validation, stage)?;
    if validation.is_empty() {
        return Err(PipelineError::integrity(stage, "validation matrix is empty"));
    }
    let labels = validation.required_labels(stage)?;
    let columns = validation.numeric_columns(stage)?;
    let scores = scorer.model().predict_columns(&columns, validation.len());
    let rankings = SeasonRanking::all_seasons(validation.keys(), &scores, validation.labels())?;

    let mvps: HashSet<(i32, &str)> = rankings
        .iter()
        .filter_map(|r| r.actual_mvp().map(|e| (r.season, e.player.as_str())))
        .collect();
    let positive: Vec<bool> = validation
        .keys()
        .iter()
        .map(|k| mvps.contains(&(k.season, k.player.as_str())))
        .collect();

    let mut metrics = regression_metrics(&scores, &labels);
    metrics.auc = roc_auc(&scores, &positive);

    let seasons: Vec<SeasonOutcome> = rankings
        .iter()
        .map(|ranking| {
            let mvp = ranking.actual_mvp();
            if mvp.is_none() {
                warn!(season = ranking.season, "validation season has no labeled MVP");
            }
            SeasonOutcome {
                season: ranking.season,
                mvp: mvp.map(|e| e.player.clone()),
                mvp_rank: mvp.map(|e| e.rank),
                mvp_score: mvp.map(|e| e.score),
                top: ranking.top(config.top_n).to_vec(),
            }
        })
        .collect();

    let with_mvp: Vec<&SeasonOutcome> = seasons.iter().filter(|s| s.mvp_rank.is_some()).collect();
    let recent = &with_mvp[with_mvp.len().saturating_sub(config.recent_seasons)..];
    let recent_seasons: Vec<i32> = recent.iter().map(|s| s.season).collect();
    let mean_recent_mvp_rank = if recent.is_empty() {
        None
    } else {
        let total: usize = recent.iter().filter_map(|s| s.mvp_rank).sum();
        Some(total as f64 / recent.len() as f64)
    };

    let shap = scorer.attributions(validation)?;
    let n_features = validation.schema().len();
    let mut mean_abs = vec![0.0; n_features];
    for row in &shap {
        for (acc, v) in mean_abs.iter_mut().zip(row) {
            *acc += v.abs();
        }
    }
    for v in &mut mean_abs {
        *v /= shap.len() as f64;
    }
    let gain = scorer.model().feature_gain();
    let names = &validation.schema().columns;
    let attributions: Vec<FeatureAttribution> = names
        .iter()
        .zip(&mean_abs)
        .zip(&gain)
        .map(|((feature, m), g)| FeatureAttribution {
            feature: feature.clone(),
            mean_abs_shap: *m,
            gain: *g,
        })
        .collect();

    let correlated_pairs =
        redundancy_candidates(names, &columns, &mean_abs, config.correlation_threshold);
    let mut removal_candidates: Vec<String> = Vec::new();
    for pair in &correlated_pairs {
        if !removal_candidates.contains(&pair.remove) {
            removal_candidates.push(pair.remove.clone());
        }
    }

    info!(
        rows = metrics.samples,
        mae = metrics.mae,
        rmse = metrics.rmse,
        r2 = metrics.r2,
        auc = ?metrics.auc,
        mean_recent_mvp_rank = ?mean_recent_mvp_rank,
        correlated_pairs = correlated_pairs.len(),
        "evaluated validation seasons"
    );

    Ok(EvaluationReport {
        metrics,
        seasons,
        rankings,
        recent_seasons,
        mean_recent_mvp_rank,
        attributions,
        correlated_pairs,
        removal_candidates,
    })
}
