use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::booster::{BoosterConfig, EvalSet, GradientBoostedModel, rmse};
use crate::error::{PipelineError, Result, Stage};
use crate::features::{FeatureMatrix, FeatureSchema};

pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    #[serde(default)]
    pub rows: usize,
    #[serde(default)]
    pub seasons: Vec<i32>,
    #[serde(default)]
    pub trees: usize,
    #[serde(default)]
    pub rounds_run: usize,
    #[serde(default)]
    pub best_iteration: Option<usize>,
    #[serde(default)]
    pub train_rmse: f64,
    #[serde(default)]
    pub eval_rows: usize,
    #[serde(default)]
    pub eval_rmse: Option<f64>,
    /// Eval RMSE of always predicting the training mean.
    #[serde(default)]
    pub baseline_eval_rmse: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerArtifact {
    pub version: u32,
    pub generated_at: String,
    pub schema: FeatureSchema,
    pub schema_fingerprint: String,
    #[serde(default)]
    pub booster: BoosterConfig,
    pub model: GradientBoostedModel,
    #[serde(default)]
    pub summary: TrainingSummary,
}

/// A trained model bound to the feature schema it was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorer {
    schema: FeatureSchema,
    model: GradientBoostedModel,
    config: BoosterConfig,
    summary: TrainingSummary,
}

impl Scorer {
    pub fn train(
        train: &FeatureMatrix,
        eval: Option<&FeatureMatrix>,
        config: &BoosterConfig,
    ) -> Result<Scorer> {
        let stage = Stage::Train;
        if train.is_empty() {
            return Err(PipelineError::integrity(stage, "training matrix is empty"));
        }
        if let Some(ev) = eval
            && ev.schema() != train.schema()
        {
            return Err(PipelineError::integrity(
                stage,
                "eval matrix schema differs from the training schema",
            ));
        }

        let columns = train.numeric_columns(stage)?;
        let labels = train.required_labels(stage)?;
        let eval_parts = match eval {
            Some(ev) if !ev.is_empty() => {
                Some((ev.numeric_columns(stage)?, ev.required_labels(stage)?))
            }
            _ => None,
        };
        let eval_set = eval_parts.as_ref().map(|(cols, labels)| EvalSet {
            columns: cols.as_slice(),
            labels: labels.as_slice(),
        });

        let (model, trace) = GradientBoostedModel::train(&columns, &labels, eval_set, config)?;
        let baseline_eval_rmse = eval_parts
            .as_ref()
            .map(|(_, labels)| rmse(&vec![model.base_score; labels.len()], labels));

        let summary = TrainingSummary {
            rows: train.len(),
            seasons: train.seasons(),
            trees: model.trees.len(),
            rounds_run: trace.rounds_run,
            best_iteration: trace.best_iteration,
            train_rmse: trace.train_rmse,
            eval_rows: eval_parts.as_ref().map(|(_, l)| l.len()).unwrap_or(0),
            eval_rmse: trace.eval_rmse,
            baseline_eval_rmse,
        };
        Ok(Scorer {
            schema: train.schema().clone(),
            model,
            config: config.clone(),
            summary,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model(&self) -> &GradientBoostedModel {
        &self.model
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }

    pub fn check_schema(&self, matrix: &FeatureMatrix, stage: Stage) -> Result<()> {
        if matrix.schema() != &self.schema {
            return Err(PipelineError::integrity(
                stage,
                format!(
                    "feature schema v{} ({}) does not match the model's v{} ({})",
                    matrix.schema().version,
                    short(&matrix.schema().fingerprint()),
                    self.schema.version,
                    short(&self.schema.fingerprint())
                ),
            ));
        }
        Ok(())
    }

    /// One score per row, in row order.
    pub fn score(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        self.check_schema(matrix, Stage::Predict)?;
        let columns = matrix.numeric_columns(Stage::Predict)?;
        Ok(self.model.predict_columns(&columns, matrix.len()))
    }

    pub fn expected_value(&self) -> f64 {
        self.model.expected_value()
    }

    /// TreeSHAP attribution per row and feature (schema order).
    pub fn attributions(&self, matrix: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        self.check_schema(matrix, Stage::Evaluate)?;
        let rows = matrix.rows(Stage::Evaluate)?;
        Ok(rows
            .par_iter()
            .map(|row| self.model.shap_values(row))
            .collect())
    }

    /// Normalized gain importance, highest first.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .schema
            .columns
            .iter()
            .cloned()
            .zip(self.model.feature_gain())
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn to_artifact(&self) -> ScorerArtifact {
        ScorerArtifact {
            version: ARTIFACT_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            schema: self.schema.clone(),
            schema_fingerprint: self.schema.fingerprint(),
            booster: self.config.clone(),
            model: self.model.clone(),
            summary: self.summary.clone(),
        }
    }

    pub fn from_artifact(artifact: ScorerArtifact, path: &Path) -> Result<Scorer> {
        if artifact.version != ARTIFACT_VERSION {
            return Err(PipelineError::model_state(
                Stage::Predict,
                format!(
                    "{} has artifact version {}, expected {ARTIFACT_VERSION}",
                    path.display(),
                    artifact.version
                ),
            ));
        }
        if artifact.schema_fingerprint != artifact.schema.fingerprint() {
            return Err(PipelineError::integrity(
                Stage::Predict,
                format!("{} schema fingerprint does not match its columns", path.display()),
            ));
        }
        if artifact.model.n_features != artifact.schema.len() {
            return Err(PipelineError::integrity(
                Stage::Predict,
                format!(
                    "{} model expects {} features, schema lists {}",
                    path.display(),
                    artifact.model.n_features,
                    artifact.schema.len()
                ),
            ));
        }
        Ok(Scorer {
            schema: artifact.schema,
            model: artifact.model,
            config: artifact.booster,
            summary: artifact.summary,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.to_artifact()).map_err(|e| {
            PipelineError::Artifact {
                path: path.display().to_string(),
                source: e,
            }
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| PipelineError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| PipelineError::io(path, e))?;
        info!(path = %path.display(), trees = self.model.trees.len(), "saved model artifact");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Scorer> {
        let raw = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let artifact: ScorerArtifact =
            serde_json::from_str(&raw).map_err(|e| PipelineError::Artifact {
                path: path.display().to_string(),
                source: e,
            })?;
        Scorer::from_artifact(artifact, path)
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
