//! Stage orchestration. Each stage reads the newest file the previous stage
//! left in the output directory and writes its own dated file next to it, so
//! stages can run one at a time or all together.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use crate::assemble::assemble;
use crate::clean::{LabelPolicy, clean};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::evaluate::{EvaluationReport, evaluate};
use crate::features::{FeatureBuilder, FeatureMatrix, FeatureSchema};
use crate::predict::Predictor;
use crate::ranking::SeasonRanking;
use crate::report;
use crate::scorer::Scorer;
use crate::split::SeasonSplit;
use crate::tables;

pub const MERGED_PREFIX: &str = "01_merged";
pub const CLEANED_PREFIX: &str = "02_cleaned";
pub const FEATURES_PREFIX: &str = "03_features";
pub const MODEL_PREFIX: &str = "mvp_gbm_model";
pub const REPORT_PREFIX: &str = "evaluation_report";
pub const RANKINGS_PREFIX: &str = "mvp_rankings";
pub const REDUNDANCY_PREFIX: &str = "feature_redundancy";
pub const WORKBOOK_PREFIX: &str = "mvp_evaluation";
pub const PREDICTIONS_PREFIX: &str = "mvp_predictions";

/// Files written by `evaluate`.
#[derive(Debug, Clone)]
pub struct EvaluationOutputs {
    pub report: EvaluationReport,
    pub text: PathBuf,
    pub rankings: PathBuf,
    pub redundancy: PathBuf,
    pub workbook: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunOutputs {
    pub merged: PathBuf,
    pub cleaned: PathBuf,
    pub features: PathBuf,
    pub model: PathBuf,
    pub evaluation: EvaluationOutputs,
}

pub struct Pipeline {
    config: PipelineConfig,
    stamp: String,
}

impl Pipeline {
    /// Output files are stamped with today's UTC date.
    pub fn new(config: PipelineConfig) -> Self {
        let stamp = Utc::now().format("%Y-%m-%d").to_string();
        Self::with_stamp(config, &stamp)
    }

    pub fn with_stamp(config: PipelineConfig, stamp: &str) -> Self {
        Self {
            config,
            stamp: stamp.to_string(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn output_path(&self, prefix: &str, ext: &str) -> PathBuf {
        self.config
            .data
            .output_dir
            .join(format!("{prefix}_{}.{ext}", self.stamp))
    }

    /// Newest `<prefix>_<stamp>.<ext>` in the output directory. Stamps are
    /// ISO dates, so the lexically greatest name is the newest.
    pub fn latest(&self, prefix: &str, ext: &str, stage: Stage) -> Result<PathBuf> {
        let dir = &self.config.data.output_dir;
        let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
        let head = format!("{prefix}_");
        let tail = format!(".{ext}");
        let mut best: Option<(String, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&head) || !name.ends_with(&tail) {
                continue;
            }
            if best.as_ref().is_none_or(|(b, _)| name > *b) {
                best = Some((name, entry.path()));
            }
        }
        best.map(|(_, path)| path).ok_or_else(|| {
            PipelineError::integrity(
                stage,
                format!(
                    "no {head}*{tail} in {}; run the previous stage first",
                    dir.display()
                ),
            )
        })
    }

    pub fn assemble(&self) -> Result<PathBuf> {
        let data = &self.config.data;
        let totals = tables::load_player_totals(&data.player_totals)?;
        let advanced = tables::load_player_advanced(&data.player_advanced)?;
        let standings = tables::load_team_standings(&data.team_standings)?;
        let (records, summary) =
            assemble(&totals, &advanced, &standings, &self.config.assemble_options())?;
        let out = self.output_path(MERGED_PREFIX, "csv");
        tables::write_records(&out, &records)?;
        info!(rows = summary.output_rows, path = %out.display(), "assemble stage done");
        Ok(out)
    }

    pub fn clean(&self) -> Result<PathBuf> {
        let input = self.latest(MERGED_PREFIX, "csv", Stage::Clean)?;
        let records = tables::read_records(&input, Stage::Clean)?;
        // Unlabeled rows belong to the season being predicted; training
        // still refuses them.
        let (records, summary) = clean(records, LabelPolicy::Allow)?;
        let out = self.output_path(CLEANED_PREFIX, "csv");
        tables::write_records(&out, &records)?;
        info!(rows = summary.output_rows, path = %out.display(), "clean stage done");
        Ok(out)
    }

    pub fn features(&self) -> Result<PathBuf> {
        let input = self.latest(CLEANED_PREFIX, "csv", Stage::Features)?;
        let records = tables::read_records(&input, Stage::Features)?;
        let matrix = FeatureBuilder::new().build(&records)?;
        let out = self.output_path(FEATURES_PREFIX, "csv");
        matrix.write_csv(&out)?;
        info!(
            rows = matrix.len(),
            columns = matrix.schema().len(),
            path = %out.display(),
            "features stage done"
        );
        Ok(out)
    }

    fn load_features(&self, stage: Stage) -> Result<FeatureMatrix> {
        let input = self.latest(FEATURES_PREFIX, "csv", stage)?;
        FeatureMatrix::read_csv(&input, &FeatureSchema::current())
    }

    fn split(&self, matrix: &FeatureMatrix) -> Result<(FeatureMatrix, FeatureMatrix)> {
        let split = SeasonSplit::from_seasons(&matrix.seasons(), &self.config.split)?;
        Ok(split.partition(matrix))
    }

    /// Trains on the training seasons, early-stopping on the validation
    /// seasons, and saves the artifact.
    pub fn train(&self) -> Result<PathBuf> {
        let matrix = self.load_features(Stage::Train)?;
        let (train, validation) = self.split(&matrix)?;
        let scorer = Scorer::train(&train, Some(&validation), &self.config.booster)?;
        let out = self.output_path(MODEL_PREFIX, "json");
        scorer.save(&out)?;
        Ok(out)
    }

    pub fn evaluate(&self) -> Result<EvaluationOutputs> {
        let model = self.latest(MODEL_PREFIX, "json", Stage::Evaluate)?;
        let scorer = Scorer::load(&model)?;
        let matrix = self.load_features(Stage::Evaluate)?;
        let (_, validation) = self.split(&matrix)?;
        let report = evaluate(&scorer, &validation, &self.config.evaluation)?;

        let text = self.output_path(REPORT_PREFIX, "txt");
        report::write_text(&text, &report::render_text(&report, Some(scorer.summary())))?;
        let rankings = self.output_path(RANKINGS_PREFIX, "csv");
        report::write_rankings_csv(&rankings, &report.rankings)?;
        let redundancy = self.output_path(REDUNDANCY_PREFIX, "csv");
        report::write_redundancy_csv(&redundancy, &report.correlated_pairs)?;
        let workbook = self.output_path(WORKBOOK_PREFIX, "xlsx");
        report::export_workbook(&workbook, &report)?;
        info!(report = %text.display(), workbook = %workbook.display(), "evaluate stage done");

        Ok(EvaluationOutputs {
            report,
            text,
            rankings,
            redundancy,
            workbook,
        })
    }

    /// Ranks one season with the newest saved model and writes the full
    /// ranking next to it.
    pub fn predict(&self, season: i32) -> Result<(SeasonRanking, PathBuf)> {
        let model = self.latest(MODEL_PREFIX, "json", Stage::Predict)?;
        let predictor = Predictor::load(&model)?;
        let matrix = self.load_features(Stage::Predict)?;
        let ranking = predictor.predict_season(&matrix, season)?;
        let out = self.output_path(&format!("{PREDICTIONS_PREFIX}_{season}"), "csv");
        report::write_rankings_csv(&out, std::slice::from_ref(&ranking))?;
        info!(season, players = ranking.entries.len(), path = %out.display(), "predict stage done");
        Ok((ranking, out))
    }

    pub fn run(&self) -> Result<RunOutputs> {
        let merged = self.assemble()?;
        let cleaned = self.clean()?;
        let features = self.features()?;
        let model = self.train()?;
        let evaluation = self.evaluate()?;
        Ok(RunOutputs {
            merged,
            cleaned,
            features,
            model,
            evaluation,
        })
    }
}

