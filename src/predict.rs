use std::path::Path;

use tracing::info;

use crate::error::{PipelineError, Result, Stage};
use crate::features::FeatureMatrix;
use crate::ranking::SeasonRanking;
use crate::scorer::Scorer;

/// Ranks seasons with an already trained scorer; never trains.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    scorer: Option<Scorer>,
}

impl Predictor {
    pub fn unloaded() -> Self {
        Self { scorer: None }
    }

    pub fn from_scorer(scorer: Scorer) -> Self {
        Self {
            scorer: Some(scorer),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let scorer = Scorer::load(path)?;
        info!(path = %path.display(), trees = scorer.model().trees.len(), "loaded model");
        Ok(Self::from_scorer(scorer))
    }

    pub fn is_loaded(&self) -> bool {
        self.scorer.is_some()
    }

    pub fn scorer(&self) -> Result<&Scorer> {
        self.scorer.as_ref().ok_or_else(|| {
            PipelineError::model_state(Stage::Predict, "no trained model is loaded")
        })
    }

    pub fn predict_season(&self, matrix: &FeatureMatrix, season: i32) -> Result<SeasonRanking> {
        let scorer = self.scorer()?;
        scorer.check_schema(matrix, Stage::Predict)?;
        let slice = matrix.season_slice(season);
        if slice.is_empty() {
            return Err(PipelineError::integrity(
                Stage::Predict,
                format!("season {season} is not in the feature matrix"),
            ));
        }
        let scores = scorer.score(&slice)?;
        SeasonRanking::from_scores(season, slice.keys(), &scores, slice.labels())
    }

    /// One ranking per season in the matrix, oldest first.
    pub fn predict_all(&self, matrix: &FeatureMatrix) -> Result<Vec<SeasonRanking>> {
        let scorer = self.scorer()?;
        let scores = scorer.score(matrix)?;
        SeasonRanking::all_seasons(matrix.keys(), &scores, matrix.labels())
    }
}
