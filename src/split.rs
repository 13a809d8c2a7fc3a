use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result, Stage};
use crate::features::FeatureMatrix;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub validation_seasons: Vec<i32>,
    /// Seasons left out of both sides (e.g. the one still being played).
    pub excluded_seasons: Vec<i32>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            validation_seasons: (2005..=2023).step_by(2).collect(),
            excluded_seasons: vec![2024],
        }
    }
}

/// Training and validation seasons; no season is on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonSplit {
    pub train: BTreeSet<i32>,
    pub validation: BTreeSet<i32>,
}

impl SeasonSplit {
    pub fn from_seasons(available: &[i32], config: &SplitConfig) -> Result<Self> {
        let excluded: BTreeSet<i32> = config.excluded_seasons.iter().copied().collect();
        let wanted: BTreeSet<i32> = config.validation_seasons.iter().copied().collect();
        let mut train = BTreeSet::new();
        let mut validation = BTreeSet::new();
        for &season in available {
            if excluded.contains(&season) {
                continue;
            }
            if wanted.contains(&season) {
                validation.insert(season);
            } else {
                train.insert(season);
            }
        }
        if train.is_empty() {
            return Err(PipelineError::integrity(Stage::Split, "no training seasons left"));
        }
        if validation.is_empty() {
            return Err(PipelineError::integrity(
                Stage::Split,
                "none of the validation seasons are present",
            ));
        }
        Ok(Self { train, validation })
    }

    pub fn is_disjoint(&self) -> bool {
        self.train.is_disjoint(&self.validation)
    }

    /// (train, validation) slices of `matrix`.
    pub fn partition(&self, matrix: &FeatureMatrix) -> (FeatureMatrix, FeatureMatrix) {
        let train = matrix.filter_seasons(|s| self.train.contains(&s));
        let validation = matrix.filter_seasons(|s| self.validation.contains(&s));
        info!(
            train_rows = train.len(),
            train_seasons = self.train.len(),
            validation_rows = validation.len(),
            validation_seasons = self.validation.len(),
            "split by season"
        );
        (train, validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_validation_is_odd_seasons() {
        let config = SplitConfig::default();
        assert_eq!(config.validation_seasons.first(), Some(&2005));
        assert_eq!(config.validation_seasons.last(), Some(&2023));
        assert!(config.validation_seasons.iter().all(|s| s % 2 == 1));
    }

    #[test]
    fn excluded_and_absent_seasons_are_dropped() {
        let available: Vec<i32> = (2003..=2024).collect();
        let split = SeasonSplit::from_seasons(&available, &SplitConfig::default()).unwrap();
        assert!(split.is_disjoint());
        assert!(!split.train.contains(&2024));
        assert!(!split.validation.contains(&2024));
        assert!(split.train.contains(&2004));
        assert_eq!(split.validation.len(), 10);
    }

    #[test]
    fn empty_side_is_an_error() {
        let config = SplitConfig {
            validation_seasons: vec![1999],
            excluded_seasons: vec![],
        };
        assert!(SeasonSplit::from_seasons(&[2000, 2001], &config).is_err());
    }
}
