mod common;

use mvp_moneyball::config::PipelineConfig;
use mvp_moneyball::error::{PipelineError, Stage};
use mvp_moneyball::features::{FeatureBuilder, FeatureMatrix, FeatureSchema};
use mvp_moneyball::pipeline::{FEATURES_PREFIX, MODEL_PREFIX, Pipeline};
use mvp_moneyball::predict::Predictor;
use mvp_moneyball::scorer::Scorer;
use mvp_moneyball::split::{SeasonSplit, SplitConfig};

use common::{player_name, quick_booster, synthetic_seasons, write_raw_exports};

fn config_for(dir: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        data: write_raw_exports(dir, &[2001, 2002, 2003], Some(2004)),
        split: SplitConfig {
            validation_seasons: vec![2003],
            excluded_seasons: vec![2004],
        },
        booster: quick_booster(),
        ..PipelineConfig::default()
    }
}

#[test]
fn three_seasons_end_to_end_rank_the_mvp_first() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::with_stamp(config_for(dir.path()), "2024-06-01");

    let outputs = pipeline.run().unwrap();
    for path in [
        &outputs.merged,
        &outputs.cleaned,
        &outputs.features,
        &outputs.model,
        &outputs.evaluation.text,
        &outputs.evaluation.rankings,
        &outputs.evaluation.redundancy,
        &outputs.evaluation.workbook,
    ] {
        assert!(path.exists(), "{} should exist", path.display());
    }
    assert!(
        outputs
            .merged
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("01_merged_2024-06-01")
    );

    let report = &outputs.evaluation.report;
    assert_eq!(report.seasons.len(), 1);
    assert_eq!(report.seasons[0].season, 2003);
    assert_eq!(report.seasons[0].mvp.as_deref(), Some(player_name(0).as_str()));
    assert_eq!(report.seasons[0].mvp_rank, Some(1));

    let (ranking, out) = pipeline.predict(2004).unwrap();
    assert!(out.exists());
    assert_eq!(ranking.entries[0].player, player_name(0));
    assert!(ranking.entries.iter().all(|e| e.label.is_none()));
}

#[test]
fn stages_pick_up_the_newest_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let old = Pipeline::with_stamp(config.clone(), "2024-01-01");
    old.assemble().unwrap();
    old.clean().unwrap();
    old.features().unwrap();

    let new = Pipeline::with_stamp(config, "2024-02-01");
    let features = new.features().unwrap();
    assert_eq!(
        new.latest(FEATURES_PREFIX, "csv", Stage::Train).unwrap(),
        features
    );
}

#[test]
fn training_before_features_exist_is_an_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::with_stamp(config_for(dir.path()), "2024-06-01");
    std::fs::create_dir_all(&pipeline.config().data.output_dir).unwrap();
    let err = pipeline.train().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DataIntegrity {
            stage: Stage::Train,
            ..
        }
    ));
    assert!(pipeline.latest(MODEL_PREFIX, "json", Stage::Predict).is_err());
}

#[test]
fn split_never_shares_a_season() {
    let seasons: Vec<i32> = (1980..=2024).collect();
    let split = SeasonSplit::from_seasons(&seasons, &SplitConfig::default()).unwrap();
    assert!(split.is_disjoint());
    assert!(!split.train.contains(&2024) && !split.validation.contains(&2024));
    assert_eq!(split.validation.len(), 10);
    assert_eq!(split.train.len() + split.validation.len(), seasons.len() - 1);
}

#[test]
fn unloaded_predictor_refuses_to_rank() {
    let matrix = FeatureBuilder::new().build(&synthetic_seasons(&[2001])).unwrap();
    let predictor = Predictor::unloaded();
    assert!(!predictor.is_loaded());
    let err = predictor.predict_season(&matrix, 2001).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ModelState {
            stage: Stage::Predict,
            ..
        }
    ));
}

#[test]
fn predictor_rejects_absent_season() {
    let matrix = FeatureBuilder::new()
        .build(&synthetic_seasons(&[2001, 2002]))
        .unwrap();
    let scorer = Scorer::train(&matrix, None, &quick_booster()).unwrap();
    let predictor = Predictor::from_scorer(scorer);
    let err = predictor.predict_season(&matrix, 1999).unwrap_err();
    assert!(matches!(err, PipelineError::DataIntegrity { .. }));

    let all = predictor.predict_all(&matrix).unwrap();
    assert_eq!(all.iter().map(|r| r.season).collect::<Vec<_>>(), vec![2001, 2002]);
}

#[test]
fn predictor_matches_training_schema_only() {
    let matrix = FeatureBuilder::new().build(&synthetic_seasons(&[2001])).unwrap();
    let scorer = Scorer::train(&matrix, None, &quick_booster()).unwrap();
    let predictor = Predictor::from_scorer(scorer);

    let mut other = FeatureSchema::current();
    other.version += 1;
    let mut buf = Vec::new();
    matrix.write_csv_to(&mut buf).unwrap();
    let relabeled = FeatureMatrix::read_csv_from(buf.as_slice(), &other).unwrap();
    let err = predictor.predict_season(&relabeled, 2001).unwrap_err();
    assert!(matches!(err, PipelineError::DataIntegrity { .. }));
}

#[test]
fn repeated_prediction_is_identical() {
    let matrix = FeatureBuilder::new()
        .build(&synthetic_seasons(&[2001, 2002]))
        .unwrap();
    let first = Predictor::from_scorer(Scorer::train(&matrix, None, &quick_booster()).unwrap());
    let second = Predictor::from_scorer(Scorer::train(&matrix, None, &quick_booster()).unwrap());
    let a = first.predict_season(&matrix, 2002).unwrap();
    assert_eq!(a, first.predict_season(&matrix, 2002).unwrap());
    assert_eq!(a, second.predict_season(&matrix, 2002).unwrap());
}
