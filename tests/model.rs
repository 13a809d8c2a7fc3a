mod common;

use std::fs;

use mvp_moneyball::booster::BoosterConfig;
use mvp_moneyball::error::{PipelineError, Stage};
use mvp_moneyball::features::{FeatureBuilder, FeatureMatrix};
use mvp_moneyball::scorer::{ARTIFACT_VERSION, Scorer, ScorerArtifact};

use common::{cleaned_record, quick_booster, synthetic_season, synthetic_seasons};

fn training_matrix() -> FeatureMatrix {
    FeatureBuilder::new()
        .build(&synthetic_seasons(&[2001, 2002]))
        .unwrap()
}

#[test]
fn artifact_round_trip_scores_identically() {
    let train = training_matrix();
    let scorer = Scorer::train(&train, None, &quick_booster()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("mvp_gbm_model_test.json");
    scorer.save(&path).unwrap();
    assert!(!path.with_extension("json.tmp").exists());

    let loaded = Scorer::load(&path).unwrap();
    assert_eq!(loaded, scorer);
    assert_eq!(loaded.score(&train).unwrap(), scorer.score(&train).unwrap());
    assert_eq!(loaded.summary().seasons, vec![2001, 2002]);
}

#[test]
fn attributions_add_up_to_the_score() {
    let train = training_matrix();
    let scorer = Scorer::train(&train, None, &quick_booster()).unwrap();
    let scores = scorer.score(&train).unwrap();
    let shap = scorer.attributions(&train).unwrap();
    for (row, phi) in shap.iter().enumerate() {
        let total: f64 = scorer.expected_value() + phi.iter().sum::<f64>();
        assert!(
            (total - scores[row]).abs() < 1e-9,
            "row {row}: {total} vs {}",
            scores[row]
        );
    }
}

#[test]
fn tampered_fingerprint_is_refused() {
    let scorer = Scorer::train(&training_matrix(), None, &quick_booster()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    scorer.save(&path).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    let mut artifact: ScorerArtifact = serde_json::from_str(&raw).unwrap();
    artifact.schema_fingerprint = "0".repeat(64);
    fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();

    let err = Scorer::load(&path).unwrap_err();
    assert!(matches!(err, PipelineError::DataIntegrity { .. }));
}

#[test]
fn unknown_artifact_version_is_a_model_state_error() {
    let scorer = Scorer::train(&training_matrix(), None, &quick_booster()).unwrap();
    let mut artifact = scorer.to_artifact();
    artifact.version = ARTIFACT_VERSION + 1;
    let err = Scorer::from_artifact(artifact, std::path::Path::new("model.json")).unwrap_err();
    assert!(matches!(err, PipelineError::ModelState { .. }));
}

#[test]
fn matrix_with_a_different_schema_is_refused() {
    let train = training_matrix();
    let scorer = Scorer::train(&train, None, &quick_booster()).unwrap();

    let mut artifact = scorer.to_artifact();
    artifact.schema.version += 1;
    artifact.schema_fingerprint = artifact.schema.fingerprint();
    let other = Scorer::from_artifact(artifact, std::path::Path::new("model.json")).unwrap();

    let err = other.score(&train).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DataIntegrity {
            stage: Stage::Predict,
            ..
        }
    ));
}

#[test]
fn unlabeled_training_row_names_the_player() {
    let mut records = synthetic_season(2001);
    records.push(cleaned_record(20, 2001, None));
    let matrix = FeatureBuilder::new().build(&records).unwrap();
    let err = Scorer::train(&matrix, None, &quick_booster()).unwrap_err();
    match err {
        PipelineError::MissingLabel {
            stage,
            player,
            season,
        } => {
            assert_eq!(stage, Stage::Train);
            assert_eq!(player, "Player 20");
            assert_eq!(season, 2001);
        }
        other => panic!("expected MissingLabel, got {other:?}"),
    }
}

#[test]
fn importance_is_normalized_and_sorted() {
    let scorer = Scorer::train(&training_matrix(), None, &quick_booster()).unwrap();
    let importance = scorer.feature_importance();
    let total: f64 = importance.iter().map(|(_, g)| g).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(importance.windows(2).all(|w| w[0].1 >= w[1].1));
}

#[test]
fn eval_set_without_early_stopping_keeps_all_trees() {
    let train = FeatureBuilder::new()
        .build(&synthetic_seasons(&[2001, 2002, 2003]))
        .unwrap();
    let eval = FeatureBuilder::new()
        .build(&synthetic_seasons(&[2005]))
        .unwrap();
    let config = BoosterConfig {
        n_estimators: 200,
        ..quick_booster()
    };
    assert_eq!(config.early_stopping_rounds, None);
    let scorer = Scorer::train(&train, Some(&eval), &config).unwrap();
    assert_eq!(scorer.model().trees.len(), 200);
    assert_eq!(scorer.summary().best_iteration, None);
}
