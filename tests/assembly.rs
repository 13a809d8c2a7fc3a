mod common;

use mvp_moneyball::assemble::{AssembleOptions, LabelSource, assemble};
use mvp_moneyball::clean::{LabelPolicy, clean};
use mvp_moneyball::error::{PipelineError, Stage};
use mvp_moneyball::records::{Conference, Position, RateScale, Stat};
use mvp_moneyball::tables::{
    RawPlayerAdvanced, RawPlayerTotals, RawTeamStanding, player_advanced_from_reader,
    player_totals_from_reader, read_records_from, team_standings_from_reader, write_records_to,
};

use common::read_fixture;

fn fixtures() -> (Vec<RawPlayerTotals>, Vec<RawPlayerAdvanced>, Vec<RawTeamStanding>) {
    let totals = player_totals_from_reader(read_fixture("player_totals_sample.csv").as_bytes())
        .expect("totals fixture should load");
    let advanced =
        player_advanced_from_reader(read_fixture("player_advanced_sample.csv").as_bytes())
            .expect("advanced fixture should load");
    let standings =
        team_standings_from_reader(read_fixture("team_standings_sample.csv").as_bytes())
            .expect("standings fixture should load");
    (totals, advanced, standings)
}

#[test]
fn every_input_row_is_accounted_for() {
    let (totals, advanced, standings) = fixtures();
    let (records, summary) =
        assemble(&totals, &advanced, &standings, &AssembleOptions::default()).unwrap();

    assert_eq!(summary.totals_rows, 10);
    assert_eq!(summary.league_average_skipped, 1);
    assert_eq!(summary.missing_season, 1);
    assert_eq!(summary.before_first_season, 1);
    assert_eq!(summary.multi_team_skipped, 1);
    assert_eq!(summary.merged_stints, 1);
    assert_eq!(summary.unmatched_team, 1);
    assert_eq!(summary.missing_advanced, 1);
    assert_eq!(summary.output_rows, 4);
    assert_eq!(records.len(), 4);

    let keys: Vec<(i32, &str, &str)> = records
        .iter()
        .map(|r| (r.season, r.player.as_str(), r.team.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            (1984, "Larry Bird*", "BOS"),
            (1984, "Magic Johnson", "LAL"),
            (1988, "Mark Aguirre", "DAL"),
            (2023, "Nikola Jokić", "DEN"),
        ]
    );
}

#[test]
fn traded_player_keeps_the_stint_with_most_games() {
    let (totals, advanced, standings) = fixtures();
    let (records, _) =
        assemble(&totals, &advanced, &standings, &AssembleOptions::default()).unwrap();
    let aguirre = records.iter().find(|r| r.player == "Mark Aguirre").unwrap();
    assert_eq!(aguirre.team, "DAL");
    assert_eq!(aguirre.stints, 2);
    assert_eq!(aguirre.stat(Stat::GamesPlayed), Some(44.0));
    assert_eq!(aguirre.stat(Stat::UsagePct), Some(30.1));
    assert_eq!(aguirre.conference, Some(Conference::West));
    assert_eq!(aguirre.win_pct, Some(0.646));
}

#[test]
fn first_season_boundary_is_inclusive() {
    let (totals, advanced, standings) = fixtures();
    let options = AssembleOptions {
        first_season: 1984,
        ..AssembleOptions::default()
    };
    let (records, summary) = assemble(&totals, &advanced, &standings, &options).unwrap();
    assert!(records.iter().any(|r| r.season == 1984));
    assert_eq!(summary.before_first_season, 1);

    let options = AssembleOptions {
        first_season: 1985,
        ..AssembleOptions::default()
    };
    let (records, summary) = assemble(&totals, &advanced, &standings, &options).unwrap();
    assert!(records.iter().all(|r| r.season >= 1985));
    // Bird, Magic and the unmatched guard all fall before 1985 now.
    assert_eq!(summary.before_first_season, 4);
}

#[test]
fn label_source_picks_the_target_column() {
    let (totals, advanced, standings) = fixtures();
    let flag = assemble(&totals, &advanced, &standings, &AssembleOptions::default())
        .unwrap()
        .0;
    assert_eq!(flag[0].label, Some(1.0));

    let options = AssembleOptions {
        label: LabelSource::VoteShare,
        ..AssembleOptions::default()
    };
    let share = assemble(&totals, &advanced, &standings, &options).unwrap().0;
    assert_eq!(share[0].label, Some(0.978));
    assert_eq!(share[2].label, None);
}

#[test]
fn duplicate_standings_row_is_an_integrity_error() {
    let (totals, advanced, mut standings) = fixtures();
    standings.push(standings[0].clone());
    let err = assemble(&totals, &advanced, &standings, &AssembleOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DataIntegrity {
            stage: Stage::Assemble,
            ..
        }
    ));
}

#[test]
fn missing_required_column_fails_the_load() {
    let csv = "player_name,team\nLarry Bird,BOS\n";
    let err = player_totals_from_reader(csv.as_bytes()).unwrap_err();
    assert!(matches!(err, PipelineError::DataIntegrity { stage: Stage::Load, .. }));
}

#[test]
fn merged_table_survives_a_file_round_trip() {
    let (totals, advanced, standings) = fixtures();
    let (records, _) =
        assemble(&totals, &advanced, &standings, &AssembleOptions::default()).unwrap();
    let mut buf = Vec::new();
    write_records_to(&mut buf, &records).unwrap();
    let back = read_records_from(buf.as_slice(), Stage::Clean).unwrap();
    assert_eq!(back, records);
}

#[test]
fn cleaning_assembled_rows_fills_every_gap_once() {
    let (totals, advanced, standings) = fixtures();
    let (records, _) =
        assemble(&totals, &advanced, &standings, &AssembleOptions::default()).unwrap();
    let (cleaned, summary) = clean(records, LabelPolicy::Require).unwrap();
    assert_eq!(summary.dropped_missing_label, 0);
    assert!(summary.rescaled_rows > 0);

    let bird = &cleaned[0];
    assert_eq!(bird.player, "Larry Bird");
    assert_eq!(bird.rate_scale, RateScale::Fraction);
    assert_eq!(bird.stat(Stat::UsagePct), Some(0.294));
    assert_eq!(bird.stat(Stat::GamesStarted), Some(0.0));
    assert!(cleaned.iter().all(|r| r.stats.missing().next().is_none()));

    let magic = cleaned.iter().find(|r| r.player == "Magic Johnson").unwrap();
    assert_eq!(magic.position, Some(Position::PG));

    let jokic = cleaned.iter().find(|r| r.season == 2023).unwrap();
    assert_eq!(jokic.player, "Nikola Jokic");
    // No three-point attempts recorded means no percentage either.
    assert_eq!(jokic.stat(Stat::ThreePointPct), Some(0.0));

    let (again, second) = clean(cleaned.clone(), LabelPolicy::Require).unwrap();
    assert_eq!(again, cleaned);
    assert_eq!(second.rescaled_rows, 0);
    assert!(second.imputed.is_empty());
}
