#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use mvp_moneyball::booster::BoosterConfig;
use mvp_moneyball::config::DataPaths;
use mvp_moneyball::records::{Conference, PlayerSeasonRecord, Position, RateScale, Stat, StatKind};

pub const PLAYERS_PER_SEASON: usize = 12;
pub const TEAMS: [&str; 4] = ["BOS", "LAL", "CHI", "DEN"];

pub fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

pub fn player_name(idx: usize) -> String {
    format!("Player {idx:02}")
}

/// Player 00 is the season's MVP and leads every volume stat; the rest are
/// spread evenly below him.
pub fn quality(idx: usize) -> f64 {
    if idx == 0 {
        2.0
    } else {
        idx as f64 / (PLAYERS_PER_SEASON as f64 + 1.0)
    }
}

fn team_of(idx: usize) -> &'static str {
    TEAMS[idx % TEAMS.len()]
}

fn team_conference(team: &str) -> Conference {
    match team {
        "BOS" | "CHI" => Conference::East,
        _ => Conference::West,
    }
}

fn team_win_pct(team: &str) -> f64 {
    match team {
        "BOS" => 0.720,
        "LAL" => 0.650,
        "CHI" => 0.480,
        _ => 0.390,
    }
}

fn position_of(idx: usize) -> Position {
    Position::ALL[(idx + 1) % Position::ALL.len()]
}

fn age_of(idx: usize) -> f64 {
    // Player 00 sits in the middle of the age range.
    22.0 + ((idx * 7 + 5) % 13) as f64
}

fn stat_value(stat: Stat, q: f64) -> f64 {
    let scale = (stat.index() + 1) as f64;
    match stat {
        Stat::GamesPlayed => 40.0 + 20.0 * q,
        _ => match stat.kind() {
            StatKind::Counting => (scale * 15.0 * q).round(),
            StatKind::Shooting { .. } => 0.35 + 0.05 * q,
            StatKind::PercentRate => 5.0 + 10.0 * q,
            StatKind::Advanced => scale * 0.1 * q,
        },
    }
}

/// A record in the shape the cleaner leaves behind.
pub fn cleaned_record(idx: usize, season: i32, label: Option<f64>) -> PlayerSeasonRecord {
    let team = team_of(idx);
    let q = quality(idx);
    let mut rec = PlayerSeasonRecord::new(&player_name(idx), season, team);
    rec.position = Some(position_of(idx));
    rec.age = Some(age_of(idx));
    rec.conference = Some(team_conference(team));
    rec.win_pct = Some(team_win_pct(team));
    for stat in Stat::ALL {
        let mut value = stat_value(stat, q);
        if stat.kind() == StatKind::PercentRate {
            value /= 100.0;
        }
        rec.stats.set(stat, Some(value));
    }
    rec.rate_scale = RateScale::Fraction;
    rec.label = label;
    rec
}

pub fn synthetic_season(season: i32) -> Vec<PlayerSeasonRecord> {
    (0..PLAYERS_PER_SEASON)
        .map(|idx| cleaned_record(idx, season, Some(if idx == 0 { 1.0 } else { 0.0 })))
        .collect()
}

pub fn synthetic_seasons(seasons: &[i32]) -> Vec<PlayerSeasonRecord> {
    seasons.iter().flat_map(|s| synthetic_season(*s)).collect()
}

/// Small, fast and fully deterministic.
pub fn quick_booster() -> BoosterConfig {
    BoosterConfig {
        n_estimators: 40,
        learning_rate: 0.3,
        max_depth: 3,
        early_stopping_rounds: None,
        ..BoosterConfig::default()
    }
}

/// Writes the three raw exports for `labeled` seasons plus one unlabeled
/// `current` season, in the scraper's column naming.
pub fn write_raw_exports(dir: &Path, labeled: &[i32], current: Option<i32>) -> DataPaths {
    let mut totals = String::from(
        "player_name,age,team,position,game_played,minutes_played,field_goal_made,\
         field_goal_attempts,field_goal_percentage,three_points_made,three_points_attempts,\
         three_points_percentage,two_points_made,two_points_attempts,two_points_percentage,\
         effective_fg_percentage,free_throws_made,free_throws_attempts,free_throws_percentage,\
         offensive_rebonds,defensive_rebonds,total_rebonds,assists,steals,blocks,turnovers,\
         personal_fouls,total_points,triple_double,is_MVP,season_year\n",
    );
    let mut advanced = String::from(
        "player_name,team,season_year,efficiency_rating,true_shooting_%,3pt_attempt_rate,\
         FT_attempt_rate,off_reb_%,def_reb_%,total_reb_%,assist_%,steal_%,blk_%,turnover_%,\
         usage_%,off_win_shares,def_win_shares,total_win_shares,ws_per_48,off_box_+/-,\
         def_box_+/-,box_+/-,value_over_replacement\n",
    );
    let mut standings = String::from("team,conf,win_pct,season_year\n");

    let seasons = labeled
        .iter()
        .map(|s| (*s, true))
        .chain(current.map(|s| (s, false)));
    for (season, has_label) in seasons {
        for idx in 0..PLAYERS_PER_SEASON {
            let q = quality(idx);
            let v = |stat: Stat| stat_value(stat, q);
            let label = if !has_label {
                String::new()
            } else if idx == 0 {
                "1".to_string()
            } else {
                "0".to_string()
            };
            let _ = writeln!(
                totals,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                player_name(idx),
                age_of(idx),
                team_of(idx),
                position_of(idx).code(),
                v(Stat::GamesPlayed),
                v(Stat::MinutesPlayed),
                v(Stat::FieldGoalsMade),
                v(Stat::FieldGoalAttempts),
                v(Stat::FieldGoalPct),
                v(Stat::ThreePointersMade),
                v(Stat::ThreePointAttempts),
                v(Stat::ThreePointPct),
                v(Stat::TwoPointersMade),
                v(Stat::TwoPointAttempts),
                v(Stat::TwoPointPct),
                v(Stat::EffectiveFgPct),
                v(Stat::FreeThrowsMade),
                v(Stat::FreeThrowAttempts),
                v(Stat::FreeThrowPct),
                v(Stat::OffensiveRebounds),
                v(Stat::DefensiveRebounds),
                v(Stat::TotalRebounds),
                v(Stat::Assists),
                v(Stat::Steals),
                v(Stat::Blocks),
                v(Stat::Turnovers),
                v(Stat::PersonalFouls),
                v(Stat::Points),
                v(Stat::TripleDoubles),
                label,
                season,
            );
            let _ = writeln!(
                advanced,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                player_name(idx),
                team_of(idx),
                season,
                v(Stat::EfficiencyRating),
                v(Stat::TrueShootingPct),
                v(Stat::ThreePointAttemptRate),
                v(Stat::FreeThrowAttemptRate),
                v(Stat::OffensiveReboundPct),
                v(Stat::DefensiveReboundPct),
                v(Stat::TotalReboundPct),
                v(Stat::AssistPct),
                v(Stat::StealPct),
                v(Stat::BlockPct),
                v(Stat::TurnoverPct),
                v(Stat::UsagePct),
                v(Stat::OffensiveWinShares),
                v(Stat::DefensiveWinShares),
                v(Stat::WinShares),
                v(Stat::WinSharesPer48),
                v(Stat::OffensiveBoxPlusMinus),
                v(Stat::DefensiveBoxPlusMinus),
                v(Stat::BoxPlusMinus),
                v(Stat::ValueOverReplacement),
            );
        }
        for team in TEAMS {
            let conf = match team_conference(team) {
                Conference::East => "East",
                Conference::West => "West",
            };
            let _ = writeln!(standings, "{team},{conf},{},{season}", team_win_pct(team));
        }
    }

    let paths = DataPaths {
        player_totals: dir.join("player_totals.csv"),
        player_advanced: dir.join("player_advanced.csv"),
        team_standings: dir.join("team_standings.csv"),
        output_dir: dir.join("output"),
    };
    fs::write(&paths.player_totals, totals).expect("write totals");
    fs::write(&paths.player_advanced, advanced).expect("write advanced");
    fs::write(&paths.team_standings, standings).expect("write standings");
    paths
}
