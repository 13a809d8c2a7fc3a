use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result, Stage};
use crate::names::{
    is_league_average, is_multi_team_code, normalize_player_name, player_key, team_abbreviation,
};
use crate::records::{Conference, PlayerSeasonRecord, Position, Stat, TeamSeasonRecord};
use crate::tables::{RawPlayerAdvanced, RawPlayerTotals, RawTeamStanding};

/// Column of the totals export used as the regression target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// 1 for the award winner, 0 otherwise.
    #[default]
    MvpFlag,
    /// Share of the MVP voting points, 0..=1.
    VoteShare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleOptions {
    /// First season kept, inclusive (start year of the season).
    pub first_season: i32,
    pub label: LabelSource,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            first_season: 1980,
            label: LabelSource::MvpFlag,
        }
    }
}

/// Row accounting for one assembly run. Every input row ends up either in the
/// output or in exactly one of the skip counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssembleSummary {
    pub totals_rows: usize,
    pub advanced_rows: usize,
    pub team_rows: usize,
    pub league_average_skipped: usize,
    pub before_first_season: usize,
    pub multi_team_skipped: usize,
    pub missing_season: usize,
    pub unknown_team_names: usize,
    pub missing_advanced: usize,
    pub merged_stints: usize,
    pub unmatched_team: usize,
    pub output_rows: usize,
}

/// Index of the stint that represents a traded player's season: most games,
/// then most minutes, then the alphabetically first team.
pub fn select_primary_stint(stints: &[PlayerSeasonRecord]) -> Option<usize> {
    stints
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| primary_order(a, b))
        .map(|(idx, _)| idx)
}

fn primary_order(a: &PlayerSeasonRecord, b: &PlayerSeasonRecord) -> Ordering {
    let games = |r: &PlayerSeasonRecord| r.stat(Stat::GamesPlayed).unwrap_or(0.0);
    let minutes = |r: &PlayerSeasonRecord| r.stat(Stat::MinutesPlayed).unwrap_or(0.0);
    games(b)
        .total_cmp(&games(a))
        .then_with(|| minutes(b).total_cmp(&minutes(a)))
        .then_with(|| a.team.cmp(&b.team))
}

/// Collapses rows sharing (player, season) into the primary stint.
///
/// Returns the consolidated rows sorted by (season, player, team) and the
/// number of rows folded away. Already consolidated input is returned as is.
pub fn consolidate_stints(records: Vec<PlayerSeasonRecord>) -> (Vec<PlayerSeasonRecord>, usize) {
    let mut groups: BTreeMap<(i32, String), Vec<PlayerSeasonRecord>> = BTreeMap::new();
    for rec in records {
        groups
            .entry((rec.season, player_key(&rec.player)))
            .or_default()
            .push(rec);
    }

    let mut merged = 0usize;
    let mut out = Vec::with_capacity(groups.len());
    for (_, group) in groups {
        if group.len() == 1 {
            out.extend(group);
            continue;
        }
        merged += group.len() - 1;
        if ages_conflict(&group) {
            warn!(
                player = group[0].player.as_str(),
                season = group[0].season,
                rows = group.len(),
                "merging stints with different ages; may be two players with one name"
            );
        }
        let Some(primary_idx) = select_primary_stint(&group) else {
            continue;
        };
        let label = group
            .iter()
            .filter_map(|r| r.label)
            .max_by(|a, b| a.total_cmp(b));
        let stints = group.iter().map(|r| r.stints.max(1)).sum();
        let mut primary = group[primary_idx].clone();
        primary.stints = stints;
        primary.label = label;
        out.push(primary);
    }
    sort_records(&mut out);
    (out, merged)
}

/// Stints of one player in one season all report the same age.
fn ages_conflict(group: &[PlayerSeasonRecord]) -> bool {
    let mut ages = group.iter().filter_map(|r| r.age);
    let Some(first) = ages.next() else {
        return false;
    };
    ages.any(|age| (age - first).abs() > f64::EPSILON)
}

pub fn sort_records(records: &mut [PlayerSeasonRecord]) {
    records.sort_by(|a, b| {
        a.season
            .cmp(&b.season)
            .then_with(|| a.player.cmp(&b.player))
            .then_with(|| a.team.cmp(&b.team))
    });
}

/// Standings keyed by (team abbreviation, season).
pub fn team_table(
    standings: &[RawTeamStanding],
    summary: &mut AssembleSummary,
) -> Result<HashMap<(String, i32), TeamSeasonRecord>> {
    let mut table = HashMap::with_capacity(standings.len());
    for row in standings {
        summary.team_rows += 1;
        let Some(season) = row.season_year else {
            summary.missing_season += 1;
            continue;
        };
        let Some(team) = team_abbreviation(&row.team, season) else {
            summary.unknown_team_names += 1;
            warn!(team = row.team.as_str(), season, "unknown franchise name in standings");
            continue;
        };
        let (Some(conference), Some(win_pct)) = (Conference::parse(&row.conf), row.win_pct) else {
            summary.unknown_team_names += 1;
            warn!(team = team.as_str(), season, "standings row without conference or win pct");
            continue;
        };
        let key = (team.clone(), season);
        if table.contains_key(&key) {
            return Err(PipelineError::integrity(
                Stage::Assemble,
                format!("duplicate standings row for {team} in season {season}"),
            ));
        }
        table.insert(
            key,
            TeamSeasonRecord {
                team,
                season,
                conference,
                win_pct,
            },
        );
    }
    Ok(table)
}

fn advanced_index<'a>(
    advanced: &'a [RawPlayerAdvanced],
    options: &AssembleOptions,
    summary: &mut AssembleSummary,
) -> Result<HashMap<(String, i32, String), &'a RawPlayerAdvanced>> {
    let mut index = HashMap::with_capacity(advanced.len());
    for row in advanced {
        summary.advanced_rows += 1;
        let Some(season) = row.season_year else {
            continue;
        };
        if season < options.first_season
            || is_league_average(&row.player_name)
            || is_multi_team_code(&row.team)
        {
            continue;
        }
        let key = (player_key(&row.player_name), season, row.team.trim().to_string());
        if index.insert(key, row).is_some() {
            return Err(PipelineError::integrity(
                Stage::Assemble,
                format!(
                    "duplicate advanced stats for {} ({}, season {season})",
                    row.player_name.trim(),
                    row.team.trim()
                ),
            ));
        }
    }
    Ok(index)
}

/// Joins the three raw exports into one record per (player, season).
pub fn assemble(
    totals: &[RawPlayerTotals],
    advanced: &[RawPlayerAdvanced],
    standings: &[RawTeamStanding],
    options: &AssembleOptions,
) -> Result<(Vec<PlayerSeasonRecord>, AssembleSummary)> {
    let mut summary = AssembleSummary::default();
    let teams = team_table(standings, &mut summary)?;
    let advanced = advanced_index(advanced, options, &mut summary)?;

    let mut stints = Vec::with_capacity(totals.len());
    for row in totals {
        summary.totals_rows += 1;
        if is_league_average(&row.player_name) {
            summary.league_average_skipped += 1;
            continue;
        }
        let Some(season) = row.season_year else {
            summary.missing_season += 1;
            continue;
        };
        if season < options.first_season {
            summary.before_first_season += 1;
            continue;
        }
        if is_multi_team_code(&row.team) {
            summary.multi_team_skipped += 1;
            continue;
        }

        let player = row.player_name.trim();
        let team = row.team.trim();
        let mut rec = PlayerSeasonRecord::new(player, season, team);
        rec.position = Position::parse(&row.position);
        rec.age = row.age.filter(|v| v.is_finite());
        rec.stats = row.stat_line();
        rec.label = match options.label {
            LabelSource::MvpFlag => row.is_mvp,
            LabelSource::VoteShare => row.vote_share,
        };

        match advanced.get(&(player_key(player), season, team.to_string())) {
            Some(adv) => adv.apply_to(&mut rec.stats),
            None => {
                summary.missing_advanced += 1;
                debug!(player, season, team, "no advanced stats for stint");
            }
        }
        stints.push(rec);
    }

    let (consolidated, merged) = consolidate_stints(stints);
    summary.merged_stints = merged;

    let mut out = Vec::with_capacity(consolidated.len());
    for mut rec in consolidated {
        match teams.get(&(rec.team.clone(), rec.season)) {
            Some(team) => {
                rec.conference = Some(team.conference);
                rec.win_pct = Some(team.win_pct);
                out.push(rec);
            }
            None => {
                summary.unmatched_team += 1;
                warn!(
                    player = normalize_player_name(&rec.player).as_str(),
                    season = rec.season,
                    team = rec.team.as_str(),
                    "no standings row for team; dropping player season"
                );
            }
        }
    }
    summary.output_rows = out.len();

    info!(
        rows = summary.output_rows,
        merged_stints = summary.merged_stints,
        missing_advanced = summary.missing_advanced,
        unmatched_team = summary.unmatched_team,
        "assembled player seasons"
    );
    Ok((out, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stint(team: &str, games: f64, minutes: f64) -> PlayerSeasonRecord {
        PlayerSeasonRecord::new("Mark Aguirre", 1988, team)
            .with_stat(Stat::GamesPlayed, games)
            .with_stat(Stat::MinutesPlayed, minutes)
    }

    #[test]
    fn primary_stint_prefers_games_then_minutes_then_team() {
        let by_games = [stint("DAL", 44.0, 1500.0), stint("DET", 33.0, 1800.0)];
        assert_eq!(select_primary_stint(&by_games), Some(0));

        let by_minutes = [stint("DAL", 40.0, 1200.0), stint("DET", 40.0, 1300.0)];
        assert_eq!(select_primary_stint(&by_minutes), Some(1));

        let by_team = [stint("DET", 40.0, 1200.0), stint("DAL", 40.0, 1200.0)];
        assert_eq!(select_primary_stint(&by_team), Some(1));

        assert_eq!(select_primary_stint(&[]), None);
    }

    #[test]
    fn same_name_with_different_ages_is_flagged() {
        let mut a = stint("BOS", 60.0, 1800.0);
        let mut b = stint("LAL", 20.0, 400.0);
        assert!(!ages_conflict(&[a.clone(), b.clone()]));
        a.age = Some(24.0);
        b.age = Some(24.0);
        assert!(!ages_conflict(&[a.clone(), b.clone()]));
        b.age = Some(31.0);
        assert!(ages_conflict(&[a.clone(), b.clone()]));

        let (rows, merged) = consolidate_stints(vec![a, b]);
        assert_eq!(rows.len(), 1);
        assert_eq!(merged, 1);
        assert_eq!(rows[0].age, Some(24.0));
    }

    #[test]
    fn consolidation_counts_stints_and_keeps_max_label() {
        let mut a = stint("DAL", 44.0, 1500.0);
        a.label = Some(0.0);
        let mut b = stint("DET", 33.0, 1000.0);
        b.label = Some(0.2);
        let (out, merged) = consolidate_stints(vec![b, a]);
        assert_eq!(merged, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].team, "DAL");
        assert_eq!(out[0].stints, 2);
        assert_eq!(out[0].label, Some(0.2));

        let (again, merged_again) = consolidate_stints(out.clone());
        assert_eq!(merged_again, 0);
        assert_eq!(again, out);
    }
}
