use std::cmp::Ordering;

use serde::Serialize;

use crate::error::{PipelineError, Result, Stage};
use crate::features::RowKey;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPlayer {
    /// 1-based.
    pub rank: usize,
    pub player: String,
    pub team: String,
    pub score: f64,
    pub label: Option<f64>,
}

/// Every player of one season ordered by score, highest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonRanking {
    pub season: i32,
    pub entries: Vec<RankedPlayer>,
}

fn entry_order(a: &RankedPlayer, b: &RankedPlayer) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.player.cmp(&b.player))
        .then_with(|| a.team.cmp(&b.team))
}

impl SeasonRanking {
    /// Ranks the rows of `season`. `keys`, `scores` and `labels` are
    /// parallel; rows of other seasons are ignored.
    pub fn from_scores(
        season: i32,
        keys: &[RowKey],
        scores: &[f64],
        labels: &[Option<f64>],
    ) -> Result<SeasonRanking> {
        if keys.len() != scores.len() || keys.len() != labels.len() {
            return Err(PipelineError::integrity(
                Stage::Predict,
                format!(
                    "{} rows, {} scores and {} labels cannot be ranked together",
                    keys.len(),
                    scores.len(),
                    labels.len()
                ),
            ));
        }
        let mut entries: Vec<RankedPlayer> = keys
            .iter()
            .zip(scores)
            .zip(labels)
            .filter(|((key, _), _)| key.season == season)
            .map(|((key, score), label)| RankedPlayer {
                rank: 0,
                player: key.player.clone(),
                team: key.team.clone(),
                score: *score,
                label: *label,
            })
            .collect();
        if entries.is_empty() {
            return Err(PipelineError::integrity(
                Stage::Predict,
                format!("season {season} has no rows to rank"),
            ));
        }
        entries.sort_by(entry_order);
        for (idx, entry) in entries.iter_mut().enumerate() {
            entry.rank = idx + 1;
        }
        Ok(SeasonRanking { season, entries })
    }

    /// Rankings for every season present in `keys`, oldest first.
    pub fn all_seasons(
        keys: &[RowKey],
        scores: &[f64],
        labels: &[Option<f64>],
    ) -> Result<Vec<SeasonRanking>> {
        let mut seasons: Vec<i32> = keys.iter().map(|k| k.season).collect();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
            .into_iter()
            .map(|s| SeasonRanking::from_scores(s, keys, scores, labels))
            .collect()
    }

    pub fn top(&self, n: usize) -> &[RankedPlayer] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// The season's award winner: highest positive label, ties by name.
    pub fn actual_mvp(&self) -> Option<&RankedPlayer> {
        self.entries
            .iter()
            .filter(|e| e.label.is_some_and(|l| l > 0.0))
            .min_by(|a, b| {
                let (la, lb) = (a.label.unwrap_or(0.0), b.label.unwrap_or(0.0));
                lb.total_cmp(&la).then_with(|| a.player.cmp(&b.player))
            })
    }

    pub fn rank_of(&self, player: &str) -> Option<usize> {
        self.entries.iter().find(|e| e.player == player).map(|e| e.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(player: &str, season: i32, team: &str) -> RowKey {
        RowKey {
            player: player.to_string(),
            season,
            team: team.to_string(),
        }
    }

    #[test]
    fn ties_break_on_name_then_team() {
        let keys = vec![
            key("Zed", 2000, "AAA"),
            key("Amy", 2000, "BBB"),
            key("Amy", 2001, "AAA"),
            key("Bob", 2000, "AAA"),
        ];
        let scores = vec![0.5, 0.5, 0.9, 0.7];
        let labels = vec![Some(0.0), Some(1.0), Some(0.0), Some(0.0)];
        let ranking = SeasonRanking::from_scores(2000, &keys, &scores, &labels).unwrap();
        let names: Vec<&str> = ranking.entries.iter().map(|e| e.player.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Amy", "Zed"]);
        assert_eq!(ranking.entries.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(ranking.actual_mvp().map(|e| e.rank), Some(2));
    }

    #[test]
    fn missing_season_is_an_error() {
        let keys = vec![key("Amy", 2000, "AAA")];
        assert!(SeasonRanking::from_scores(1999, &keys, &[0.1], &[None]).is_err());
    }
}
