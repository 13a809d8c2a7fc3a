use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::assemble::consolidate_stints;
use crate::error::{PipelineError, Result, Stage};
use crate::names::normalize_player_name;
use crate::records::{PlayerSeasonRecord, RateScale, Stat, StatKind};

/// What to do with rows that have no label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPolicy {
    /// Training data: unlabeled rows are dropped.
    Require,
    /// Prediction seasons: unlabeled rows stay.
    Allow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanSummary {
    pub input_rows: usize,
    pub merged_stints: usize,
    pub dropped_missing_label: usize,
    pub zeroed_counting: usize,
    pub zeroed_shooting: usize,
    pub rescaled_rows: usize,
    /// Cells filled with the column median, per column.
    pub imputed: BTreeMap<String, usize>,
    pub output_rows: usize,
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Median of the finite values, averaging the middle pair for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Normalizes, fills and rescales assembled records so every numeric field
/// the feature builder reads is present. Running it on its own output
/// changes nothing.
pub fn clean(
    records: Vec<PlayerSeasonRecord>,
    policy: LabelPolicy,
) -> Result<(Vec<PlayerSeasonRecord>, CleanSummary)> {
    let mut summary = CleanSummary {
        input_rows: records.len(),
        ..CleanSummary::default()
    };

    let renamed: Vec<PlayerSeasonRecord> = records
        .into_iter()
        .map(|mut rec| {
            rec.player = normalize_player_name(&rec.player);
            rec
        })
        .collect();

    let (merged, folded) = consolidate_stints(renamed);
    summary.merged_stints = folded;

    let mut rows = Vec::with_capacity(merged.len());
    for rec in merged {
        match rec.label {
            Some(label) if !label.is_finite() || label < 0.0 => {
                return Err(PipelineError::integrity(
                    Stage::Clean,
                    format!(
                        "invalid label {label} for {} (season {})",
                        rec.player, rec.season
                    ),
                ));
            }
            None if policy == LabelPolicy::Require => {
                summary.dropped_missing_label += 1;
                debug!(player = rec.player.as_str(), season = rec.season, "dropping unlabeled row");
            }
            _ => rows.push(rec),
        }
    }

    for rec in &mut rows {
        fill_counting(rec, &mut summary);
        zero_empty_shooting(rec, &mut summary);
        rescale_rates(rec, &mut summary);
    }
    impute_medians(&mut rows, &mut summary);

    summary.output_rows = rows.len();
    info!(
        rows = summary.output_rows,
        dropped_missing_label = summary.dropped_missing_label,
        imputed_columns = summary.imputed.len(),
        "cleaned player seasons"
    );
    Ok((rows, summary))
}

fn fill_counting(rec: &mut PlayerSeasonRecord, summary: &mut CleanSummary) {
    for stat in Stat::ALL {
        if stat.kind() == StatKind::Counting && rec.stat(stat).is_none() {
            rec.stats.set(stat, Some(0.0));
            summary.zeroed_counting += 1;
        }
    }
}

fn zero_empty_shooting(rec: &mut PlayerSeasonRecord, summary: &mut CleanSummary) {
    for stat in Stat::ALL {
        if let StatKind::Shooting { attempts } = stat.kind()
            && rec.stats.value(attempts) == 0.0
            && rec.stat(stat) != Some(0.0)
        {
            rec.stats.set(stat, Some(0.0));
            summary.zeroed_shooting += 1;
        }
    }
}

fn rescale_rates(rec: &mut PlayerSeasonRecord, summary: &mut CleanSummary) {
    if rec.rate_scale == RateScale::Fraction {
        return;
    }
    for stat in Stat::ALL {
        if stat.kind() == StatKind::PercentRate
            && let Some(value) = rec.stat(stat)
        {
            rec.stats.set(stat, Some(round4(value / 100.0)));
        }
    }
    rec.rate_scale = RateScale::Fraction;
    summary.rescaled_rows += 1;
}

/// Medians are pooled over every row passed in, all seasons together,
/// including an unlabeled prediction season.
fn impute_medians(rows: &mut [PlayerSeasonRecord], summary: &mut CleanSummary) {
    for stat in Stat::ALL {
        let present: Vec<f64> = rows.iter().filter_map(|r| r.stat(stat)).collect();
        if present.len() == rows.len() {
            continue;
        }
        let fill = median(&present).unwrap_or(0.0);
        let mut filled = 0usize;
        for rec in rows.iter_mut().filter(|r| r.stat(stat).is_none()) {
            rec.stats.set(stat, Some(fill));
            filled += 1;
        }
        summary.imputed.insert(stat.name().to_string(), filled);
    }

    let ages: Vec<f64> = rows.iter().filter_map(|r| r.age).collect();
    if ages.len() < rows.len() {
        let fill = median(&ages).unwrap_or(0.0);
        let missing = rows.iter().filter(|r| r.age.is_none()).count();
        for rec in rows.iter_mut() {
            rec.age.get_or_insert(fill);
        }
        summary.imputed.insert("age".to_string(), missing);
    }

    let win_pcts: Vec<f64> = rows.iter().filter_map(|r| r.win_pct).collect();
    if win_pcts.len() < rows.len() {
        let fill = median(&win_pcts).unwrap_or(0.0);
        let missing = rows.iter().filter(|r| r.win_pct.is_none()).count();
        for rec in rows.iter_mut() {
            rec.win_pct.get_or_insert(fill);
        }
        summary.imputed.insert("win_pct".to_string(), missing);
    }
}
