use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{PipelineError, Result, Stage};
use crate::records::{Conference, PlayerSeasonRecord, Position, RateScale, Stat};

pub const SCHEMA_VERSION: u32 = 1;

/// Where a feature column's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSource {
    PositionFlag(Position),
    Age,
    Conference,
    TeamStanding,
    Stat(Stat),
    /// Season total divided by games played; zero without games.
    PerGame(Stat),
    UsageTimesWinPct,
}

/// Column order of schema version 1.
pub const FEATURES: &[(&str, FeatureSource)] = &[
    ("position_c", FeatureSource::PositionFlag(Position::C)),
    ("position_pf", FeatureSource::PositionFlag(Position::PF)),
    ("position_pg", FeatureSource::PositionFlag(Position::PG)),
    ("position_sf", FeatureSource::PositionFlag(Position::SF)),
    ("position_sg", FeatureSource::PositionFlag(Position::SG)),
    ("age", FeatureSource::Age),
    ("conference", FeatureSource::Conference),
    ("team_standing", FeatureSource::TeamStanding),
    ("games_played", FeatureSource::Stat(Stat::GamesPlayed)),
    // shooting
    ("field_goal_attempts", FeatureSource::Stat(Stat::FieldGoalAttempts)),
    ("field_goal_pct", FeatureSource::Stat(Stat::FieldGoalPct)),
    ("three_point_attempts", FeatureSource::Stat(Stat::ThreePointAttempts)),
    ("three_point_pct", FeatureSource::Stat(Stat::ThreePointPct)),
    ("two_point_pct", FeatureSource::Stat(Stat::TwoPointPct)),
    ("free_throw_attempts", FeatureSource::Stat(Stat::FreeThrowAttempts)),
    ("free_throw_pct", FeatureSource::Stat(Stat::FreeThrowPct)),
    // totals
    ("total_rebounds", FeatureSource::Stat(Stat::TotalRebounds)),
    ("assists", FeatureSource::Stat(Stat::Assists)),
    ("steals", FeatureSource::Stat(Stat::Steals)),
    ("blocks", FeatureSource::Stat(Stat::Blocks)),
    ("turnovers", FeatureSource::Stat(Stat::Turnovers)),
    ("points", FeatureSource::Stat(Stat::Points)),
    ("triple_doubles", FeatureSource::Stat(Stat::TripleDoubles)),
    // advanced
    ("true_shooting_pct", FeatureSource::Stat(Stat::TrueShootingPct)),
    ("three_point_attempt_rate", FeatureSource::Stat(Stat::ThreePointAttemptRate)),
    ("free_throw_attempt_rate", FeatureSource::Stat(Stat::FreeThrowAttemptRate)),
    ("offensive_rebound_pct", FeatureSource::Stat(Stat::OffensiveReboundPct)),
    ("defensive_rebound_pct", FeatureSource::Stat(Stat::DefensiveReboundPct)),
    ("total_rebound_pct", FeatureSource::Stat(Stat::TotalReboundPct)),
    ("assist_pct", FeatureSource::Stat(Stat::AssistPct)),
    ("steal_pct", FeatureSource::Stat(Stat::StealPct)),
    ("block_pct", FeatureSource::Stat(Stat::BlockPct)),
    ("turnover_pct", FeatureSource::Stat(Stat::TurnoverPct)),
    ("usage_pct", FeatureSource::Stat(Stat::UsagePct)),
    ("win_shares", FeatureSource::Stat(Stat::WinShares)),
    ("win_shares_per_48", FeatureSource::Stat(Stat::WinSharesPer48)),
    ("defensive_box_plus_minus", FeatureSource::Stat(Stat::DefensiveBoxPlusMinus)),
    ("box_plus_minus", FeatureSource::Stat(Stat::BoxPlusMinus)),
    ("value_over_replacement", FeatureSource::Stat(Stat::ValueOverReplacement)),
    // per game
    ("field_goals_made_per_game", FeatureSource::PerGame(Stat::FieldGoalsMade)),
    ("field_goal_attempts_per_game", FeatureSource::PerGame(Stat::FieldGoalAttempts)),
    ("three_pointers_made_per_game", FeatureSource::PerGame(Stat::ThreePointersMade)),
    ("three_point_attempts_per_game", FeatureSource::PerGame(Stat::ThreePointAttempts)),
    ("two_pointers_made_per_game", FeatureSource::PerGame(Stat::TwoPointersMade)),
    ("two_point_attempts_per_game", FeatureSource::PerGame(Stat::TwoPointAttempts)),
    ("free_throws_made_per_game", FeatureSource::PerGame(Stat::FreeThrowsMade)),
    ("free_throw_attempts_per_game", FeatureSource::PerGame(Stat::FreeThrowAttempts)),
    ("offensive_rebounds_per_game", FeatureSource::PerGame(Stat::OffensiveRebounds)),
    ("defensive_rebounds_per_game", FeatureSource::PerGame(Stat::DefensiveRebounds)),
    ("total_rebounds_per_game", FeatureSource::PerGame(Stat::TotalRebounds)),
    ("assists_per_game", FeatureSource::PerGame(Stat::Assists)),
    ("steals_per_game", FeatureSource::PerGame(Stat::Steals)),
    ("blocks_per_game", FeatureSource::PerGame(Stat::Blocks)),
    ("turnovers_per_game", FeatureSource::PerGame(Stat::Turnovers)),
    ("personal_fouls_per_game", FeatureSource::PerGame(Stat::PersonalFouls)),
    ("points_per_game", FeatureSource::PerGame(Stat::Points)),
    ("minutes_per_game", FeatureSource::PerGame(Stat::MinutesPlayed)),
    ("usage_x_win_pct", FeatureSource::UsageTimesWinPct),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub columns: Vec<String>,
}

impl FeatureSchema {
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            columns: FEATURES.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// SHA-256 over the version and the ordered column names.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("v{}", self.version).as_bytes());
        for column in &self.columns {
            hasher.update(b"\n");
            hasher.update(column.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub player: String,
    pub season: i32,
    pub team: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<f64>),
    /// Only produced when a persisted matrix holds non-numeric cells.
    Text(Vec<String>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, rows: &[usize]) -> ColumnValues {
        match self {
            ColumnValues::Numeric(v) => ColumnValues::Numeric(rows.iter().map(|&i| v[i]).collect()),
            ColumnValues::Text(v) => ColumnValues::Text(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }

    fn cell(&self, row: usize) -> String {
        match self {
            ColumnValues::Numeric(v) => v[row].to_string(),
            ColumnValues::Text(v) => v[row].clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

/// Column-major feature table keyed by (player, season).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    schema: FeatureSchema,
    keys: Vec<RowKey>,
    columns: Vec<Column>,
    labels: Vec<Option<f64>>,
}

impl FeatureMatrix {
    pub fn from_parts(
        schema: FeatureSchema,
        keys: Vec<RowKey>,
        columns: Vec<Column>,
        labels: Vec<Option<f64>>,
    ) -> Result<Self> {
        let stage = Stage::Features;
        if columns.len() != schema.len()
            || columns.iter().zip(&schema.columns).any(|(c, name)| &c.name != name)
        {
            return Err(PipelineError::integrity(
                stage,
                "feature columns do not follow the schema order",
            ));
        }
        if labels.len() != keys.len() {
            return Err(PipelineError::integrity(
                stage,
                format!("{} labels for {} rows", labels.len(), keys.len()),
            ));
        }
        if let Some(col) = columns.iter().find(|c| c.values.len() != keys.len()) {
            return Err(PipelineError::integrity(
                stage,
                format!(
                    "column '{}' has {} values for {} rows",
                    col.name,
                    col.values.len(),
                    keys.len()
                ),
            ));
        }
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert((key.player.as_str(), key.season)) {
                return Err(PipelineError::integrity(
                    stage,
                    format!("duplicate row for {} in season {}", key.player, key.season),
                ));
            }
        }
        Ok(Self {
            schema,
            keys,
            columns,
            labels,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn labels(&self) -> &[Option<f64>] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Replaces one column's values, keeping every other invariant.
    pub fn with_column(mut self, name: &str, values: ColumnValues) -> Result<Self> {
        let Some(idx) = self.schema.index_of(name) else {
            return Err(PipelineError::integrity(
                Stage::Features,
                format!("no feature named '{name}'"),
            ));
        };
        self.columns[idx].values = values;
        Self::from_parts(self.schema, self.keys, self.columns, self.labels)
    }

    /// Borrowed numeric columns in schema order. Text columns and non-finite
    /// values are rejected.
    pub fn numeric_columns(&self, stage: Stage) -> Result<Vec<&[f64]>> {
        let mut out = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            match &col.values {
                ColumnValues::Numeric(values) => {
                    if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                        let key = &self.keys[row];
                        return Err(PipelineError::integrity(
                            stage,
                            format!(
                                "column '{}' is not finite for {} (season {})",
                                col.name, key.player, key.season
                            ),
                        ));
                    }
                    out.push(values.as_slice());
                }
                ColumnValues::Text(_) => {
                    return Err(PipelineError::integrity(
                        stage,
                        format!("column '{}' is not numeric", col.name),
                    ));
                }
            }
        }
        Ok(out)
    }

    /// Row-major copy of the numeric values.
    pub fn rows(&self, stage: Stage) -> Result<Vec<Vec<f64>>> {
        let columns = self.numeric_columns(stage)?;
        Ok((0..self.len())
            .map(|row| columns.iter().map(|col| col[row]).collect())
            .collect())
    }

    /// Every label, or the first unlabeled row as an error.
    pub fn required_labels(&self, stage: Stage) -> Result<Vec<f64>> {
        self.labels
            .iter()
            .zip(&self.keys)
            .map(|(label, key)| {
                label.ok_or_else(|| PipelineError::missing_label(stage, &key.player, key.season))
            })
            .collect()
    }

    pub fn seasons(&self) -> Vec<i32> {
        self.keys
            .iter()
            .map(|k| k.season)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn select_rows(&self, rows: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            schema: self.schema.clone(),
            keys: rows.iter().map(|&i| self.keys[i].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values.select(rows),
                })
                .collect(),
            labels: rows.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    pub fn filter_seasons<F>(&self, mut keep: F) -> FeatureMatrix
    where
        F: FnMut(i32) -> bool,
    {
        let rows: Vec<usize> = (0..self.len()).filter(|&i| keep(self.keys[i].season)).collect();
        self.select_rows(&rows)
    }

    pub fn season_slice(&self, season: i32) -> FeatureMatrix {
        self.filter_seasons(|s| s == season)
    }

    pub fn write_csv_to<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        let mut header = vec![
            "player".to_string(),
            "season".to_string(),
            "team".to_string(),
            "label".to_string(),
        ];
        header.extend(self.schema.columns.iter().cloned());
        out.write_record(&header)?;
        for (row, key) in self.keys.iter().enumerate() {
            let mut record = vec![
                key.player.clone(),
                key.season.to_string(),
                key.team.clone(),
                self.labels[row].map(|v| v.to_string()).unwrap_or_default(),
            ];
            record.extend(self.columns.iter().map(|c| c.values.cell(row)));
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        self.write_csv_to(file).map_err(|e| PipelineError::csv(path, e))
    }

    /// Loads a persisted matrix. The header must match `schema`; a column
    /// with any non-numeric cell is kept as text.
    pub fn read_csv_from<R: Read>(rdr: R, schema: &FeatureSchema) -> Result<FeatureMatrix> {
        let stage = Stage::Features;
        let mut reader = csv::Reader::from_reader(rdr);
        let headers = reader
            .headers()
            .map_err(|e| PipelineError::integrity(stage, e.to_string()))?
            .clone();
        let expected: Vec<&str> = ["player", "season", "team", "label"]
            .into_iter()
            .chain(schema.columns.iter().map(String::as_str))
            .collect();
        if headers.len() != expected.len() || headers.iter().zip(&expected).any(|(a, b)| a != *b) {
            return Err(PipelineError::integrity(
                stage,
                format!(
                    "feature file header does not match schema v{} ({} columns expected)",
                    schema.version,
                    schema.len()
                ),
            ));
        }

        let mut keys = Vec::new();
        let mut labels = Vec::new();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); schema.len()];
        for (idx, row) in reader.records().enumerate() {
            let line = idx + 2;
            let row = row.map_err(|e| PipelineError::integrity(stage, e.to_string()))?;
            let cell = |i: usize| row.get(i).unwrap_or("").trim();
            let season = cell(1).parse::<i32>().map_err(|_| {
                PipelineError::integrity(stage, format!("line {line}: invalid season '{}'", cell(1)))
            })?;
            keys.push(RowKey {
                player: cell(0).to_string(),
                season,
                team: cell(2).to_string(),
            });
            let label = match cell(3) {
                "" => None,
                text => Some(text.parse::<f64>().map_err(|_| {
                    PipelineError::integrity(stage, format!("line {line}: invalid label '{text}'"))
                })?),
            };
            if let Some(value) = label
                && (!value.is_finite() || value < 0.0)
            {
                return Err(PipelineError::integrity(
                    stage,
                    format!(
                        "line {line}: label {value} for {} ({season}) must be a non-negative number",
                        cell(0)
                    ),
                ));
            }
            labels.push(label);
            for (col, values) in raw.iter_mut().enumerate() {
                values.push(cell(4 + col).to_string());
            }
        }

        let columns = schema
            .columns
            .iter()
            .zip(raw)
            .map(|(name, cells)| {
                let parsed: Option<Vec<f64>> =
                    cells.iter().map(|c| c.parse::<f64>().ok()).collect();
                let values = match parsed {
                    Some(numbers) => ColumnValues::Numeric(numbers),
                    None => ColumnValues::Text(cells),
                };
                Column {
                    name: name.clone(),
                    values,
                }
            })
            .collect();
        FeatureMatrix::from_parts(schema.clone(), keys, columns, labels)
    }

    pub fn read_csv(path: &Path, schema: &FeatureSchema) -> Result<FeatureMatrix> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        Self::read_csv_from(file, schema)
    }
}

/// Turns cleaned records into the model's feature matrix.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    schema: FeatureSchema,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self {
            schema: FeatureSchema::current(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn build(&self, records: &[PlayerSeasonRecord]) -> Result<FeatureMatrix> {
        let mut order: Vec<&PlayerSeasonRecord> = records.iter().collect();
        order.sort_by(|a, b| {
            a.season
                .cmp(&b.season)
                .then_with(|| a.player.cmp(&b.player))
                .then_with(|| a.team.cmp(&b.team))
        });
        for rec in &order {
            check_cleaned(rec)?;
        }

        let standings = team_standings(&order);
        let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(order.len()); FEATURES.len()];
        for (row, rec) in order.iter().enumerate() {
            for (col, (_, source)) in FEATURES.iter().enumerate() {
                values[col].push(feature_value(rec, *source, standings[row]));
            }
        }

        let keys = order
            .iter()
            .map(|r| RowKey {
                player: r.player.clone(),
                season: r.season,
                team: r.team.clone(),
            })
            .collect();
        let labels = order.iter().map(|r| r.label).collect();
        let columns = FEATURES
            .iter()
            .zip(values)
            .map(|((name, _), v)| Column {
                name: name.to_string(),
                values: ColumnValues::Numeric(v),
            })
            .collect();

        let matrix = FeatureMatrix::from_parts(self.schema.clone(), keys, columns, labels)?;
        info!(
            rows = matrix.len(),
            features = self.schema.len(),
            seasons = matrix.seasons().len(),
            "built feature matrix"
        );
        Ok(matrix)
    }
}

fn check_cleaned(rec: &PlayerSeasonRecord) -> Result<()> {
    let missing = if rec.conference.is_none() {
        Some("conference".to_string())
    } else if rec.win_pct.is_none() {
        Some("win_pct".to_string())
    } else if rec.age.is_none() {
        Some("age".to_string())
    } else if rec.rate_scale != RateScale::Fraction {
        Some("rate scale".to_string())
    } else {
        rec.stats.missing().next().map(|s| s.name().to_string())
    };
    match missing {
        Some(field) => Err(PipelineError::integrity(
            Stage::Features,
            format!(
                "{} (season {}) has no cleaned '{field}'; run the cleaner first",
                rec.player, rec.season
            ),
        )),
        None => Ok(()),
    }
}

/// Dense rank of team win percentage within (season, conference), best = 1.
fn team_standings(rows: &[&PlayerSeasonRecord]) -> Vec<f64> {
    let mut distinct: BTreeMap<(i32, Conference), Vec<f64>> = BTreeMap::new();
    for rec in rows {
        if let (Some(conf), Some(win_pct)) = (rec.conference, rec.win_pct) {
            distinct.entry((rec.season, conf)).or_default().push(win_pct);
        }
    }
    for pcts in distinct.values_mut() {
        pcts.sort_by(|a, b| b.total_cmp(a));
        pcts.dedup();
    }
    rows.iter()
        .map(|rec| {
            let (Some(conf), Some(win_pct)) = (rec.conference, rec.win_pct) else {
                return 0.0;
            };
            distinct
                .get(&(rec.season, conf))
                .and_then(|pcts| pcts.iter().position(|p| *p == win_pct))
                .map(|idx| (idx + 1) as f64)
                .unwrap_or(0.0)
        })
        .collect()
}

fn feature_value(rec: &PlayerSeasonRecord, source: FeatureSource, standing: f64) -> f64 {
    match source {
        FeatureSource::PositionFlag(pos) => {
            if rec.position == Some(pos) {
                1.0
            } else {
                0.0
            }
        }
        FeatureSource::Age => rec.age.unwrap_or(0.0),
        FeatureSource::Conference => rec.conference.map(Conference::as_feature).unwrap_or(0.0),
        FeatureSource::TeamStanding => standing,
        FeatureSource::Stat(stat) => rec.stats.value(stat),
        FeatureSource::PerGame(stat) => {
            let games = rec.stats.value(Stat::GamesPlayed);
            if games > 0.0 {
                rec.stats.value(stat) / games
            } else {
                0.0
            }
        }
        FeatureSource::UsageTimesWinPct => {
            rec.stats.value(Stat::UsagePct) * rec.win_pct.unwrap_or(0.0)
        }
    }
}
