use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::{PipelineError, Result};
use crate::evaluate::{CorrelatedPair, EvaluationReport};
use crate::ranking::SeasonRanking;
use crate::scorer::TrainingSummary;

const BAR_WIDTH: usize = 40;
const CHART_FEATURES: usize = 20;

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Plain-text evaluation report.
pub fn render_text(report: &EvaluationReport, training: Option<&TrainingSummary>) -> String {
    let mut out = String::new();
    let m = &report.metrics;
    let _ = writeln!(out, "MVP model evaluation");
    let _ = writeln!(out, "====================");
    if let Some(t) = training {
        let _ = writeln!(
            out,
            "training rows {} over {} seasons, {} trees (best iteration {}), train RMSE {:.4}",
            t.rows,
            t.seasons.len(),
            t.trees,
            t.best_iteration
                .map(|b| b.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
            t.train_rmse
        );
        if let (Some(eval), Some(base)) = (t.eval_rmse, t.baseline_eval_rmse) {
            let _ = writeln!(out, "eval RMSE {eval:.4} vs constant baseline {base:.4}");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{:<10} {:>10}", "metric", "value");
    let _ = writeln!(out, "{:<10} {:>10}", "rows", m.samples);
    let _ = writeln!(out, "{:<10} {:>10.4}", "MAE", m.mae);
    let _ = writeln!(out, "{:<10} {:>10.4}", "RMSE", m.rmse);
    let _ = writeln!(out, "{:<10} {:>10.4}", "R2", m.r2);
    let _ = writeln!(out, "{:<10} {:>10}", "ROC AUC", fmt_opt(m.auc, 4));
    let _ = writeln!(out);

    for season in &report.seasons {
        let _ = writeln!(out, "Top {} candidates, season {}", season.top.len(), season.season);
        for entry in &season.top {
            let marker = if season.mvp.as_deref() == Some(entry.player.as_str()) {
                "  <- MVP"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "  {:>2}. {:<28} {:<4} {:.4}{marker}",
                entry.rank, entry.player, entry.team, entry.score
            );
        }
        if !season.mvp_in_top()
            && let (Some(name), Some(rank), Some(score)) =
                (&season.mvp, season.mvp_rank, season.mvp_score)
        {
            let _ = writeln!(out, "  actual MVP {name} ranked {rank} with score {score:.4}");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(
        out,
        "Mean rank of the actual MVP over {} recent seasons: {}",
        report.recent_seasons.len(),
        fmt_opt(report.mean_recent_mvp_rank, 2)
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Feature attribution (mean |SHAP|)");
    let ranked = report.ranked_attributions();
    let max = ranked.first().map(|a| a.mean_abs_shap).unwrap_or(0.0);
    for attr in ranked.iter().take(CHART_FEATURES) {
        let width = if max > 0.0 {
            ((attr.mean_abs_shap / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "  {:<30} {:<width_pad$} {:.5} (gain {:.3})",
            attr.feature,
            "#".repeat(width),
            attr.mean_abs_shap,
            attr.gain,
            width_pad = BAR_WIDTH
        );
    }
    let _ = writeln!(out);

    if report.correlated_pairs.is_empty() {
        let _ = writeln!(out, "No highly correlated feature pairs.");
    } else {
        let _ = writeln!(out, "Correlated feature pairs");
        let _ = writeln!(
            out,
            "  {:<30} {:<30} {:>7}  consider removing",
            "feature a", "feature b", "r"
        );
        for pair in &report.correlated_pairs {
            let _ = writeln!(
                out,
                "  {:<30} {:<30} {:>7.3}  {}",
                pair.feature_a, pair.feature_b, pair.correlation, pair.remove
            );
        }
    }
    out
}

/// Short listing used by `predict`.
pub fn render_ranking(ranking: &SeasonRanking, top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MVP likelihood, season {}", ranking.season);
    for entry in ranking.top(top) {
        let _ = writeln!(
            out,
            "  {:>3}. {:<28} {:<4} {:.4}",
            entry.rank, entry.player, entry.team, entry.score
        );
    }
    out
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    Ok(())
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, text).map_err(|e| PipelineError::io(path, e))
}

pub fn write_rankings_to<W: Write>(writer: W, rankings: &[SeasonRanking]) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["season", "player", "team", "score", "rank"])?;
    for ranking in rankings {
        for e in &ranking.entries {
            out.write_record([
                ranking.season.to_string(),
                e.player.clone(),
                e.team.clone(),
                e.score.to_string(),
                e.rank.to_string(),
            ])?;
        }
    }
    out.flush()?;
    Ok(())
}

pub fn write_rankings_csv(path: &Path, rankings: &[SeasonRanking]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    write_rankings_to(file, rankings).map_err(|e| PipelineError::csv(path, e))
}

pub fn write_redundancy_to<W: Write>(writer: W, pairs: &[CorrelatedPair]) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
        "feature_a",
        "feature_b",
        "correlation",
        "attribution_a",
        "attribution_b",
        "keep",
        "remove",
    ])?;
    for p in pairs {
        out.write_record([
            p.feature_a.clone(),
            p.feature_b.clone(),
            p.correlation.to_string(),
            p.attribution_a.to_string(),
            p.attribution_b.to_string(),
            p.keep.clone(),
            p.remove.clone(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_redundancy_csv(path: &Path, pairs: &[CorrelatedPair]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    write_redundancy_to(file, pairs).map_err(|e| PipelineError::csv(path, e))
}

/// One workbook cell. Numbers are stored as numbers so the sheets sort.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

fn text(value: impl Into<String>) -> Cell {
    Cell::Text(value.into())
}

fn number(value: impl Into<f64>) -> Cell {
    Cell::Number(value.into())
}

fn opt_number(value: Option<f64>) -> Cell {
    value.map_or(Cell::Empty, Cell::Number)
}

fn header(cols: &[&str]) -> Vec<Cell> {
    cols.iter().map(|c| text(*c)).collect()
}

type Sheet = (&'static str, Vec<Vec<Cell>>);

pub(crate) fn workbook_sheets(report: &EvaluationReport) -> Vec<Sheet> {
    let m = &report.metrics;
    let metrics_rows = vec![
        header(&["Metric", "Value"]),
        vec![text("Rows"), number(m.samples as f64)],
        vec![text("MAE"), number(m.mae)],
        vec![text("RMSE"), number(m.rmse)],
        vec![text("R2"), number(m.r2)],
        vec![text("ROC AUC"), opt_number(m.auc)],
        vec![
            text("Mean recent MVP rank"),
            opt_number(report.mean_recent_mvp_rank),
        ],
    ];

    let mut top_rows = vec![header(&["Season", "Rank", "Player", "Team", "Score", "MVP"])];
    for season in &report.seasons {
        for e in &season.top {
            let is_mvp = season.mvp.as_deref() == Some(e.player.as_str());
            top_rows.push(vec![
                number(season.season),
                number(e.rank as f64),
                text(e.player.as_str()),
                text(e.team.as_str()),
                number(e.score),
                if is_mvp { text("yes") } else { Cell::Empty },
            ]);
        }
    }

    let mut attribution_rows = vec![header(&["Feature", "Mean |SHAP|", "Gain"])];
    for a in report.ranked_attributions() {
        attribution_rows.push(vec![
            text(a.feature.as_str()),
            number(a.mean_abs_shap),
            number(a.gain),
        ]);
    }

    let mut redundancy_rows = vec![header(&[
        "Feature A",
        "Feature B",
        "Correlation",
        "Attribution A",
        "Attribution B",
        "Keep",
        "Consider removing",
    ])];
    for p in &report.correlated_pairs {
        redundancy_rows.push(vec![
            text(p.feature_a.as_str()),
            text(p.feature_b.as_str()),
            number(p.correlation),
            number(p.attribution_a),
            number(p.attribution_b),
            text(p.keep.as_str()),
            text(p.remove.as_str()),
        ]);
    }

    let mut ranking_rows = vec![header(&["Season", "Rank", "Player", "Team", "Score"])];
    for ranking in &report.rankings {
        for e in &ranking.entries {
            ranking_rows.push(vec![
                number(ranking.season),
                number(e.rank as f64),
                text(e.player.as_str()),
                text(e.team.as_str()),
                number(e.score),
            ]);
        }
    }

    vec![
        ("Metrics", metrics_rows),
        ("TopCandidates", top_rows),
        ("Attribution", attribution_rows),
        ("Redundancy", redundancy_rows),
        ("Rankings", ranking_rows),
    ]
}

/// Workbook with one sheet per report section.
pub fn export_workbook(path: &Path, report: &EvaluationReport) -> Result<()> {
    ensure_parent(path)?;
    let mut workbook = Workbook::new();
    for (name, rows) in workbook_sheets(report) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        write_cells(sheet, &rows)?;
    }
    workbook.save(path)?;
    Ok(())
}

fn write_cells(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        let r = row_idx as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            let c = col_idx as u16;
            match cell {
                Cell::Text(value) => {
                    worksheet.write_string(r, c, value)?;
                }
                Cell::Number(value) if value.is_finite() => {
                    worksheet.write_number(r, c, *value)?;
                }
                Cell::Number(_) | Cell::Empty => {}
            }
        }
    }
    Ok(())
}
