use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub samples: usize,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    /// ROC AUC of the scores against the season-MVP flag.
    pub auc: Option<f64>,
}

impl RegressionMetrics {
    fn empty() -> Self {
        Self {
            samples: 0,
            mae: 0.0,
            rmse: 0.0,
            r2: 0.0,
            auc: None,
        }
    }
}

/// MAE, RMSE and R² of `predictions` against `labels`.
///
/// R² is 1 when the residuals and the label variance are both zero and 0
/// when only the variance is.
pub fn regression_metrics(predictions: &[f64], labels: &[f64]) -> RegressionMetrics {
    if predictions.is_empty() || predictions.len() != labels.len() {
        return RegressionMetrics::empty();
    }
    let n = labels.len() as f64;
    let mean = labels.iter().sum::<f64>() / n;

    let mut abs_sum = 0.0_f64;
    let mut sq_sum = 0.0_f64;
    let mut total_sq = 0.0_f64;
    for (p, y) in predictions.iter().zip(labels) {
        abs_sum += (p - y).abs();
        sq_sum += (p - y).powi(2);
        total_sq += (y - mean).powi(2);
    }

    let r2 = if total_sq == 0.0 {
        if sq_sum == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - sq_sum / total_sq
    };

    RegressionMetrics {
        samples: labels.len(),
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        r2,
        auc: None,
    }
}

/// Mann-Whitney AUC with average ranks for tied scores. `None` when either
/// class is empty.
pub fn roc_auc(scores: &[f64], positive: &[bool]) -> Option<f64> {
    if scores.len() != positive.len() {
        return None;
    }
    let n_pos = positive.iter().filter(|p| **p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; a tie block shares its average.
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(positive)
        .filter(|(_, p)| **p)
        .map(|(r, _)| r)
        .sum();
    let n_pos = n_pos as f64;
    let u = pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Some(u / (n_pos * n_neg as f64))
}

/// Pearson correlation; `None` when either side is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0_f64;
    let mut var_a = 0.0_f64;
    let mut var_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let y = [0.0, 0.2, 1.0];
        let m = regression_metrics(&y, &y);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn constant_labels() {
        assert_eq!(regression_metrics(&[0.0, 0.0], &[0.0, 0.0]).r2, 1.0);
        assert_eq!(regression_metrics(&[0.1, 0.0], &[0.0, 0.0]).r2, 0.0);
    }

    #[test]
    fn auc_handles_ties_and_empty_classes() {
        assert_eq!(roc_auc(&[0.9, 0.1, 0.2], &[true, false, false]), Some(1.0));
        assert_eq!(roc_auc(&[0.5, 0.5], &[true, false]), Some(0.5));
        assert_eq!(roc_auc(&[0.5, 0.4], &[false, false]), None);
    }

    #[test]
    fn pearson_of_scaled_copy_is_one() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b: Vec<f64> = a.iter().map(|v| 3.0 * v + 1.0).collect();
        assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(pearson(&a, &[1.0; 4]), None);
    }
}
