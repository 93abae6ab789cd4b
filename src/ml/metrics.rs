//! Evaluation metrics for the binary engagement classifier.

use serde::{Deserialize, Serialize};

/// Confusion counts at a fixed probability threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryConfusion {
    pub true_positive: u32,
    pub false_positive: u32,
    pub true_negative: u32,
    pub false_negative: u32,
}

impl BinaryConfusion {
    /// Tally predictions `prob >= threshold` against 0/1 labels.
    pub fn from_probabilities(probs: &[f64], labels: &[u8], threshold: f64) -> Self {
        let mut cm = Self::default();
        for (&prob, &label) in probs.iter().zip(labels) {
            let predicted = prob >= threshold;
            match (label == 1, predicted) {
                (true, true) => cm.true_positive = cm.true_positive.saturating_add(1),
                (false, true) => cm.false_positive = cm.false_positive.saturating_add(1),
                (false, false) => cm.true_negative = cm.true_negative.saturating_add(1),
                (true, false) => cm.false_negative = cm.false_negative.saturating_add(1),
            }
        }
        cm
    }

    pub fn total(&self) -> u32 {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// Fraction of correctly classified rows.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            f64::from(self.true_positive + self.true_negative) / f64::from(total)
        }
    }

    /// `TP / (TP + FP)`.
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    /// `TP / (TP + FN)`.
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }
}

fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.0
    } else {
        f64::from(num) / f64::from(den)
    }
}

/// Area under the ROC curve.
///
/// Computed from average ranks (Mann-Whitney U), so tied scores count half.
/// Returns `None` when either class is absent.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    if scores.len() != labels.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&label| label == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0f64;
    let mut start = 0usize;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; ties share the mean of their positions.
        let avg_rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            if labels[idx] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        start = end;
    }

    let p = positives as f64;
    let n = negatives as f64;
    let auc = (rank_sum_pos - p * (p + 1.0) / 2.0) / (p * n);
    auc.is_finite().then_some(auc)
}

/// Round to a fixed number of decimal places for reporting.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
