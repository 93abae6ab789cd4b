//! Stratified k-fold cross-validation scored by ROC AUC.

use ndarray::{ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use super::logreg::{FitError, TrainOptions, train_logreg};
use super::metrics::roc_auc;

#[derive(Debug, Error)]
pub enum CrossValError {
    #[error("Need at least 2 folds (got {0})")]
    TooFewFolds(usize),
    #[error("Class with {count} samples cannot fill {folds} folds")]
    ClassTooSmall { count: usize, folds: usize },
    #[error("Fold {fold} failed to train: {source}")]
    Fit {
        fold: usize,
        #[source]
        source: FitError,
    },
    #[error("Fold {fold} has an undefined AUC")]
    UndefinedScore { fold: usize },
}

/// Assign every row to one of `k` folds, keeping the class ratio per fold.
///
/// Rows of each class are shuffled with the seeded RNG and dealt round-robin, so the
/// same labels and seed always produce the same folds.
pub fn stratified_folds(labels: &[u8], k: usize, seed: u64) -> Result<Vec<Vec<usize>>, CrossValError> {
    if k < 2 {
        return Err(CrossValError::TooFewFolds(k));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); k];
    let mut next_fold = 0usize;
    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(idx, _)| idx)
            .collect();
        if members.len() < k {
            return Err(CrossValError::ClassTooSmall {
                count: members.len(),
                folds: k,
            });
        }
        members.shuffle(&mut rng);
        for idx in members {
            folds[next_fold].push(idx);
            next_fold = (next_fold + 1) % k;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Mean held-out AUC over stratified folds.
pub fn cross_validated_auc(
    x: ArrayView2<'_, f64>,
    y: &[u8],
    k: usize,
    options: &TrainOptions,
) -> Result<f64, CrossValError> {
    let folds = stratified_folds(y, k, options.seed)?;
    let mut in_test = vec![usize::MAX; y.len()];
    for (fold_idx, fold) in folds.iter().enumerate() {
        for &row in fold {
            in_test[row] = fold_idx;
        }
    }

    let mut scores = Vec::with_capacity(k);
    for (fold_idx, test_rows) in folds.iter().enumerate() {
        let train_rows: Vec<usize> = (0..y.len()).filter(|&row| in_test[row] != fold_idx).collect();
        let train_x = x.select(Axis(0), &train_rows);
        let train_y: Vec<u8> = train_rows.iter().map(|&row| y[row]).collect();
        let fitted = train_logreg(train_x.view(), &train_y, options).map_err(|source| {
            CrossValError::Fit {
                fold: fold_idx,
                source,
            }
        })?;

        let test_x = x.select(Axis(0), test_rows);
        let test_y: Vec<u8> = test_rows.iter().map(|&row| y[row]).collect();
        let probs = fitted.model.predict_proba_matrix(test_x.view());
        let score = roc_auc(&probs.to_vec(), &test_y)
            .ok_or(CrossValError::UndefinedScore { fold: fold_idx })?;
        tracing::debug!("cv fold {fold_idx}: auc {score:.4}");
        scores.push(score);
    }

    Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn folds_partition_rows_and_keep_ratio() {
        let labels: Vec<u8> = (0..100).map(|i| u8::from(i % 4 == 0)).collect();
        let folds = stratified_folds(&labels, 5, 42).unwrap();
        let mut seen: Vec<usize> = folds.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
        for fold in &folds {
            assert_eq!(fold.len(), 20);
            let positives = fold.iter().filter(|&&row| labels[row] == 1).count();
            assert_eq!(positives, 5);
        }
    }

    #[test]
    fn folds_are_seeded() {
        let labels: Vec<u8> = (0..50).map(|i| u8::from(i % 2 == 0)).collect();
        let a = stratified_folds(&labels, 5, 7).unwrap();
        let b = stratified_folds(&labels, 5, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_classes_smaller_than_fold_count() {
        let labels = [1, 1, 1, 0, 0, 0, 0, 0];
        assert!(matches!(
            stratified_folds(&labels, 5, 42),
            Err(CrossValError::ClassTooSmall { count: 3, folds: 5 })
        ));
        assert!(matches!(
            stratified_folds(&labels, 1, 42),
            Err(CrossValError::TooFewFolds(1))
        ));
    }

    #[test]
    fn informative_feature_scores_well_out_of_sample() {
        let n = 200;
        let mut x = Array2::<f64>::zeros((n, 2));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let label = u8::from(i % 2 == 1);
            x[[i, 0]] = f64::from(label) * 1.5 + (i as f64 * 0.91).sin();
            x[[i, 1]] = (i as f64 * 2.3).cos();
            y.push(label);
        }
        let auc = cross_validated_auc(x.view(), &y, 5, &TrainOptions::default()).unwrap();
        assert!((0.0..=1.0).contains(&auc));
        assert!(auc > 0.7, "{auc}");
    }
}
