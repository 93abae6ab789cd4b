use crate::features::LabeledDataset;

use super::cross_val::cross_validated_auc;
use super::logreg::{FitError, LogisticModel, TrainOptions, train_logreg};
use super::metrics::{BinaryConfusion, roc_auc};

/// Cross-validation only runs at or above this many samples.
pub const CV_MIN_SAMPLES: usize = 200;
/// Number of folds used for the cross-validated AUC.
pub const CV_FOLDS: usize = 5;

/// Trained model plus in-sample and (optional) cross-validated metrics.
#[derive(Debug, Clone)]
pub struct ModelFitResult {
    pub model: LogisticModel,
    /// In-sample accuracy at a 0.5 threshold.
    pub train_accuracy: f64,
    /// In-sample ROC AUC.
    pub train_auc: f64,
    /// Mean held-out AUC, absent below [`CV_MIN_SAMPLES`] or when CV fails.
    pub cv_auc: Option<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Fit the classifier on the full dataset and evaluate it.
pub fn fit(dataset: &LabeledDataset, options: &TrainOptions) -> Result<ModelFitResult, FitError> {
    let fitted = train_logreg(dataset.x.view(), &dataset.y, options)?;
    let probs = fitted.model.predict_proba_matrix(dataset.x.view()).to_vec();

    let confusion = BinaryConfusion::from_probabilities(&probs, &dataset.y, 0.5);
    let train_accuracy = confusion.accuracy();
    let train_auc = roc_auc(&probs, &dataset.y).ok_or(FitError::SingleClass)?;
    tracing::debug!(
        "in-sample precision {:.4}, recall {:.4}",
        confusion.precision(),
        confusion.recall()
    );

    let cv_auc = if dataset.len() >= CV_MIN_SAMPLES {
        match cross_validated_auc(dataset.x.view(), &dataset.y, CV_FOLDS, options) {
            Ok(score) if score.is_finite() => Some(score),
            Ok(score) => {
                tracing::warn!("Cross-validated AUC was not finite ({score}); reporting none");
                None
            }
            Err(err) => {
                tracing::warn!("Cross-validation failed; reporting none: {err}");
                None
            }
        }
    } else {
        None
    };

    Ok(ModelFitResult {
        model: fitted.model,
        train_accuracy,
        train_auc,
        cv_auc,
        iterations: fitted.iterations,
        converged: fitted.converged,
    })
}
