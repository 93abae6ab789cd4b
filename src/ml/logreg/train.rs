use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::lbfgs::{self, LbfgsOptions};
use super::{LogisticModel, log1p_exp, sigmoid};

/// How per-class loss contributions are scaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeighting {
    /// Weight each class by `n_samples / (2 * class_count)`.
    #[default]
    Balanced,
    /// Every sample counts once.
    Uniform,
    /// Explicit per-class weights.
    Fixed { negative: f64, positive: f64 },
}

impl ClassWeighting {
    /// Resolve `[negative, positive]` weights for the given labels.
    pub fn class_weights(&self, y: &[u8]) -> [f64; 2] {
        match *self {
            Self::Uniform => [1.0, 1.0],
            Self::Fixed { negative, positive } => [negative, positive],
            Self::Balanced => {
                let positive = y.iter().filter(|&&label| label == 1).count() as f64;
                let negative = y.len() as f64 - positive;
                let total = y.len() as f64;
                let weight = |count: f64| {
                    if count == 0.0 {
                        0.0
                    } else {
                        total / (2.0 * count)
                    }
                };
                [weight(negative), weight(positive)]
            }
        }
    }
}

/// Training hyperparameters for the engagement classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Inverse L2 regularization strength.
    pub c: f64,
    pub class_weighting: ClassWeighting,
    pub solver: LbfgsOptions,
    /// Seed for every randomized step (fold assignment during cross-validation).
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            c: 1.0,
            class_weighting: ClassWeighting::Balanced,
            solver: LbfgsOptions::default(),
            seed: 42,
        }
    }
}

#[derive(Debug, Error)]
pub enum FitError {
    #[error("Empty training set")]
    Empty,
    #[error("Mismatched training inputs/labels: {rows} rows, {labels} labels")]
    Mismatched { rows: usize, labels: usize },
    #[error("Training labels contain a single class")]
    SingleClass,
    #[error("Invalid regularization strength C={0} (must be > 0)")]
    InvalidRegularization(f64),
    #[error("Invalid class weights {negative}/{positive} (must be finite and > 0)")]
    InvalidClassWeights { negative: f64, positive: f64 },
    #[error("Objective became non-finite at iteration {iteration}")]
    NonFinite { iteration: usize },
}

/// A trained model together with solver diagnostics.
#[derive(Debug, Clone)]
pub struct FittedLogReg {
    pub model: LogisticModel,
    pub iterations: usize,
    pub converged: bool,
    /// Final value of the normalized objective.
    pub loss: f64,
}

/// Fit an L2-regularized binary logistic regression with L-BFGS.
///
/// The objective is normalized by the total sample weight:
/// `sum_i s_i * logloss_i / S + ||w||^2 / (2 * C * S)`, which has the same minimizer
/// as the unnormalized form and keeps the gradient tolerance independent of `n`.
/// The intercept is not penalized.
pub fn train_logreg(
    x: ArrayView2<'_, f64>,
    y: &[u8],
    options: &TrainOptions,
) -> Result<FittedLogReg, FitError> {
    let (rows, dim) = x.dim();
    if rows == 0 || y.is_empty() {
        return Err(FitError::Empty);
    }
    if rows != y.len() {
        return Err(FitError::Mismatched {
            rows,
            labels: y.len(),
        });
    }
    let positive = y.iter().filter(|&&label| label == 1).count();
    if positive == 0 || positive == rows {
        return Err(FitError::SingleClass);
    }
    if !options.c.is_finite() || options.c <= 0.0 {
        return Err(FitError::InvalidRegularization(options.c));
    }
    let [neg_weight, pos_weight] = options.class_weighting.class_weights(y);
    if !(neg_weight.is_finite() && pos_weight.is_finite() && neg_weight > 0.0 && pos_weight > 0.0)
    {
        return Err(FitError::InvalidClassWeights {
            negative: neg_weight,
            positive: pos_weight,
        });
    }

    let targets: Array1<f64> = y.iter().map(|&label| f64::from(label)).collect();
    let sample_weights: Array1<f64> = y
        .iter()
        .map(|&label| if label == 1 { pos_weight } else { neg_weight })
        .collect();
    let total_weight = sample_weights.sum();
    let penalty = 1.0 / (options.c * total_weight);

    let objective = |theta: &[f64], grad: &mut [f64]| -> f64 {
        let weights = ArrayView1::from(&theta[..dim]);
        let bias = theta[dim];
        let z = x.dot(&weights) + bias;

        let mut loss = 0.0;
        let mut residual = Array1::<f64>::zeros(rows);
        for i in 0..rows {
            let zi = z[i];
            loss += sample_weights[i] * (log1p_exp(zi) - targets[i] * zi);
            residual[i] = sample_weights[i] * (sigmoid(zi) - targets[i]);
        }

        let grad_w = x.t().dot(&residual);
        let mut reg = 0.0;
        for j in 0..dim {
            reg += theta[j] * theta[j];
            grad[j] = grad_w[j] / total_weight + penalty * theta[j];
        }
        grad[dim] = residual.sum() / total_weight;
        loss / total_weight + 0.5 * penalty * reg
    };

    let outcome = lbfgs::minimize(objective, vec![0.0; dim + 1], &options.solver)?;
    if outcome.converged {
        tracing::debug!(
            "L-BFGS converged after {} iterations (loss {:.6})",
            outcome.iterations,
            outcome.value
        );
    } else {
        tracing::warn!(
            "L-BFGS stopped after {} iterations without reaching tolerance (loss {:.6})",
            outcome.iterations,
            outcome.value
        );
    }

    let mut theta = outcome.x;
    let bias = theta.pop().unwrap_or_default();
    Ok(FittedLogReg {
        model: LogisticModel {
            bias,
            weights: theta,
        },
        iterations: outcome.iterations,
        converged: outcome.converged,
        loss: outcome.value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn separable() -> (Array2<f64>, Vec<u8>) {
        let mut x = Array2::<f64>::zeros((40, 2));
        let mut y = Vec::new();
        for i in 0..40 {
            let label = u8::from(i % 2 == 0);
            let offset = if label == 1 { 1.0 } else { -1.0 };
            x[[i, 0]] = offset + (i as f64 * 0.37).sin() * 0.8;
            x[[i, 1]] = (i as f64 * 1.3).cos();
            y.push(label);
        }
        (x, y)
    }

    #[test]
    fn balanced_weights_are_inverse_frequency() {
        let y = [1, 0, 0, 0];
        let [neg, pos] = ClassWeighting::Balanced.class_weights(&y);
        assert!((neg - 4.0 / 6.0).abs() < 1e-12);
        assert!((pos - 2.0).abs() < 1e-12);
        assert_eq!(ClassWeighting::Uniform.class_weights(&y), [1.0, 1.0]);
        assert_eq!(
            ClassWeighting::Fixed {
                negative: 0.5,
                positive: 3.0
            }
            .class_weights(&y),
            [0.5, 3.0]
        );
    }

    #[test]
    fn learns_the_informative_feature() {
        let (x, y) = separable();
        let fitted = train_logreg(x.view(), &y, &TrainOptions::default()).unwrap();
        assert!(fitted.converged);
        assert!(fitted.model.weights[0] > 1.0);
        assert!(fitted.model.weights[0].abs() > fitted.model.weights[1].abs());
    }

    #[test]
    fn gradient_vanishes_at_the_solution() {
        let (x, y) = separable();
        let options = TrainOptions::default();
        let fitted = train_logreg(x.view(), &y, &options).unwrap();
        // Stationarity of the regularized objective: X^T r / S + w / (C S) = 0.
        let probs = fitted.model.predict_proba_matrix(x.view());
        let total = y.len() as f64;
        let mut grad0 = 0.0;
        let mut grad_b = 0.0;
        for i in 0..y.len() {
            let r = probs[i] - f64::from(y[i]);
            grad0 += r * x[[i, 0]];
            grad_b += r;
        }
        grad0 = grad0 / total + fitted.model.weights[0] / (options.c * total);
        assert!(grad0.abs() < 1e-3, "{grad0}");
        assert!((grad_b / total).abs() < 1e-3);
    }

    #[test]
    fn fits_are_reproducible() {
        let (x, y) = separable();
        let a = train_logreg(x.view(), &y, &TrainOptions::default()).unwrap();
        let b = train_logreg(x.view(), &y, &TrainOptions::default()).unwrap();
        assert_eq!(a.model, b.model);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let x = array![[1.0], [2.0]];
        assert!(matches!(
            train_logreg(x.view(), &[1, 1], &TrainOptions::default()),
            Err(FitError::SingleClass)
        ));
        assert!(matches!(
            train_logreg(x.view(), &[1], &TrainOptions::default()),
            Err(FitError::Mismatched { rows: 2, labels: 1 })
        ));
        let options = TrainOptions {
            c: 0.0,
            ..TrainOptions::default()
        };
        assert!(matches!(
            train_logreg(x.view(), &[0, 1], &options),
            Err(FitError::InvalidRegularization(_))
        ));
    }
}
