//! Binary logistic regression for engagement scoring.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

mod lbfgs;
mod train;

pub use lbfgs::LbfgsOptions;
pub use train::{ClassWeighting, FitError, FittedLogReg, TrainOptions, train_logreg};

/// Linear model producing `sigmoid(w . x + b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub bias: f64,
    /// One weight per feature column, in training column order.
    pub weights: Vec<f64>,
}

impl LogisticModel {
    /// Raw decision value for a single feature row.
    pub fn decision(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(row.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    /// Probability of the positive class for a single feature row.
    pub fn predict_proba(&self, row: ArrayView1<'_, f64>) -> f64 {
        sigmoid(self.decision(row))
    }

    /// Positive-class probabilities for every row of `x`.
    pub fn predict_proba_matrix(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_proba(row))
            .collect()
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + exp(z))` without overflow for large `|z|`.
pub(crate) fn log1p_exp(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}
