//! Model fitting and evaluation for the engagement classifier.
//!
//! The solver and metrics are implemented directly over `ndarray` views so fits are
//! deterministic and carry no native ML runtime.

pub mod cross_val;
mod fit;
pub mod logreg;
pub mod metrics;

pub use fit::{CV_FOLDS, CV_MIN_SAMPLES, ModelFitResult, fit};
