//! Feature extraction from exported impression records.
//!
//! Raw rows become a fixed-order `f64` matrix and a 0/1 label vector. Column order
//! comes from the caller-supplied feature list, never from record key order, and
//! the dataset is gated on size and class balance before any training happens.

mod record;

use ndarray::Array2;
use thiserror::Error;

pub use record::TrainingRecord;
use record::{Coerced, coerce_value};

/// Column order shared by extraction, training and the persisted weights.
pub const FEATURE_NAMES: &[&str] = &[
    "ln_engagement",
    "ln_affinity",
    "is_following",
    "is_subscribed",
    "content_pref",
    "velocity_ratio",
    "ln_friend_likes",
    "inv_age",
    "has_media",
    "topic_affinity",
];

/// Minimum number of exported rows required to train.
pub const MIN_SAMPLES: usize = 50;
/// Minimum number of rows required for each label.
pub const MIN_PER_CLASS: usize = 10;

/// Value stored for `+inf` inputs.
pub const POS_INF_CLAMP: f64 = 10.0;
/// Value stored for `-inf` inputs.
pub const NEG_INF_CLAMP: f64 = -10.0;

/// Business-rule rejections raised by the data-quality gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataQualityError {
    /// Not enough rows were exported.
    #[error("Insufficient training data: {samples} samples (need >= {required})")]
    Insufficient { samples: usize, required: usize },
    /// One of the labels is underrepresented.
    #[error(
        "Imbalanced data: {positive} positive, {negative} negative (need >= {required} each)"
    )]
    Imbalanced {
        positive: usize,
        negative: usize,
        required: usize,
    },
}

impl DataQualityError {
    /// Remediation hint shown next to the error message.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Insufficient { .. } => {
                "Users need to browse the feed for a while to generate impression data. \
                 Each (user, post) impression with a known engagement label is one training sample."
            }
            Self::Imbalanced { .. } => {
                "Need more engagement events (likes/comments/bookmarks) on viewed posts."
            }
        }
    }
}

/// Feature matrix plus labels and gate counters.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    /// Column names in matrix order.
    pub feature_names: Vec<String>,
    /// Row-major `n x d` feature matrix.
    pub x: Array2<f64>,
    /// Labels aligned with `x` rows (`1` = engaged).
    pub y: Vec<u8>,
    pub positive: usize,
    pub negative: usize,
    /// Rows where at least one value could not be coerced to a number.
    pub skipped: usize,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Build the labeled dataset, enforcing the size and balance gates.
pub fn extract(
    records: &[TrainingRecord],
    feature_order: &[&str],
) -> Result<LabeledDataset, DataQualityError> {
    if records.len() < MIN_SAMPLES {
        return Err(DataQualityError::Insufficient {
            samples: records.len(),
            required: MIN_SAMPLES,
        });
    }

    let dim = feature_order.len();
    let mut x = Array2::<f64>::zeros((records.len(), dim));
    let mut y = Vec::with_capacity(records.len());
    let mut skipped = 0usize;

    for (row_idx, record) in records.iter().enumerate() {
        let mut row_failed = false;
        for (col_idx, name) in feature_order.iter().enumerate() {
            match coerce_value(record.get(name)) {
                Coerced::Value(value) => x[[row_idx, col_idx]] = value,
                Coerced::Failed => row_failed = true,
            }
        }
        if row_failed {
            skipped += 1;
        }
        y.push(u8::from(record.engaged));
    }

    x.mapv_inplace(clamp_non_finite);

    let positive = y.iter().filter(|&&label| label == 1).count();
    let negative = y.len() - positive;
    if positive < MIN_PER_CLASS || negative < MIN_PER_CLASS {
        return Err(DataQualityError::Imbalanced {
            positive,
            negative,
            required: MIN_PER_CLASS,
        });
    }

    if skipped > 0 {
        tracing::warn!("{skipped} of {} rows had unparseable feature values", y.len());
    }

    Ok(LabeledDataset {
        feature_names: feature_order.iter().map(|name| name.to_string()).collect(),
        x,
        y,
        positive,
        negative,
        skipped,
    })
}

/// Map NaN to 0 and infinities to the `±10` sentinels; finite values pass through.
pub fn clamp_non_finite(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value == f64::INFINITY {
        POS_INF_CLAMP
    } else if value == f64::NEG_INFINITY {
        NEG_INF_CLAMP
    } else {
        value
    }
}
