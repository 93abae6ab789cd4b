use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::features::DataQualityError;
use crate::ml::metrics::round_to;
use crate::versioning::BIAS_FEATURE;

/// Result of a run that did not hit a fatal error.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    Trained(TrainingReport),
    Rejected(TrainingRejection),
}

impl TrainingOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, Self::Trained(_))
    }

    /// JSON body for the run result.
    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            Self::Trained(report) => serde_json::to_value(report),
            Self::Rejected(rejection) => serde_json::to_value(rejection),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Summary of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub success: bool,
    pub version: i64,
    pub activated: bool,
    pub samples: usize,
    pub positive_samples: usize,
    pub negative_samples: usize,
    pub skipped_rows: usize,
    pub train_accuracy: f64,
    pub train_auc: f64,
    pub cv_auc: Option<f64>,
    pub weights: WeightMap,
}

/// Intercept and per-feature coefficients, kept in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMap {
    pub bias: f64,
    pub features: Vec<(String, f64)>,
}

impl WeightMap {
    /// Round everything to 6 decimal places.
    pub fn rounded(bias: f64, names: &[String], weights: &[f64]) -> Self {
        Self {
            bias: round_to(bias, 6),
            features: names
                .iter()
                .zip(weights)
                .map(|(name, &weight)| (name.clone(), round_to(weight, 6)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        if name == BIAS_FEATURE {
            return Some(self.bias);
        }
        self.features
            .iter()
            .find(|(feature, _)| feature == name)
            .map(|(_, weight)| *weight)
    }

    /// Number of entries including the bias.
    pub fn entry_count(&self) -> usize {
        self.features.len() + 1
    }
}

impl Serialize for WeightMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entry_count()))?;
        map.serialize_entry(BIAS_FEATURE, &self.bias)?;
        for (name, weight) in &self.features {
            map.serialize_entry(name, weight)?;
        }
        map.end()
    }
}

/// A data-quality rejection: the run stopped before training and wrote nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRejection {
    pub error: String,
    pub hint: String,
    #[serde(skip)]
    pub cause: DataQualityError,
}

impl From<DataQualityError> for TrainingRejection {
    fn from(cause: DataQualityError) -> Self {
        Self {
            error: cause.to_string(),
            hint: cause.hint().to_string(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_serialize_bias_first_in_column_order() {
        let names = vec!["b_feature".to_string(), "a_feature".to_string()];
        let weights = WeightMap::rounded(0.123_456_789, &names, &[1.000_000_4, -2.5]);
        let json = serde_json::to_string(&weights).unwrap();
        assert_eq!(json, r#"{"bias":0.123457,"b_feature":1.0,"a_feature":-2.5}"#);
        assert_eq!(weights.get("a_feature"), Some(-2.5));
        assert_eq!(weights.entry_count(), 3);
    }

    #[test]
    fn rejection_carries_message_and_hint() {
        let rejection = TrainingRejection::from(DataQualityError::Imbalanced {
            positive: 5,
            negative: 60,
            required: 10,
        });
        let json = serde_json::to_value(&rejection).unwrap();
        assert_eq!(
            json["error"],
            "Imbalanced data: 5 positive, 60 negative (need >= 10 each)"
        );
        assert!(json["hint"].as_str().unwrap().len() > 0);
        assert!(json.get("cause").is_none());
    }

    #[test]
    fn missing_cv_serializes_as_null() {
        let report = TrainingReport {
            success: true,
            version: 3,
            activated: false,
            samples: 60,
            positive_samples: 30,
            negative_samples: 30,
            skipped_rows: 0,
            train_accuracy: 0.9,
            train_auc: 0.95,
            cv_auc: None,
            weights: WeightMap::rounded(0.0, &[], &[]),
        };
        let json = TrainingOutcome::Trained(report).to_json();
        assert!(json["cv_auc"].is_null());
        assert_eq!(json["success"], true);
        assert_eq!(json["weights"]["bias"], 0.0);
    }
}
