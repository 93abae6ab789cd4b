use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// One labeled impression row as exported by the store.
///
/// Feature values stay raw JSON until extraction so that coercion failures can be
/// counted instead of rejecting the whole export payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// Whether the impression led to an engagement event.
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub engaged: bool,
    /// Remaining columns keyed by name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl TrainingRecord {
    /// Create an empty record with the given label.
    pub fn new(engaged: bool) -> Self {
        Self {
            engaged,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style setter used by fixtures and dry runs.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Borrow a raw column value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Outcome of coercing a single raw value into a feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Coerced {
    Value(f64),
    Failed,
}

/// Coerce a raw JSON value into a float.
///
/// Null and missing values become zero. Numeric strings are parsed, including
/// `nan`/`inf` spellings, which are clamped later with the rest of the matrix.
pub(crate) fn coerce_value(value: Option<&Value>) -> Coerced {
    match value {
        None | Some(Value::Null) => Coerced::Value(0.0),
        Some(Value::Bool(flag)) => Coerced::Value(if *flag { 1.0 } else { 0.0 }),
        Some(Value::Number(number)) => number_to_f64(number)
            .map(Coerced::Value)
            .unwrap_or(Coerced::Failed),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Coerced::Value(0.0);
            }
            trimmed
                .parse::<f64>()
                .map(Coerced::Value)
                .unwrap_or(Coerced::Failed)
        }
        Some(Value::Array(_)) | Some(Value::Object(_)) => Coerced::Failed,
    }
}

/// Parse the number's literal so out-of-range values become `±inf` instead of failing.
fn number_to_f64(number: &Number) -> Option<f64> {
    number.to_string().parse::<f64>().ok()
}

fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(false),
        Value::Bool(flag) => Ok(flag),
        Value::Number(number) => Ok(number_to_f64(&number).is_some_and(|v| v != 0.0)),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "f" | "no" => Ok(false),
            "1" | "true" | "t" | "yes" => Ok(true),
            other => {
                tracing::warn!("Unrecognized engaged label {other:?}; treating it as engaged");
                Ok(true)
            }
        },
        Value::Array(items) => Ok(!items.is_empty()),
        Value::Object(map) => Ok(!map.is_empty()),
    }
}
