//! Request boundary helpers: body parsing, authorization and status mapping.
//!
//! There is no server here. A host that exposes training over HTTP parses the body
//! with [`TrainRequest::from_body`], checks the header with [`authorize`] and maps
//! the run result with [`ResponseStatus::for_result`].

use serde_json::{Value, json};
use thiserror::Error;

use crate::pipeline::{PipelineError, TrainingOutcome};

pub const DEFAULT_DAYS: u32 = 30;
pub const DEFAULT_LIMIT: u32 = 50_000;

/// Parameters of one training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainRequest {
    /// Export window in days.
    pub days: u32,
    /// Maximum number of exported rows.
    pub limit: u32,
    /// Make the new version the active one.
    pub activate: bool,
}

impl Default for TrainRequest {
    fn default() -> Self {
        Self {
            days: DEFAULT_DAYS,
            limit: DEFAULT_LIMIT,
            activate: false,
        }
    }
}

/// A request body that parsed as JSON but carries unusable parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid request parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl TrainRequest {
    /// Parse an optional JSON body.
    ///
    /// Empty bodies and bodies that are not JSON objects use the defaults. Fields
    /// with the wrong type or out-of-range values are rejected.
    pub fn from_body(body: &[u8]) -> Result<Self, RequestError> {
        let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
            return Ok(Self::default());
        };
        let mut request = Self::default();
        if let Some(value) = fields.get("days").filter(|value| !value.is_null()) {
            request.days = positive_u32("days", value)?;
        }
        if let Some(value) = fields.get("limit").filter(|value| !value.is_null()) {
            request.limit = positive_u32("limit", value)?;
        }
        if let Some(value) = fields.get("activate").filter(|value| !value.is_null()) {
            request.activate = value
                .as_bool()
                .ok_or_else(|| RequestError::InvalidParameter {
                    name: "activate",
                    reason: format!("expected a boolean, got {value}"),
                })?;
        }
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.days == 0 {
            return Err(RequestError::InvalidParameter {
                name: "days",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.limit == 0 {
            return Err(RequestError::InvalidParameter {
                name: "limit",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn positive_u32(name: &'static str, value: &Value) -> Result<u32, RequestError> {
    value
        .as_u64()
        .and_then(|number| u32::try_from(number).ok())
        .ok_or_else(|| RequestError::InvalidParameter {
            name,
            reason: format!("expected a non-negative integer, got {value}"),
        })
}

/// Check an `Authorization` header against the configured secret.
///
/// An empty secret denies every request. The comparison does not short-circuit on
/// the first differing byte.
pub fn authorize(header: Option<&str>, expected_key: &str) -> bool {
    if expected_key.is_empty() {
        return false;
    }
    let Some(presented) = header.and_then(|value| value.strip_prefix("Bearer ")) else {
        return false;
    };
    constant_time_eq(presented.as_bytes(), expected_key.as_bytes())
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// HTTP status a host should answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    BadRequest,
    Unauthorized,
    InternalError,
}

impl ResponseStatus {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::InternalError => 500,
        }
    }

    pub fn for_result(result: &Result<TrainingOutcome, PipelineError>) -> Self {
        match result {
            Ok(TrainingOutcome::Trained(_)) => Self::Ok,
            Ok(TrainingOutcome::Rejected(_)) => Self::BadRequest,
            Err(_) => Self::InternalError,
        }
    }
}

/// Status and JSON body for a finished run.
pub fn respond(result: &Result<TrainingOutcome, PipelineError>) -> (ResponseStatus, Value) {
    let body = match result {
        Ok(outcome) => outcome.to_json(),
        Err(err) => json!({ "error": err.to_string() }),
    };
    (ResponseStatus::for_result(result), body)
}

/// Body returned for a request that failed [`authorize`].
pub fn unauthorized() -> (ResponseStatus, Value) {
    (ResponseStatus::Unauthorized, json!({ "error": "Unauthorized" }))
}

/// Body returned for a request whose parameters failed validation.
pub fn bad_request(err: &RequestError) -> (ResponseStatus, Value) {
    (ResponseStatus::BadRequest, json!({ "error": err.to_string() }))
}

/// Self-description of the training endpoint.
pub fn service_info() -> Value {
    json!({
        "service": "Feed ranking model training",
        "method": "POST /api/train",
        "auth": "Bearer <TRAIN_API_KEY>",
        "body": {
            "days": format!("Training window in days (default: {DEFAULT_DAYS})"),
            "limit": format!("Max training samples (default: {DEFAULT_LIMIT})"),
            "activate": "Auto-activate model after training (default: false)",
        },
    })
}
