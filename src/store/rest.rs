use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::config::{StoreConfig, StoreTimeouts};
use crate::features::TrainingRecord;
use crate::http_client;
use crate::versioning::ModelArtifact;

use super::{ActiveVersion, StoreError, TrainingStore};

const WEIGHTS_TABLE: &str = "model_weights";
const EXPORT_RPC: &str = "export_training_data";
const ACTIVATE_RPC: &str = "activate_model_version";

const MAX_EXPORT_RESPONSE_BYTES: usize = 256 * 1024 * 1024;
const MAX_SMALL_RESPONSE_BYTES: usize = 64 * 1024;

/// PostgREST-style store client: RPC calls under `rest/v1/rpc/`, tables under `rest/v1/`.
pub struct RestStore {
    base_url: Url,
    service_key: String,
    timeouts: StoreTimeouts,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct VersionRow {
    version: i64,
}

impl RestStore {
    /// Build a client from validated configuration.
    pub fn new(config: &StoreConfig, base_url: Url) -> Self {
        Self {
            agent: http_client::build_agent(config.timeouts.connect()),
            base_url,
            service_key: config.service_key.clone(),
            timeouts: config.timeouts.clone(),
        }
    }

    fn endpoint(&self, path: &str, operation: &'static str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|err| StoreError::Transport {
                operation,
                message: format!("invalid endpoint {path}: {err}"),
            })
    }

    fn request(&self, method: &str, url: &Url, timeout: Duration) -> ureq::Request {
        self.agent
            .request_url(method, url)
            .timeout(timeout)
            .set("apikey", &self.service_key)
            .set("Authorization", &format!("Bearer {}", self.service_key))
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .set("Prefer", "return=minimal")
    }

    fn send(
        &self,
        operation: &'static str,
        request: ureq::Request,
        body: Option<serde_json::Value>,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<Vec<u8>, StoreError> {
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = read_body_lossy(response);
                return Err(StoreError::Status {
                    operation,
                    status,
                    body,
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                if http_client::is_timeout(&transport) {
                    return Err(StoreError::Timeout { operation, timeout });
                }
                return Err(StoreError::Transport {
                    operation,
                    message: transport.to_string(),
                });
            }
        };
        http_client::read_response_bytes(response, max_bytes).map_err(|err| StoreError::Decode {
            operation,
            message: err.to_string(),
        })
    }

    fn rpc(
        &self,
        function: &'static str,
        params: serde_json::Value,
        max_bytes: usize,
    ) -> Result<Vec<u8>, StoreError> {
        let url = self.endpoint(&format!("rest/v1/rpc/{function}"), function)?;
        let timeout = self.timeouts.rpc();
        let request = self.request("POST", &url, timeout);
        self.send(function, request, Some(params), timeout, max_bytes)
    }
}

impl TrainingStore for RestStore {
    fn export_training_data(
        &self,
        window_days: u32,
        row_limit: u32,
    ) -> Result<Vec<TrainingRecord>, StoreError> {
        let url = self.endpoint(&format!("rest/v1/rpc/{EXPORT_RPC}"), EXPORT_RPC)?;
        let timeout = self.timeouts.export();
        let request = self.request("POST", &url, timeout);
        let params = json!({ "p_days": window_days, "p_limit": row_limit });
        let bytes = self.send(
            EXPORT_RPC,
            request,
            Some(params),
            timeout,
            MAX_EXPORT_RESPONSE_BYTES,
        )?;
        let records: Option<Vec<TrainingRecord>> =
            decode_json(EXPORT_RPC, &bytes)?.unwrap_or_default();
        Ok(records.unwrap_or_default())
    }

    fn query_max_version(&self, model_name: &str) -> Result<Option<i64>, StoreError> {
        const OPERATION: &str = "query_max_version";
        let mut url = self.endpoint(&format!("rest/v1/{WEIGHTS_TABLE}"), OPERATION)?;
        url.query_pairs_mut()
            .append_pair("select", "version")
            .append_pair("model_name", &format!("eq.{model_name}"))
            .append_pair("order", "version.desc")
            .append_pair("limit", "1");
        let timeout = self.timeouts.query();
        let request = self.request("GET", &url, timeout);
        let bytes = self.send(OPERATION, request, None, timeout, MAX_SMALL_RESPONSE_BYTES)?;
        let rows: Vec<VersionRow> = decode_json(OPERATION, &bytes)?.unwrap_or_default();
        Ok(rows.first().map(|row| row.version))
    }

    fn insert_artifact_rows(&self, rows: &[ModelArtifact]) -> Result<(), StoreError> {
        const OPERATION: &str = "insert_artifact_rows";
        let url = self.endpoint(&format!("rest/v1/{WEIGHTS_TABLE}"), OPERATION)?;
        let timeout = self.timeouts.insert();
        let request = self.request("POST", &url, timeout);
        let body = serde_json::to_value(rows).map_err(|err| StoreError::Decode {
            operation: OPERATION,
            message: err.to_string(),
        })?;
        match self.send(OPERATION, request, Some(body), timeout, MAX_SMALL_RESPONSE_BYTES) {
            Err(StoreError::Status { status: 409, .. }) => {
                let (model_name, version) = rows
                    .first()
                    .map(|row| (row.model_name.clone(), row.version))
                    .unwrap_or_default();
                Err(StoreError::VersionConflict {
                    model_name,
                    version,
                })
            }
            other => other.map(|_| ()),
        }
    }

    fn set_active_version(
        &self,
        model_name: &str,
        version: ActiveVersion,
    ) -> Result<(), StoreError> {
        let params = json!({
            "p_model_name": model_name,
            "p_version": version.as_rpc_param(),
        });
        self.rpc(ACTIVATE_RPC, params, MAX_SMALL_RESPONSE_BYTES)
            .map(|_| ())
    }
}

/// Decode a JSON body; an empty body decodes to `None`.
fn decode_json<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    bytes: &[u8],
) -> Result<Option<T>, StoreError> {
    let text = std::str::from_utf8(bytes).map_err(|err| StoreError::Decode {
        operation,
        message: err.to_string(),
    })?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|err| StoreError::Decode {
            operation,
            message: err.to_string(),
        })
}

fn read_body_lossy(response: ureq::Response) -> String {
    match http_client::read_response_bytes(response, MAX_SMALL_RESPONSE_BYTES) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(err) => err.to_string(),
    }
}
