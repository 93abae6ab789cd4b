//! Trainer configuration.
//!
//! Settings live in a TOML file and may be overlaid with the store/credential
//! variables the deployment environment provides. The resulting [`TrainerConfig`]
//! is passed explicitly to the pipeline; nothing in the core reads the process
//! environment.

mod errors;
mod load;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ml::logreg::{ClassWeighting, LbfgsOptions, TrainOptions};

pub use errors::ConfigError;
pub use load::{
    CONFIG_FILE_NAME, ENV_SERVICE_KEY, ENV_STORE_URL, ENV_TRAIN_API_KEY, apply_env_overrides,
    default_config_path, load_from_path, load_or_default,
};

/// Model name used when none is configured.
pub const DEFAULT_MODEL_NAME: &str = "feed_v1";

/// Top-level trainer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Project base URL, e.g. `https://project.supabase.co`.
    pub url: String,
    /// Service-role key sent as `apikey` and bearer token.
    pub service_key: String,
    pub timeouts: StoreTimeouts,
}

/// Per-operation timeouts in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreTimeouts {
    pub connect_secs: u64,
    pub export_secs: u64,
    pub query_secs: u64,
    pub insert_secs: u64,
    pub rpc_secs: u64,
}

impl Default for StoreTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            export_secs: 120,
            query_secs: 30,
            insert_secs: 30,
            rpc_secs: 120,
        }
    }
}

impl StoreTimeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn export(&self) -> Duration {
        Duration::from_secs(self.export_secs)
    }

    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs)
    }

    pub fn insert(&self) -> Duration {
        Duration::from_secs(self.insert_secs)
    }

    pub fn rpc(&self) -> Duration {
        Duration::from_secs(self.rpc_secs)
    }
}

impl StoreConfig {
    /// Parse the store URL, normalized to end with `/` so endpoint joins append.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Missing("store.url"));
        }
        let mut url = Url::parse(trimmed).map_err(|err| ConfigError::InvalidUrl {
            url: trimmed.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: trimmed.to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

/// Credentials checked at the request boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret expected as `Authorization: Bearer <key>`.
    pub train_api_key: String,
}

/// Model identity and training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// Inverse L2 regularization strength.
    pub c: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub class_weighting: ClassWeighting,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL_NAME.to_string(),
            c: 1.0,
            max_iter: 1000,
            tolerance: 1e-4,
            class_weighting: ClassWeighting::Balanced,
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            c: self.c,
            class_weighting: self.class_weighting,
            solver: LbfgsOptions {
                max_iter: self.max_iter,
                gradient_tolerance: self.tolerance,
                ..LbfgsOptions::default()
            },
            seed: self.seed,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for log files; defaults to `.feedtrain/logs` under the config root.
    pub dir: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Number of log files to retain.
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            filter: "info".to_string(),
            max_files: 10,
        }
    }
}

impl ModelConfig {
    /// Check the model identity and hyperparameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Missing("model.name"));
        }
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "model.c",
                reason: format!("{} is not a positive number", self.c),
            });
        }
        if self.max_iter == 0 {
            return Err(ConfigError::InvalidValue {
                key: "model.max_iter",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "model.tolerance",
                reason: format!("{} is not a positive number", self.tolerance),
            });
        }
        if let ClassWeighting::Fixed { negative, positive } = self.class_weighting {
            if !(negative > 0.0 && positive > 0.0 && negative.is_finite() && positive.is_finite())
            {
                return Err(ConfigError::InvalidValue {
                    key: "model.class_weighting",
                    reason: format!("fixed weights {negative}/{positive} must be positive"),
                });
            }
        }
        Ok(())
    }
}

impl TrainerConfig {
    /// Check everything the pipeline needs before any network call is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.base_url()?;
        if self.store.service_key.trim().is_empty() {
            return Err(ConfigError::Missing("store.service_key"));
        }
        let timeouts = &self.store.timeouts;
        if [
            timeouts.connect_secs,
            timeouts.export_secs,
            timeouts.query_secs,
            timeouts.insert_secs,
            timeouts.rpc_secs,
        ]
        .contains(&0)
        {
            return Err(ConfigError::InvalidValue {
                key: "store.timeouts",
                reason: "timeouts must be at least one second".to_string(),
            });
        }
        self.model.validate()
    }
}
