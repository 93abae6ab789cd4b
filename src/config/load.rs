use std::path::{Path, PathBuf};

use crate::app_dirs;

use super::{ConfigError, TrainerConfig};

/// Default filename used to store the trainer configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable carrying the store base URL.
pub const ENV_STORE_URL: &str = "SUPABASE_URL";
/// Environment variable carrying the store service key.
pub const ENV_SERVICE_KEY: &str = "SUPABASE_SERVICE_KEY";
/// Environment variable carrying the training request secret.
pub const ENV_TRAIN_API_KEY: &str = "TRAIN_API_KEY";

/// Resolve `.feedtrain/config.toml` under the platform config root.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from a TOML file. Missing sections fall back to defaults.
pub fn load_from_path(path: &Path) -> Result<TrainerConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `path` if it exists, otherwise return defaults.
pub fn load_or_default(path: &Path) -> Result<TrainerConfig, ConfigError> {
    if path.exists() {
        load_from_path(path)
    } else {
        Ok(TrainerConfig::default())
    }
}

/// Overlay store and credential settings from a variable lookup.
///
/// `lookup` is usually `|key| std::env::var(key).ok()`; tests pass a map. Empty
/// values are ignored so a blank variable never clears a file setting.
pub fn apply_env_overrides<F>(mut config: TrainerConfig, lookup: F) -> TrainerConfig
where
    F: Fn(&str) -> Option<String>,
{
    let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(url) = value(ENV_STORE_URL) {
        config.store.url = url;
    }
    if let Some(key) = value(ENV_SERVICE_KEY) {
        config.store.service_key = key;
    }
    if let Some(key) = value(ENV_TRAIN_API_KEY) {
        config.auth.train_api_key = key;
    }
    config
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::Read { path, source },
    }
}
