use std::sync::{Mutex, MutexGuard};

use crate::features::TrainingRecord;
use crate::versioning::ModelArtifact;

use super::{ActiveVersion, StoreError, TrainingStore};

/// Store operation recorded by [`MemoryStore`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Export { window_days: u32, row_limit: u32 },
    QueryMaxVersion { model_name: String },
    Insert { rows: usize },
    SetActive { model_name: String, version: i64 },
    PublishAtomic { model_name: String, rows: usize },
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<TrainingRecord>,
    weights: Vec<ModelArtifact>,
    calls: Vec<StoreCall>,
    fail_activation_of: Option<i64>,
    fail_exports: bool,
}

/// In-process store with the same contract as the remote one.
///
/// Inserts are conditional on the version being new. A transactional instance
/// also implements [`TrainingStore::publish_atomic`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    transactional: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that publishes activations in a single step.
    pub fn transactional() -> Self {
        Self {
            transactional: true,
            ..Self::default()
        }
    }

    /// Seed the rows returned by the export call.
    pub fn with_records(self, records: Vec<TrainingRecord>) -> Self {
        self.state().records = records;
        self
    }

    /// Every weight row currently stored.
    pub fn rows(&self) -> Vec<ModelArtifact> {
        self.state().weights.clone()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Distinct versions of `model_name` that have at least one active row.
    pub fn active_versions(&self, model_name: &str) -> Vec<i64> {
        let mut versions: Vec<i64> = self
            .state()
            .weights
            .iter()
            .filter(|row| row.model_name == model_name && row.is_active)
            .map(|row| row.version)
            .collect();
        versions.sort_unstable();
        versions.dedup();
        versions
    }

    /// Make the activation RPC for `version` fail.
    pub fn fail_activation_of(&self, version: i64) {
        self.state().fail_activation_of = Some(version);
    }

    /// Make every export call fail with a transport error.
    pub fn fail_exports(&self) {
        self.state().fail_exports = true;
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl MemoryState {
    fn check_new_version(&self, rows: &[ModelArtifact]) -> Result<(), StoreError> {
        for row in rows {
            let exists = self
                .weights
                .iter()
                .any(|stored| stored.model_name == row.model_name && stored.version == row.version);
            if exists {
                return Err(StoreError::VersionConflict {
                    model_name: row.model_name.clone(),
                    version: row.version,
                });
            }
        }
        Ok(())
    }

    fn set_active(&mut self, model_name: &str, version: ActiveVersion) {
        for row in self.weights.iter_mut().filter(|row| row.model_name == model_name) {
            row.is_active = match version {
                ActiveVersion::None => false,
                ActiveVersion::Version(active) => row.version == active,
            };
        }
    }
}

impl TrainingStore for MemoryStore {
    fn export_training_data(
        &self,
        window_days: u32,
        row_limit: u32,
    ) -> Result<Vec<TrainingRecord>, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::Export {
            window_days,
            row_limit,
        });
        if state.fail_exports {
            return Err(StoreError::Transport {
                operation: "export_training_data",
                message: "connection refused".to_string(),
            });
        }
        Ok(state
            .records
            .iter()
            .take(row_limit as usize)
            .cloned()
            .collect())
    }

    fn query_max_version(&self, model_name: &str) -> Result<Option<i64>, StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::QueryMaxVersion {
            model_name: model_name.to_string(),
        });
        Ok(state
            .weights
            .iter()
            .filter(|row| row.model_name == model_name)
            .map(|row| row.version)
            .max())
    }

    fn insert_artifact_rows(&self, rows: &[ModelArtifact]) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::Insert { rows: rows.len() });
        state.check_new_version(rows)?;
        state.weights.extend_from_slice(rows);
        Ok(())
    }

    fn set_active_version(
        &self,
        model_name: &str,
        version: ActiveVersion,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::SetActive {
            model_name: model_name.to_string(),
            version: version.as_rpc_param(),
        });
        if let ActiveVersion::Version(requested) = version {
            if state.fail_activation_of == Some(requested) {
                return Err(StoreError::Transport {
                    operation: "activate_model_version",
                    message: "connection reset".to_string(),
                });
            }
        }
        state.set_active(model_name, version);
        Ok(())
    }

    fn publish_atomic(
        &self,
        model_name: &str,
        rows: &[ModelArtifact],
    ) -> Option<Result<(), StoreError>> {
        if !self.transactional {
            return None;
        }
        let mut state = self.state();
        state.calls.push(StoreCall::PublishAtomic {
            model_name: model_name.to_string(),
            rows: rows.len(),
        });
        if let Err(err) = state.check_new_version(rows) {
            return Some(Err(err));
        }
        state.set_active(model_name, ActiveVersion::None);
        state.weights.extend_from_slice(rows);
        if let Some(version) = rows.first().map(|row| row.version) {
            state.set_active(model_name, ActiveVersion::Version(version));
        }
        Some(Ok(()))
    }
}
