//! Data access gateway for training exports and the model weights table.
//!
//! The pipeline only talks to the store through [`TrainingStore`]. [`RestStore`]
//! speaks the PostgREST dialect of the hosted database; [`MemoryStore`] keeps
//! everything in process for tests and dry runs.

mod memory;
mod rest;

use std::time::Duration;

use thiserror::Error;

use crate::features::TrainingRecord;
use crate::versioning::ModelArtifact;

pub use memory::{MemoryStore, StoreCall};
pub use rest::RestStore;

/// Target of an activation RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveVersion {
    /// Clear the active flag on every version of the model.
    None,
    /// Make exactly this version active.
    Version(i64),
}

impl ActiveVersion {
    /// Wire encoding used by the activation RPC (`-1` deactivates all).
    pub fn as_rpc_param(self) -> i64 {
        match self {
            Self::None => -1,
            Self::Version(version) => version,
        }
    }
}

/// Failures talking to the store. All of them abort the current run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("{operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("{operation} returned a malformed payload: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
    /// Rows for this `(model_name, version)` already exist.
    #[error("Version {version} of {model_name} already exists")]
    VersionConflict { model_name: String, version: i64 },
    /// The new rows were written but the confirming activation did not complete.
    #[error(
        "Version {version} of {model_name} was inserted but activation was not confirmed: {source}"
    )]
    ActivationIncomplete {
        model_name: String,
        version: i64,
        #[source]
        source: Box<StoreError>,
    },
}

/// Remote operations the training pipeline depends on.
pub trait TrainingStore {
    /// Export labeled impression rows from the last `window_days`, at most `row_limit`.
    fn export_training_data(
        &self,
        window_days: u32,
        row_limit: u32,
    ) -> Result<Vec<TrainingRecord>, StoreError>;

    /// Highest stored version for `model_name`, if any.
    fn query_max_version(&self, model_name: &str) -> Result<Option<i64>, StoreError>;

    /// Insert weight rows. Stores reject rows whose version already exists.
    fn insert_artifact_rows(&self, rows: &[ModelArtifact]) -> Result<(), StoreError>;

    /// Activation RPC for `model_name`.
    fn set_active_version(&self, model_name: &str, version: ActiveVersion)
    -> Result<(), StoreError>;

    /// Deactivate, insert and activate as one transaction.
    ///
    /// Returns `None` when the store has no transactional path; callers then fall
    /// back to the multi-step protocol.
    fn publish_atomic(
        &self,
        _model_name: &str,
        _rows: &[ModelArtifact],
    ) -> Option<Result<(), StoreError>> {
        None
    }
}

impl<S: TrainingStore + ?Sized> TrainingStore for &S {
    fn export_training_data(
        &self,
        window_days: u32,
        row_limit: u32,
    ) -> Result<Vec<TrainingRecord>, StoreError> {
        (**self).export_training_data(window_days, row_limit)
    }

    fn query_max_version(&self, model_name: &str) -> Result<Option<i64>, StoreError> {
        (**self).query_max_version(model_name)
    }

    fn insert_artifact_rows(&self, rows: &[ModelArtifact]) -> Result<(), StoreError> {
        (**self).insert_artifact_rows(rows)
    }

    fn set_active_version(
        &self,
        model_name: &str,
        version: ActiveVersion,
    ) -> Result<(), StoreError> {
        (**self).set_active_version(model_name, version)
    }

    fn publish_atomic(
        &self,
        model_name: &str,
        rows: &[ModelArtifact],
    ) -> Option<Result<(), StoreError>> {
        (**self).publish_atomic(model_name, rows)
    }
}
