//! Weight versioning: version allocation, artifact rows and activation.
//!
//! A version is allocated by reading the current maximum and adding one. That read
//! is not isolated from concurrent writers; stores reject a duplicate version on
//! insert instead, which turns the race into a [`StoreError::VersionConflict`].
//!
//! Activation without a transactional store runs four steps: deactivate every
//! version, flag the new rows active, insert them, then activate the new version
//! by number. A failure between the first and last step can leave no version
//! active; that failure is reported as [`StoreError::ActivationIncomplete`].

use serde::{Deserialize, Serialize};

use crate::store::{ActiveVersion, StoreError, TrainingStore};

/// Feature name used for the intercept row.
pub const BIAS_FEATURE: &str = "bias";

/// One persisted weight row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_name: String,
    /// `bias` or one of the feature column names.
    pub feature_name: String,
    pub weight: f64,
    pub version: i64,
    pub is_active: bool,
}

/// How the rows were published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    Inactive,
    Atomic,
    MultiStep,
}

/// Allocates versions and publishes weight rows for one model name.
pub struct VersionManager<'a, S: TrainingStore + ?Sized> {
    store: &'a S,
    model_name: &'a str,
    feature_order: &'a [&'a str],
}

impl<'a, S: TrainingStore + ?Sized> VersionManager<'a, S> {
    pub fn new(store: &'a S, model_name: &'a str, feature_order: &'a [&'a str]) -> Self {
        Self {
            store,
            model_name,
            feature_order,
        }
    }

    /// Next version for the model: current maximum plus one, or `1`.
    pub fn next_version(&self) -> Result<i64, StoreError> {
        let current = self.store.query_max_version(self.model_name)?;
        Ok(current.map_or(1, |max| max.max(0) + 1))
    }

    /// Build `1 + features` rows stamped with the same version and flag.
    ///
    /// The bias row comes first, followed by one row per feature in column order.
    pub fn build_artifact_rows(
        &self,
        bias: f64,
        weights: &[f64],
        version: i64,
        active: bool,
    ) -> Vec<ModelArtifact> {
        debug_assert_eq!(weights.len(), self.feature_order.len());
        let row = |feature_name: &str, weight: f64| ModelArtifact {
            model_name: self.model_name.to_string(),
            feature_name: feature_name.to_string(),
            weight,
            version,
            is_active: active,
        };
        std::iter::once(row(BIAS_FEATURE, bias))
            .chain(
                self.feature_order
                    .iter()
                    .zip(weights)
                    .map(|(name, &weight)| row(name, weight)),
            )
            .collect()
    }

    /// Persist freshly built rows, activating them when requested.
    pub fn publish(
        &self,
        mut rows: Vec<ModelArtifact>,
        activate: bool,
    ) -> Result<PublishMode, StoreError> {
        let Some(version) = rows.first().map(|row| row.version) else {
            return Ok(PublishMode::Inactive);
        };

        if !activate {
            for row in &mut rows {
                row.is_active = false;
            }
            self.store.insert_artifact_rows(&rows)?;
            return Ok(PublishMode::Inactive);
        }

        for row in &mut rows {
            row.is_active = true;
        }
        if let Some(result) = self.store.publish_atomic(self.model_name, &rows) {
            result?;
            tracing::info!(
                "Published and activated {} v{version} atomically",
                self.model_name
            );
            return Ok(PublishMode::Atomic);
        }

        self.activate(&rows, version)?;
        Ok(PublishMode::MultiStep)
    }

    /// Multi-step activation for stores without transactions.
    fn activate(&self, rows: &[ModelArtifact], version: i64) -> Result<(), StoreError> {
        self.store
            .set_active_version(self.model_name, ActiveVersion::None)?;
        self.store.insert_artifact_rows(rows)?;
        if let Err(source) = self
            .store
            .set_active_version(self.model_name, ActiveVersion::Version(version))
        {
            tracing::error!(
                "Rows for {} v{version} were inserted after deactivating all versions, \
                 but the confirming activation failed: {source}",
                self.model_name
            );
            return Err(StoreError::ActivationIncomplete {
                model_name: self.model_name.to_string(),
                version,
                source: Box::new(source),
            });
        }
        tracing::info!("Activated {} v{version}", self.model_name);
        Ok(())
    }
}
