//! Training orchestrator.
//!
//! A run moves through fetch, extract, gate, fit, version, persist and report.
//! Data-quality rejections come back as [`TrainingOutcome::Rejected`]; store and
//! solver failures abort the run as [`PipelineError`]. Nothing is retried.

mod report;

use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ModelConfig, TrainerConfig};
use crate::features::{self, FEATURE_NAMES};
use crate::ml::logreg::{FitError, TrainOptions};
use crate::ml::{self, metrics::round_to};
use crate::request::TrainRequest;
use crate::store::{RestStore, StoreError, TrainingStore};
use crate::versioning::{PublishMode, VersionManager};

pub use report::{TrainingOutcome, TrainingRejection, TrainingReport, WeightMap};

/// Failures that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error("Model fit failed: {0}")]
    Fit(#[from] FitError),
}

/// Sequences export, extraction, fitting and publishing for one model name.
pub struct TrainingPipeline<S: TrainingStore> {
    store: S,
    model_name: String,
    options: TrainOptions,
}

impl TrainingPipeline<RestStore> {
    /// Validate the full configuration and build a pipeline over the remote store.
    pub fn connect(config: &TrainerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_url = config.store.base_url()?;
        let store = RestStore::new(&config.store, base_url);
        Self::new(store, &config.model)
    }
}

impl<S: TrainingStore> TrainingPipeline<S> {
    /// Build a pipeline over any store after validating the model settings.
    pub fn new(store: S, model: &ModelConfig) -> Result<Self, ConfigError> {
        model.validate()?;
        Ok(Self {
            store,
            model_name: model.name.trim().to_string(),
            options: model.train_options(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one training run.
    pub fn run(&self, request: &TrainRequest) -> Result<TrainingOutcome, PipelineError> {
        info!(
            "Exporting training data for {} (days={}, limit={})",
            self.model_name, request.days, request.limit
        );
        let records = self
            .store
            .export_training_data(request.days, request.limit)?;
        info!("Exported {} records", records.len());

        let dataset = match features::extract(&records, FEATURE_NAMES) {
            Ok(dataset) => dataset,
            Err(cause) => {
                info!("Training rejected: {cause}");
                return Ok(TrainingOutcome::Rejected(TrainingRejection::from(cause)));
            }
        };
        info!(
            "Extracted {} samples ({} positive, {} negative, {} skipped)",
            dataset.len(),
            dataset.positive,
            dataset.negative,
            dataset.skipped
        );

        let fitted = ml::fit(&dataset, &self.options)?;
        info!(
            "Fitted model in {} iterations: accuracy {:.4}, auc {:.4}, cv auc {}",
            fitted.iterations,
            fitted.train_accuracy,
            fitted.train_auc,
            fitted
                .cv_auc
                .map_or_else(|| "n/a".to_string(), |auc| format!("{auc:.4}"))
        );

        let versions = VersionManager::new(&self.store, &self.model_name, FEATURE_NAMES);
        let version = versions.next_version()?;
        let rows = versions.build_artifact_rows(
            fitted.model.bias,
            &fitted.model.weights,
            version,
            request.activate,
        );
        info!("Persisting {} weight rows as v{version}", rows.len());
        let mode = versions.publish(rows, request.activate)?;
        let activated = mode != PublishMode::Inactive;

        Ok(TrainingOutcome::Trained(TrainingReport {
            success: true,
            version,
            activated,
            samples: dataset.len(),
            positive_samples: dataset.positive,
            negative_samples: dataset.negative,
            skipped_rows: dataset.skipped,
            train_accuracy: round_to(fitted.train_accuracy, 4),
            train_auc: round_to(fitted.train_auc, 4),
            cv_auc: fitted.cv_auc.map(|auc| round_to(auc, 4)),
            weights: WeightMap::rounded(
                fitted.model.bias,
                &dataset.feature_names,
                &fitted.model.weights,
            ),
        }))
    }
}
