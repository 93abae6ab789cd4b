mod support;

use feedtrain::config::ModelConfig;
use feedtrain::features::{DataQualityError, FEATURE_NAMES};
use feedtrain::pipeline::{PipelineError, TrainingOutcome, TrainingPipeline, TrainingReport};
use feedtrain::request::TrainRequest;
use feedtrain::store::{MemoryStore, StoreCall, StoreError, TrainingStore};
use feedtrain::versioning::{BIAS_FEATURE, ModelArtifact};

use support::records::{synthetic, with_garbage};

const MODEL: &str = "feed_v1";

fn pipeline(store: &MemoryStore) -> TrainingPipeline<&MemoryStore> {
    TrainingPipeline::new(store, &ModelConfig::default()).unwrap()
}

fn seed_version(store: &MemoryStore, version: i64, active: bool) {
    let rows: Vec<ModelArtifact> = std::iter::once(BIAS_FEATURE)
        .chain(FEATURE_NAMES.iter().copied())
        .map(|feature_name| ModelArtifact {
            model_name: MODEL.to_string(),
            feature_name: feature_name.to_string(),
            weight: 0.1,
            version,
            is_active: active,
        })
        .collect();
    store.insert_artifact_rows(&rows).unwrap();
}

fn trained(outcome: TrainingOutcome) -> TrainingReport {
    match outcome {
        TrainingOutcome::Trained(report) => report,
        TrainingOutcome::Rejected(rejection) => panic!("unexpected rejection: {}", rejection.error),
    }
}

fn write_calls(store: &MemoryStore) -> Vec<StoreCall> {
    store
        .calls()
        .into_iter()
        .filter(|call| {
            matches!(
                call,
                StoreCall::Insert { .. } | StoreCall::SetActive { .. } | StoreCall::PublishAtomic { .. }
            )
        })
        .collect()
}

#[test]
fn too_few_records_are_rejected_without_writes() {
    let store = MemoryStore::new().with_records(synthetic(20, 20, 1));
    let outcome = pipeline(&store).run(&TrainRequest::default()).unwrap();
    let TrainingOutcome::Rejected(rejection) = outcome else {
        panic!("expected a rejection");
    };
    assert_eq!(
        rejection.cause,
        DataQualityError::Insufficient {
            samples: 40,
            required: 50
        }
    );
    assert!(rejection.error.contains("40 samples"));
    assert!(!rejection.hint.is_empty());
    assert!(store.rows().is_empty());
    assert!(write_calls(&store).is_empty());
}

#[test]
fn imbalanced_export_is_rejected_with_both_counts() {
    let store = MemoryStore::new().with_records(synthetic(5, 60, 2));
    let outcome = pipeline(&store).run(&TrainRequest::default()).unwrap();
    let TrainingOutcome::Rejected(rejection) = outcome else {
        panic!("expected a rejection");
    };
    assert_eq!(
        rejection.cause,
        DataQualityError::Imbalanced {
            positive: 5,
            negative: 60,
            required: 10
        }
    );
    assert!(rejection.error.contains("5 positive"));
    assert!(rejection.error.contains("60 negative"));
    assert!(write_calls(&store).is_empty());
}

#[test]
fn small_balanced_run_publishes_next_inactive_version() {
    let store = MemoryStore::new().with_records(synthetic(30, 30, 3));
    seed_version(&store, 4, true);

    let report = trained(pipeline(&store).run(&TrainRequest::default()).unwrap());
    assert!(report.success);
    assert_eq!(report.version, 5);
    assert!(!report.activated);
    assert_eq!(report.samples, 60);
    assert_eq!(report.positive_samples, 30);
    assert_eq!(report.negative_samples, 30);
    assert!((0.0..=1.0).contains(&report.train_accuracy));
    assert!((0.0..=1.0).contains(&report.train_auc));
    assert_eq!(report.cv_auc, None);

    let new_rows: Vec<ModelArtifact> = store
        .rows()
        .into_iter()
        .filter(|row| row.version == 5)
        .collect();
    assert_eq!(new_rows.len(), 1 + FEATURE_NAMES.len());
    assert!(new_rows.iter().all(|row| !row.is_active));
    assert_eq!(new_rows[0].feature_name, BIAS_FEATURE);
    assert_eq!(store.active_versions(MODEL), vec![4]);
}

#[test]
fn large_activated_run_leaves_exactly_the_new_version_active() {
    let store = MemoryStore::new().with_records(synthetic(150, 150, 4));
    seed_version(&store, 1, true);
    seed_version(&store, 2, false);

    let request = TrainRequest {
        activate: true,
        ..TrainRequest::default()
    };
    let report = trained(pipeline(&store).run(&request).unwrap());
    assert_eq!(report.version, 3);
    assert!(report.activated);
    let cv_auc = report.cv_auc.expect("cv auc at 300 samples");
    assert!((0.0..=1.0).contains(&cv_auc));
    assert!(report.train_auc > 0.7);
    assert_eq!(store.active_versions(MODEL), vec![3]);

    let writes = write_calls(&store);
    assert_eq!(
        writes[2..],
        [
            StoreCall::SetActive {
                model_name: MODEL.to_string(),
                version: -1
            },
            StoreCall::Insert {
                rows: 1 + FEATURE_NAMES.len()
            },
            StoreCall::SetActive {
                model_name: MODEL.to_string(),
                version: 3
            },
        ]
    );
}

#[test]
fn transactional_store_publishes_in_one_step() {
    let store = MemoryStore::transactional().with_records(synthetic(40, 40, 5));
    seed_version(&store, 7, true);
    let request = TrainRequest {
        activate: true,
        ..TrainRequest::default()
    };
    let report = trained(pipeline(&store).run(&request).unwrap());
    assert_eq!(report.version, 8);
    assert_eq!(store.active_versions(MODEL), vec![8]);
    let writes = write_calls(&store);
    assert_eq!(writes.len(), 2, "{writes:?}");
    assert!(matches!(writes[1], StoreCall::PublishAtomic { .. }));
}

#[test]
fn failed_confirmation_reports_incomplete_activation() {
    let store = MemoryStore::new().with_records(synthetic(40, 40, 6));
    seed_version(&store, 1, true);
    store.fail_activation_of(2);
    let request = TrainRequest {
        activate: true,
        ..TrainRequest::default()
    };
    let err = pipeline(&store).run(&request).unwrap_err();
    match err {
        PipelineError::Store(StoreError::ActivationIncomplete {
            model_name,
            version,
            ..
        }) => {
            assert_eq!(model_name, MODEL);
            assert_eq!(version, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.rows().iter().any(|row| row.version == 2));
}

#[test]
fn export_failures_are_fatal() {
    let store = MemoryStore::new();
    store.fail_exports();
    let err = pipeline(&store).run(&TrainRequest::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Store(StoreError::Transport { .. })));
    assert_eq!(store.calls().len(), 1);
}

#[test]
fn export_parameters_come_from_the_request() {
    let store = MemoryStore::new().with_records(synthetic(30, 30, 7));
    let request = TrainRequest {
        days: 7,
        limit: 55,
        activate: false,
    };
    let report = trained(pipeline(&store).run(&request).unwrap());
    assert_eq!(report.samples, 55);
    assert_eq!(
        store.calls()[0],
        StoreCall::Export {
            window_days: 7,
            row_limit: 55
        }
    );
}

#[test]
fn unparseable_values_are_counted_as_skipped() {
    let records = with_garbage(synthetic(30, 30, 8), 6);
    let store = MemoryStore::new().with_records(records);
    let report = trained(pipeline(&store).run(&TrainRequest::default()).unwrap());
    assert_eq!(report.skipped_rows, 10);
    assert_eq!(report.samples, 60);
}

#[test]
fn identical_exports_train_identical_models() {
    let first = MemoryStore::new().with_records(synthetic(120, 120, 9));
    let second = MemoryStore::new().with_records(synthetic(120, 120, 9));
    let a = trained(pipeline(&first).run(&TrainRequest::default()).unwrap());
    let b = trained(pipeline(&second).run(&TrainRequest::default()).unwrap());
    assert_eq!(a.weights, b.weights);
    assert_eq!(a.cv_auc, b.cv_auc);
}

#[test]
fn report_json_uses_the_documented_shape() {
    let store = MemoryStore::new().with_records(synthetic(30, 30, 10));
    let outcome = pipeline(&store).run(&TrainRequest::default()).unwrap();
    let json = outcome.to_json();
    for key in [
        "success",
        "version",
        "activated",
        "samples",
        "positive_samples",
        "negative_samples",
        "skipped_rows",
        "train_accuracy",
        "train_auc",
        "cv_auc",
        "weights",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    let weights = json["weights"].as_object().unwrap();
    assert_eq!(weights.len(), 1 + FEATURE_NAMES.len());
    assert_eq!(weights.keys().next().map(String::as_str), Some(BIAS_FEATURE));
}
