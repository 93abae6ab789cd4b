use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use feedtrain::features::{FEATURE_NAMES, LabeledDataset, TrainingRecord, extract};
use feedtrain::ml::{self, logreg::TrainOptions};

fn dataset(samples: usize) -> LabeledDataset {
    let records: Vec<TrainingRecord> = (0..samples)
        .map(|i| {
            let engaged = i % 3 == 0;
            let wobble = (i as f64 * 0.618).sin();
            TrainingRecord::new(engaged)
                .with("ln_engagement", (if engaged { 2.5 } else { 1.5 }) + wobble)
                .with("ln_affinity", wobble * 0.5)
                .with("is_following", i % 4 == 0)
                .with("content_pref", format!("{:.2}", wobble))
                .with("velocity_ratio", 1.0 + (i as f64 * 0.1).cos())
                .with("inv_age", 1.0 / (1.0 + i as f64 % 48.0))
                .with("has_media", engaged || i % 5 == 0)
        })
        .collect();
    extract(&records, FEATURE_NAMES).expect("bench dataset")
}

fn bench_fit(c: &mut Criterion) {
    let options = TrainOptions::default();
    for samples in [150usize, 2_000] {
        let data = dataset(samples);
        c.bench_with_input(BenchmarkId::new("fit", samples), &data, |b, data| {
            b.iter(|| ml::fit(black_box(data), &options).expect("fit"));
        });
    }
}

fn bench_extract(c: &mut Criterion) {
    let records: Vec<TrainingRecord> = (0..5_000)
        .map(|i| {
            TrainingRecord::new(i % 2 == 0)
                .with("ln_engagement", format!("{}", i % 17))
                .with("topic_affinity", serde_json::Value::Null)
                .with("inv_age", "inf")
        })
        .collect();
    c.bench_function("extract_5000", |b| {
        b.iter(|| extract(black_box(&records), FEATURE_NAMES).expect("extract"));
    });
}

criterion_group!(benches, bench_fit, bench_extract);
criterion_main!(benches);
