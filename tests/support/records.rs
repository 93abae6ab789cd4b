use feedtrain::features::TrainingRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

/// Synthetic export with `positive` engaged rows and `negative` others.
///
/// Engaged rows lean towards higher engagement, affinity and media; the classes
/// overlap so the fitted model is good but not perfect.
pub fn synthetic(positive: usize, negative: usize, seed: u64) -> Vec<TrainingRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records: Vec<TrainingRecord> =
        (0..positive).map(|_| record(&mut rng, true)).collect();
    records.extend((0..negative).map(|_| record(&mut rng, false)));
    records.shuffle(&mut rng);
    records
}

fn record(rng: &mut StdRng, engaged: bool) -> TrainingRecord {
    let shift = if engaged { 0.8 } else { -0.8 };
    let noisy = |rng: &mut StdRng, center: f64| center + rng.random_range(-1.5..1.5);
    let ln_engagement = noisy(rng, 2.0 + shift);
    let affinity = noisy(rng, 0.5 + shift);
    let friend_likes = noisy(rng, 0.3 + shift * 0.5);
    let friend_likes = nullable(rng, friend_likes);
    TrainingRecord::new(engaged)
        .with("ln_engagement", ln_engagement)
        .with("ln_affinity", affinity)
        .with("is_following", rng.random_bool(if engaged { 0.6 } else { 0.3 }))
        .with("is_subscribed", if rng.random_bool(0.2) { 1 } else { 0 })
        .with("content_pref", format!("{:.3}", noisy(rng, shift * 0.5)))
        .with("velocity_ratio", noisy(rng, 1.0))
        .with("ln_friend_likes", friend_likes)
        .with("inv_age", rng.random_range(0.0..1.0))
        .with("has_media", rng.random_bool(if engaged { 0.7 } else { 0.4 }))
        .with("topic_affinity", noisy(rng, shift * 0.3))
}

fn nullable(rng: &mut StdRng, value: f64) -> Value {
    if rng.random_bool(0.1) {
        Value::Null
    } else {
        json!(value)
    }
}

/// Records whose feature values cannot be coerced.
pub fn with_garbage(mut records: Vec<TrainingRecord>, every: usize) -> Vec<TrainingRecord> {
    for record in records.iter_mut().step_by(every.max(1)) {
        record
            .fields
            .insert("velocity_ratio".to_string(), json!("not-a-number"));
    }
    records
}
